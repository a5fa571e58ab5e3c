mod assets;
mod provider;

pub mod chat;
pub mod completion;
pub mod config;
pub mod model;
pub mod persona;
pub mod wire;

pub use crate::assets::{get_config_dir, get_data_dir};
pub use crate::provider::get_completion_model;
