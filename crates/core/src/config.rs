use std::{
    collections::HashMap,
    fs::{self, File},
    io::Write,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::{
    assets::{get_config_dir, get_default_config},
    model::ModelConfig,
    persona::Persona,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File system error: {0}")]
    IO(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    YAMLError(#[from] serde_yaml::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Chat settings: which model answers and which persona is preselected.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub model: ModelConfig,
    pub persona: Persona,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub models: HashMap<String, ModelConfig>,
    pub chat: ChatConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8042
}

fn default_endpoint() -> String {
    format!("http://{}:{}", default_host(), default_port())
}

fn default_persona() -> Persona {
    Persona::Intj
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum StringOrObject<T> {
    String(String),
    Object(T),
}

#[derive(Deserialize, Debug)]
struct RawConfig {
    models: HashMap<String, ModelConfig>,
    chat: RawChatConfig,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    client: ClientConfig,
}

#[derive(Deserialize, Debug)]
struct RawChatConfig {
    model: StringOrObject<ModelConfig>,
    #[serde(default = "default_persona")]
    persona: Persona,
}

impl RawConfig {
    #[instrument]
    fn to_config(&self) -> Result<Config, ConfigError> {
        let mut models_with_names = HashMap::new();
        for (k, v) in &self.models {
            // Update model name if not set
            let model_name = if v.name.is_empty() {
                k.clone()
            } else {
                v.name.clone()
            };
            let model = ModelConfig {
                name: model_name,
                ..v.clone()
            };
            models_with_names.insert(k.clone(), model);
        }

        let chat_model = match &self.chat.model {
            StringOrObject::String(s) => models_with_names
                .get(s)
                .cloned()
                .ok_or_else(|| ConfigError::Config(format!("Model '{s}' not found")))?,
            StringOrObject::Object(m) => m.clone(),
        };

        Ok(Config {
            models: models_with_names,
            chat: ChatConfig {
                model: chat_model,
                persona: self.chat.persona,
            },
            server: self.server.clone(),
            client: self.client.clone(),
        })
    }
}

#[instrument(skip(config_path))]
pub fn create_or_get_config_file(
    config_path: Option<PathBuf>,
) -> Result<(bool, PathBuf), ConfigError> {
    let actual_path = config_path.unwrap_or_else(|| {
        let config_dir = get_config_dir();
        config_dir.join("mbtichat.yml")
    });

    let parent_dir = actual_path.parent().ok_or_else(|| {
        ConfigError::IO(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Config path has no parent directory",
        ))
    })?;

    if !parent_dir.exists() {
        fs::create_dir_all(parent_dir)?;
    }

    if actual_path.exists() {
        Ok((true, actual_path))
    } else {
        File::create(&actual_path)?.write_all(get_default_config().as_bytes())?;
        Ok((false, actual_path))
    }
}

#[instrument(skip(config_path))]
pub fn get_config(config_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let (_, config_file) = create_or_get_config_file(config_path)?;
    let content = fs::read_to_string(&config_file)?;
    let raw: RawConfig = serde_yaml::from_str(&content)?;
    raw.to_config()
}
