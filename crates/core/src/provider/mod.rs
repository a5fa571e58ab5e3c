mod openai;
mod test_provider;

use crate::completion::CompletionModel;
use crate::model::{ModelConfig, ModelProvider};
use anyhow::Result;
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip(model_config))]
pub fn get_completion_model(model_config: ModelConfig) -> Result<Arc<dyn CompletionModel>> {
    match model_config.provider {
        ModelProvider::Openai => {
            let model = openai::OpenAIModel::new(model_config)?;
            Ok(Arc::new(model))
        }
        ModelProvider::Test => {
            let model = test_provider::TestProviderModel::new(model_config)?;
            Ok(Arc::new(model))
        }
    }
}
