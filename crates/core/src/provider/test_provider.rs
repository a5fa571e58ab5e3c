//! A mock completion provider for unit testing purposes.
use crate::chat::Message;
use crate::completion::{CancellationToken, CompletionModel, CompletionResponse};
use crate::model::ModelConfig;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};

/// A mock `CompletionModel` for use in unit tests.
///
/// Its behavior is configured via the `response_mode` setting in the
/// `ModelConfig`:
/// - `""` (default): a two-fragment "Hello world" streaming response.
/// - `"echo_system"`: streams the system prompt back, for asserting what
///   instruction the relay composed.
/// - `"error"`: an error response.
/// - `"error_midstream"`: one fragment, then an error.
#[derive(Debug)]
pub struct TestProviderModel {
    config: ModelConfig,
}

impl TestProviderModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        Ok(Self { config })
    }
}

#[async_trait]
impl CompletionModel for TestProviderModel {
    async fn complete(
        &self,
        system_prompt: &str,
        _messages: &[Message],
        _cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<CompletionResponse>> {
        let response_mode: String = self.config.get_setting("response_mode").unwrap_or_default();

        match response_mode.as_str() {
            "error" => {
                let stream = stream::once(async { Err(anyhow!("TestProviderModel error")) });
                Box::pin(stream)
            }
            "error_midstream" => {
                let first = Ok(CompletionResponse {
                    text: "partial".to_string(),
                    finish_reason: None,
                });
                let stream =
                    stream::iter(vec![first, Err(anyhow!("TestProviderModel midstream error"))]);
                Box::pin(stream)
            }
            "echo_system" => {
                let response = Ok(CompletionResponse {
                    text: system_prompt.to_string(),
                    finish_reason: Some("stop".to_string()),
                });
                Box::pin(stream::iter(vec![response]))
            }
            _ => {
                // default is simple text response
                let response1 = Ok(CompletionResponse {
                    text: "Hello".to_string(),
                    finish_reason: None,
                });
                let response2 = Ok(CompletionResponse {
                    text: " world".to_string(),
                    finish_reason: Some("stop".to_string()),
                });
                Box::pin(stream::iter(vec![response1, response2]))
            }
        }
    }
}
