use crate::chat::{Message, Role};
use crate::completion::{CancellationToken, CompletionModel, CompletionResponse};
use crate::model::ModelConfig;
use anyhow::{Result, anyhow};
use async_openai::config::OpenAIConfig;
use async_openai::{
    Client as OpenAIClient,
    types::chat::{ChatCompletionRequestMessage, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAISettings {
    base_url: String,
    api_key: String,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f32,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

pub struct OpenAIModel {
    config: ModelConfig,
    settings: OpenAISettings,
    client: OpenAIClient<OpenAIConfig>,
}

impl OpenAIModel {
    pub fn new(model_config: ModelConfig) -> Result<Self> {
        let settings: OpenAISettings = serde_yaml::from_value(
            serde_yaml::to_value(&model_config.settings)
                .map_err(|_e| anyhow!("Invalid settings structure"))?,
        )?;

        // If api_key starts with "env:", read from environment variable
        let api_key = if settings.api_key.starts_with("env:") {
            let env_key = &settings.api_key[4..].trim();
            std::env::var(env_key)
                .map_err(|_| anyhow!("Environment variable {} not found", env_key))?
        } else {
            settings.api_key.clone()
        };

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.clone())
            .with_api_base(settings.base_url.clone());

        let client = OpenAIClient::with_config(openai_config);

        let resolved_settings = OpenAISettings { api_key, ..settings };

        Ok(Self {
            config: model_config,
            settings: resolved_settings,
            client,
        })
    }

    fn to_openai_message(role: Role, content: &str) -> ChatCompletionRequestMessage {
        match role {
            Role::System => ChatCompletionRequestMessage::System(
                async_openai::types::chat::ChatCompletionRequestSystemMessageArgs::default()
                    .content(content)
                    .build()
                    .unwrap(),
            ),
            Role::Assistant => ChatCompletionRequestMessage::Assistant(
                async_openai::types::chat::ChatCompletionRequestAssistantMessageArgs::default()
                    .content(content)
                    .build()
                    .unwrap(),
            ),
            Role::User => ChatCompletionRequestMessage::User(
                async_openai::types::chat::ChatCompletionRequestUserMessageArgs::default()
                    .content(content)
                    .build()
                    .unwrap(),
            ),
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAIModel {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<CompletionResponse>> {
        // The composed system instruction leads; history follows verbatim.
        let mut openai_messages = vec![Self::to_openai_message(Role::System, system_prompt)];
        openai_messages.extend(
            messages
                .iter()
                .map(|msg| Self::to_openai_message(msg.role, &msg.content)),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.config.name.clone())
            .messages(openai_messages)
            .max_tokens(self.settings.max_tokens)
            .temperature(self.settings.temperature)
            .stream(true)
            .build();

        let request = match request {
            Ok(req) => req,
            Err(err) => {
                return Box::pin(futures::stream::once(async move {
                    Err(anyhow!("Invalid request: {:?}", err))
                }));
            }
        };

        let client = self.client.clone();
        let outer_stream = async_stream::stream! {
            match client.chat().create_stream(request).await {
                Ok(mut stream) => {
                    while let Some(next) = stream.next().await {
                        // Check for cancellation *before* processing the chunk
                        if cancel_token.is_cancelled() {
                            break;
                        }

                        match next {
                            Ok(chunk) => {
                                if let Some(choice) = chunk.choices.first() {
                                    let text = choice.delta.content.clone().unwrap_or_default();
                                    yield Ok(CompletionResponse {
                                        text,
                                        finish_reason: choice
                                            .finish_reason
                                            .as_ref()
                                            .map(|x| format!("{x:?}").to_lowercase()),
                                    });
                                }
                            }
                            Err(err) => {
                                yield Err(anyhow!("OpenAI stream error: {}", err));
                                break;
                            }
                        }
                    }
                }
                Err(err) => {
                    yield Err(anyhow!("OpenAI request failed: {:?}", err));
                }
            }
        };

        Box::pin(outer_stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelProvider;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    // Create a mock event stream body
    fn mock_event_stream_body() -> String {
        let events = vec![
            json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "created": 1684,
                "model": "gpt-4o-mini",
                "choices": [{
                    "delta": {"content": "Hello"},
                    "index": 0,
                    "finish_reason": serde_json::Value::Null
                }]
            }),
            json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "created": 1684,
                "model": "gpt-4o-mini",
                "choices": [{
                    "delta": {"content": " world"},
                    "index": 0,
                    "finish_reason": serde_json::Value::Null
                }]
            }),
            json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "created": 1684,
                "model": "gpt-4o-mini",
                "choices": [{
                    "delta": {},
                    "index": 0,
                    "finish_reason": "stop"
                }],
            }),
        ];

        let mut mock_body = events
            .into_iter()
            .map(|event| format!("data: {}\n\n", serde_json::to_string(&event).unwrap()))
            .collect::<String>();
        mock_body.push_str("data: [DONE]\n\n");
        mock_body
    }

    // Create a test model configuration with mock server URL
    fn create_mock_model_config(server_url: &str) -> ModelConfig {
        let settings: HashMap<String, serde_yaml::Value> = HashMap::from([
            ("base_url".to_string(), server_url.into()),
            ("api_key".to_string(), "MOCK_OPENAI_API_KEY".into()),
        ]);

        ModelConfig {
            name: "test-model".to_string(),
            provider: ModelProvider::Openai,
            settings,
        }
    }

    #[tokio::test]
    async fn test_openai_new_model() {
        let server = MockServer::start().await;
        let config = create_mock_model_config(&server.uri());
        let model = OpenAIModel::new(config).unwrap();

        assert_eq!(model.config.name, "test-model");
        assert_eq!(model.settings.max_tokens, 1024);
    }

    #[tokio::test]
    async fn test_openai_complete_api() {
        let server = MockServer::start().await;
        let config = create_mock_model_config(&server.uri());

        let mock_response = ResponseTemplate::new(200)
            .set_body_raw(mock_event_stream_body(), "text/event-stream")
            .insert_header("Connection", "close");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(mock_response)
            .mount(&server)
            .await;

        let model = OpenAIModel::new(config).unwrap();

        let messages = vec![Message::new(Role::User, "Hello")];
        let cancel_token = CancellationToken::new();
        let mut stream = model
            .complete("You are a test assistant.", &messages, cancel_token)
            .await;

        let mut responses = Vec::new();
        while let Some(chunk_result) = stream.next().await {
            responses.push(chunk_result.unwrap());
        }

        // Two content chunks and one finish reason
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].text, "Hello");
        assert_eq!(responses[1].text, " world");
        assert_eq!(responses[2].text, "");
        assert_eq!(responses[2].finish_reason, Some("stop".to_string()));
    }

    #[tokio::test]
    async fn test_openai_complete_cancel_stops_stream() {
        let server = MockServer::start().await;
        let config = create_mock_model_config(&server.uri());

        let mock_response = ResponseTemplate::new(200)
            .set_body_raw(mock_event_stream_body(), "text/event-stream")
            .insert_header("Connection", "close");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(mock_response)
            .mount(&server)
            .await;

        let model = OpenAIModel::new(config).unwrap();
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let messages = vec![Message::new(Role::User, "Hello")];
        let mut stream = model.complete("sys", &messages, cancel_token).await;

        // Cancelled before the first chunk is processed; stream ends silently.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_openai_complete_upstream_failure() {
        let server = MockServer::start().await;
        let config = create_mock_model_config(&server.uri());

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let model = OpenAIModel::new(config).unwrap();
        let messages = vec![Message::new(Role::User, "Hello")];
        let mut stream = model
            .complete("sys", &messages, CancellationToken::new())
            .await;

        let first = stream.next().await.unwrap();
        assert!(first.is_err());
        assert!(stream.next().await.is_none());
    }
}
