//! HTTP transport to the relay endpoint.
use crate::session::Relay;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use mbtichat_core::chat::ChatRequest;
use mbtichat_core::wire::{FrameDecoder, StreamFrame};

pub struct HttpRelay {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpRelay {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn chat(&self, request: &ChatRequest) -> Result<BoxStream<'static, Result<StreamFrame>>> {
        let url = format!("{}/api/chat", self.endpoint);
        tracing::debug!(%url, persona = %request.persona_tag, "posting chat request");
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach relay at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Relay rejected the request ({status}): {body}");
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = FrameDecoder::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(anyhow::Error::new(e).context("Relay stream failed"));
                        break;
                    }
                };
                for frame in decoder.push(&chunk) {
                    yield frame.context("Malformed relay frame");
                }
            }
            // A final line without a trailing newline is still a frame.
            if let Some(frame) = decoder.finish() {
                yield frame.context("Malformed relay frame");
            }
        };
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbtichat_core::chat::{Message, Role};
    use mbtichat_core::persona::Persona;
    use wiremock::matchers::{body_json_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![Message::new(Role::User, "hi")],
            persona_tag: Persona::Enfp,
        }
    }

    #[tokio::test]
    async fn test_chat_decodes_ndjson_frames() {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"type":"delta","text":"Hel"}"#,
            "\n",
            r#"{"type":"delta","text":"lo"}"#,
            "\n",
            r#"{"type":"done","finishReason":"stop"}"#,
            "\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/x-ndjson")
                    .set_body_raw(body, "application/x-ndjson"),
            )
            .mount(&server)
            .await;

        let relay = HttpRelay::new(&server.uri());
        let frames: Vec<_> = relay
            .chat(&request())
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await;

        let frames: Vec<StreamFrame> = frames.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(
            frames,
            vec![
                StreamFrame::Delta {
                    text: "Hel".to_string()
                },
                StreamFrame::Delta {
                    text: "lo".to_string()
                },
                StreamFrame::Done {
                    finish_reason: Some("stop".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_chat_sends_persona_tag_on_the_wire() {
        let server = MockServer::start().await;
        // Message ids and timestamps are fresh per construction, so the
        // matcher must serialize the same request instance that gets sent.
        let sent = request();
        let expected = serde_json::to_string(&sent).unwrap();
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json_string(&expected))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"type":"done","finishReason":null}"#, "application/x-ndjson"),
            )
            .mount(&server)
            .await;

        let relay = HttpRelay::new(&server.uri());
        let frames: Vec<_> = relay
            .chat(&sent)
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await;
        assert_eq!(frames.len(), 1);
    }

    #[tokio::test]
    async fn test_chat_surfaces_rejection_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_raw(r#"{"error":"messages must not be empty"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let relay = HttpRelay::new(&server.uri());
        let err = relay
            .chat(&request())
            .await
            .err()
            .expect("a 400 response should fail the request");
        let text = format!("{err:#}");
        assert!(text.contains("400"));
        assert!(text.contains("messages must not be empty"));
    }
}
