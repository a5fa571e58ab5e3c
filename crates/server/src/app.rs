//! The relay endpoint: one route that forwards a conversation to the model
//! provider and streams the reply back as NDJSON frames.
//!
//! The relay is stateless: it keeps no conversation store and trusts the
//! client-supplied history entirely. Conversation content is never logged.
use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use futures::StreamExt;
use mbtichat_core::chat::ChatRequest;
use mbtichat_core::completion::{CancellationToken, CompletionModel};
use mbtichat_core::wire::StreamFrame;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub model: Arc<dyn CompletionModel>,
}

#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Relays one chat request to the model provider.
///
/// Validation happens before any provider call: a malformed body, an unknown
/// persona tag, or an empty history rejects with 400. A provider failure
/// after that becomes an explicit `error` frame; the `done` frame only
/// follows a stream the provider finished itself.
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, RequestError> {
    let Json(request) = payload.map_err(|e| RequestError::InvalidRequest(e.body_text()))?;
    if request.messages.is_empty() {
        return Err(RequestError::InvalidRequest(
            "messages must not be empty".to_string(),
        ));
    }

    tracing::debug!(
        persona = %request.persona_tag,
        history_len = request.messages.len(),
        "relaying chat request"
    );

    let system_prompt = request.persona_tag.system_prompt();
    let cancel_token = CancellationToken::new();
    let mut completion = state
        .model
        .complete(&system_prompt, &request.messages, cancel_token)
        .await;

    let frames = async_stream::stream! {
        let mut finish_reason: Option<String> = None;
        let mut failed = false;
        while let Some(next) = completion.next().await {
            match next {
                Ok(chunk) => {
                    if let Some(reason) = chunk.finish_reason {
                        finish_reason = Some(reason);
                    }
                    if !chunk.text.is_empty() {
                        let frame = StreamFrame::Delta { text: chunk.text };
                        yield Ok::<_, Infallible>(Bytes::from(frame.encode()));
                    }
                }
                Err(e) => {
                    tracing::warn!("provider stream failed: {e:#}");
                    failed = true;
                    let frame = StreamFrame::Error { message: e.to_string() };
                    yield Ok(Bytes::from(frame.encode()));
                    break;
                }
            }
        }
        if !failed {
            let frame = StreamFrame::Done { finish_reason };
            yield Ok(Bytes::from(frame.encode()));
        }
    };

    let body = Body::from_stream(frames);
    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        body,
    )
        .into_response())
}
