//! Completion provider contract and cancellation primitive.
use crate::chat::Message;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Cooperative cancellation flag shared between a stream producer and its
/// consumer. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One incremental fragment of a model reply.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: String,
    pub finish_reason: Option<String>,
}

/// A completion capability: system instruction plus message history in, a
/// lazy finite fragment stream out. The stream is non-restartable and must
/// stop yielding promptly once the token is cancelled.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<CompletionResponse>>;
}
