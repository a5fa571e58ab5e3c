//! Client-side conversation state machine.
//!
//! The client owns the transcript; the relay is stateless. Each submission
//! sends the full visible transcript plus the newly composed message, then
//! grows an assistant placeholder as fragments arrive, in strict arrival
//! order.
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use mbtichat_core::chat::{ChatRequest, Message, Role};
use mbtichat_core::completion::CancellationToken;
use mbtichat_core::persona::Persona;
use mbtichat_core::wire::StreamFrame;

/// Transport to the relay endpoint. Abstracted so the session state machine
/// is testable without a server.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<BoxStream<'static, Result<StreamFrame>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
}

/// How a turn ended. An abruptly closed stream is `Interrupted`, never
/// `Completed`: the relay marks normal completion with an explicit frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed { finish_reason: Option<String> },
    Cancelled,
    Interrupted { message: String },
}

pub struct ChatSession<R: Relay> {
    relay: R,
    persona: Persona,
    messages: Vec<Message>,
    state: SessionState,
}

impl<R: Relay> ChatSession<R> {
    pub fn new(relay: R, persona: Persona) -> Self {
        Self {
            relay,
            persona,
            messages: Vec::new(),
            state: SessionState::Idle,
        }
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    /// Pure state update; takes effect on the next submitted request only.
    pub fn select_persona(&mut self, persona: Persona) {
        self.persona = persona;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Submits composed text and streams the reply into the transcript.
    ///
    /// No-op (returns `Ok(None)`) if the text is empty/whitespace or the
    /// session is not idle. Otherwise appends exactly one user message and
    /// an assistant placeholder, then consumes the reply stream, invoking
    /// `on_delta` for each fragment as it lands in the placeholder.
    pub async fn submit(
        &mut self,
        text: &str,
        cancel_token: CancellationToken,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<Option<TurnOutcome>> {
        if self.state != SessionState::Idle || text.trim().is_empty() {
            return Ok(None);
        }

        self.messages.push(Message::new(Role::User, text));
        let request = ChatRequest {
            messages: self.messages.clone(),
            persona_tag: self.persona,
        };

        self.messages.push(Message::new(Role::Assistant, ""));
        let placeholder = self.messages.len() - 1;

        let outcome = self
            .run_turn(request, placeholder, false, cancel_token, on_delta)
            .await?;
        Ok(Some(outcome))
    }

    /// Requests a fresh completion for the same prompt context.
    ///
    /// The trailing assistant message is dropped from the outgoing request
    /// but stays visible until the fresh stream replaces it. No-op unless
    /// the session is idle and a resubmittable transcript exists.
    pub async fn regenerate(
        &mut self,
        cancel_token: CancellationToken,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<Option<TurnOutcome>> {
        if self.state != SessionState::Idle || self.messages.is_empty() {
            return Ok(None);
        }

        let mut history = self.messages.clone();
        let trailing_assistant = history.last().map(|m| m.role) == Some(Role::Assistant);
        if trailing_assistant {
            history.pop();
        }
        if history.is_empty() {
            // Nothing left to prompt with.
            return Ok(None);
        }
        let placeholder = if trailing_assistant {
            self.messages.len() - 1
        } else {
            self.messages.push(Message::new(Role::Assistant, ""));
            self.messages.len() - 1
        };

        let request = ChatRequest {
            messages: history,
            persona_tag: self.persona,
        };
        let outcome = self
            .run_turn(request, placeholder, true, cancel_token, on_delta)
            .await?;
        Ok(Some(outcome))
    }

    async fn run_turn(
        &mut self,
        request: ChatRequest,
        placeholder: usize,
        replace: bool,
        cancel_token: CancellationToken,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<TurnOutcome> {
        self.state = SessionState::Streaming;
        let outcome = self
            .consume(request, placeholder, replace, cancel_token, on_delta)
            .await;
        self.state = SessionState::Idle;
        outcome
    }

    async fn consume(
        &mut self,
        request: ChatRequest,
        placeholder: usize,
        replace: bool,
        cancel_token: CancellationToken,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<TurnOutcome> {
        let mut stream = match self.relay.chat(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                return Ok(TurnOutcome::Interrupted {
                    message: format!("{e:#}"),
                });
            }
        };

        let mut replaced = !replace;
        let mut outcome = None;

        while let Some(frame) = stream.next().await {
            // Check for cancellation *before* processing the frame; once
            // requested, nothing further is appended even if in flight.
            if cancel_token.is_cancelled() {
                outcome = Some(TurnOutcome::Cancelled);
                break;
            }

            match frame {
                Ok(StreamFrame::Delta { text }) => {
                    if !replaced {
                        // The stale reply survives until the fresh one starts.
                        self.messages[placeholder].content.clear();
                        replaced = true;
                    }
                    self.messages[placeholder].content.push_str(&text);
                    on_delta(&text);
                }
                Ok(StreamFrame::Done { finish_reason }) => {
                    outcome = Some(TurnOutcome::Completed { finish_reason });
                    break;
                }
                Ok(StreamFrame::Error { message }) => {
                    outcome = Some(TurnOutcome::Interrupted { message });
                    break;
                }
                Err(e) => {
                    outcome = Some(TurnOutcome::Interrupted {
                        message: format!("{e:#}"),
                    });
                    break;
                }
            }
        }

        // A stream that ends without a done frame is incomplete, not a
        // successful answer. Partial content stays in the transcript.
        Ok(outcome.unwrap_or(TurnOutcome::Interrupted {
            message: "stream ended before completion".to_string(),
        }))
    }
}
