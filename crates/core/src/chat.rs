//! Conversation data model shared by the relay and the client.
use crate::persona::Persona;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender of a chat message (serialized as lowercase strings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
///
/// Messages are created client-side. The id is opaque; ordering is insertion
/// order within the transcript, never the id or the timestamp.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            id: format!("msg_{:016x}", rand::random::<u64>()),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Request body of the relay endpoint.
///
/// Built fresh per submission from current client state. The persona tag is
/// a closed enumeration; serde rejects anything outside the set before the
/// request reaches a handler.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub persona_tag: Persona,
}
