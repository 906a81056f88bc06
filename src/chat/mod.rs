//! Chat completion service seam and wire types.

pub mod http;

use crate::error::{Result, WidgetError};
use crate::session::{Role, Turn};
use async_trait::async_trait;
use serde::Serialize;

pub use http::HttpChatClient;

/// Response keys that may carry the assistant reply, highest priority first.
pub const REPLY_KEYS: [&str; 4] = ["reply", "text", "response", "message"];

/// One context turn in `recentMessages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentMessage {
    pub role: Role,
    pub text: String,
}

impl From<&Turn> for RecentMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            text: turn.text.clone(),
        }
    }
}

/// Body of a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: String,
    pub business_id: String,
    pub message: String,
    pub recent_messages: Vec<RecentMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Remote chat completion endpoint.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Send one user message and return the assistant's reply text.
    async fn send(&self, request: &ChatRequest) -> Result<String>;
}

/// Pull the reply out of a chat response body.
///
/// The first key in [`REPLY_KEYS`] holding a non-blank string wins. A body
/// with no such key is a protocol error.
pub fn extract_reply(body: &serde_json::Value) -> Result<String> {
    let Some(object) = body.as_object() else {
        return Err(WidgetError::Protocol(
            "chat response is not a JSON object".to_owned(),
        ));
    };
    REPLY_KEYS
        .iter()
        .filter_map(|key| object.get(*key).and_then(serde_json::Value::as_str))
        .find(|reply| !reply.trim().is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            WidgetError::Protocol(format!(
                "chat response has no reply under any of {}",
                REPLY_KEYS.join("|")
            ))
        })
}
