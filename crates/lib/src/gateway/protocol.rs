//! Chat API wire types (`/api/chat`).

use serde::{Deserialize, Serialize};

use crate::bot::ResponseMode;
use crate::chat::ChatRole;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParams {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub parent_message_id: Option<String>,
    /// Override the configured response mode for this message.
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
}

/// Successful reply to `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    /// Raw answer from the bot.
    pub answer: String,
    /// Sanitized HTML rendering of `answer`.
    pub html: String,
    /// Absent when the bot sent no usable id (null, blank or missing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Error body for `/api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatErrorBody {
    pub error: String,
}

/// One entry of `GET /api/chat`. `html` is set for bot entries only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Treat blank ids from the browser as absent.
pub(crate) fn non_blank(id: Option<String>) -> Option<String> {
    id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
