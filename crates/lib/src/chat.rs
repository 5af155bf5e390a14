//! In-memory chat history shown by the widget.
//!
//! Ordered, append-only, lives as long as the process. Seeded with the bot greeting.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// First entry of every history.
pub const GREETING: &str = "Hello! How can I help you?";

/// Who wrote an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Bot,
}

/// One history entry (role + raw content; bot content is markdown).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
}

impl ChatEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Bot,
            content: content.into(),
        }
    }
}

/// Shared handle to the history; clones see the same entries.
#[derive(Clone)]
pub struct ChatHistory {
    inner: Arc<RwLock<Vec<ChatEntry>>>,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHistory {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(vec![ChatEntry::bot(GREETING)])),
        }
    }

    pub async fn append(&self, entry: ChatEntry) {
        self.inner.write().await.push(entry);
    }

    /// Snapshot of all entries in order.
    pub async fn entries(&self) -> Vec<ChatEntry> {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_with_greeting() {
        let history = ChatHistory::new();
        assert_eq!(history.entries().await, vec![ChatEntry::bot(GREETING)]);
    }

    #[tokio::test]
    async fn appends_in_order_and_shares_between_clones() {
        let history = ChatHistory::new();
        let other = history.clone();
        history.append(ChatEntry::user("hi")).await;
        other.append(ChatEntry::bot("hello")).await;
        let entries = history.entries().await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], ChatEntry::user("hi"));
        assert_eq!(entries[2], ChatEntry::bot("hello"));
        assert_eq!(other.entries().await, entries);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let v = serde_json::to_value(ChatEntry::user("x")).unwrap();
        assert_eq!(v, serde_json::json!({ "role": "user", "content": "x" }));
    }
}
