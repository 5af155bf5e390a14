//! Bot wire types: request and response JSON bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested response mode. `Streaming` is only a hint to the remote service; replies are always read as one JSON body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Streaming,
    #[default]
    Blocking,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Streaming => "streaming",
            ResponseMode::Blocking => "blocking",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "streaming" => Ok(ResponseMode::Streaming),
            "blocking" => Ok(ResponseMode::Blocking),
            other => Err(format!(
                "unknown response mode: {} (expected \"streaming\" or \"blocking\")",
                other
            )),
        }
    }
}

/// Body of `POST {baseUrl}{endpointPath}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotRequest {
    pub query: String,
    pub user: String,
    pub response_mode: ResponseMode,
    /// Reserved by the remote service; always sent as `{}`.
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    /// Reserved by the remote service; omitted unless set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<serde_json::Value>>,
}

/// Reply from the bot service. Only `answer` is required; the other fields are passed through as
/// whatever JSON the service sent (ids may be strings, numbers or null).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotResponse {
    #[serde(default)]
    pub event: serde_json::Value,
    #[serde(default)]
    pub task_id: serde_json::Value,
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub message_id: serde_json::Value,
    #[serde(default)]
    pub conversation_id: serde_json::Value,
    #[serde(default)]
    pub mode: serde_json::Value,
    pub answer: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Seconds since the Unix epoch; integer or fractional.
    #[serde(default)]
    pub created_at: serde_json::Value,
}

/// String ids as-is, numeric ids in decimal; anything else (null, missing, blank) is `None`.
fn opaque_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl BotResponse {
    /// `conversation_id` as text, when the service sent one.
    pub fn conversation_id_text(&self) -> Option<String> {
        opaque_id(&self.conversation_id)
    }

    /// `message_id` as text, when the service sent one.
    pub fn message_id_text(&self) -> Option<String> {
        opaque_id(&self.message_id)
    }

    /// `created_at` as a UTC timestamp; `None` when missing, non-numeric or out of range.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        if let Some(secs) = self.created_at.as_i64() {
            return DateTime::from_timestamp(secs, 0);
        }
        let secs = self.created_at.as_f64()?;
        if !secs.is_finite() || secs < i64::MIN as f64 || secs >= i64::MAX as f64 {
            return None;
        }
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_absent_ids_and_files() {
        let req = BotRequest {
            query: "hi".to_string(),
            user: "u-1".to_string(),
            response_mode: ResponseMode::Blocking,
            inputs: serde_json::Map::new(),
            conversation_id: None,
            parent_message_id: None,
            files: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "query": "hi",
                "user": "u-1",
                "response_mode": "blocking",
                "inputs": {}
            })
        );
    }

    #[test]
    fn request_includes_ids_when_present() {
        let req = BotRequest {
            query: "next".to_string(),
            user: "u-1".to_string(),
            response_mode: ResponseMode::Streaming,
            inputs: serde_json::Map::new(),
            conversation_id: Some("c-9".to_string()),
            parent_message_id: Some("m-3".to_string()),
            files: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["response_mode"], "streaming");
        assert_eq!(v["conversation_id"], "c-9");
        assert_eq!(v["parent_message_id"], "m-3");
        assert!(v.get("files").is_none());
    }

    #[test]
    fn response_keeps_opaque_metadata() {
        let body = r#"{
            "event": "message",
            "task_id": "t",
            "id": "i",
            "message_id": "m",
            "conversation_id": "c",
            "mode": "chat",
            "answer": "**hi**",
            "metadata": {"usage": {"tokens": 3}},
            "created_at": 1700000000
        }"#;
        let res: BotResponse = serde_json::from_str(body).unwrap();
        assert_eq!(res.answer, "**hi**");
        assert_eq!(res.metadata["usage"]["tokens"], 3);
        assert_eq!(res.created_at_utc().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn response_tolerates_null_and_numeric_fields() {
        let body = r#"{
            "id": 42,
            "message_id": 7,
            "conversation_id": null,
            "mode": null,
            "answer": "ok",
            "created_at": 1700000000.25
        }"#;
        let res: BotResponse = serde_json::from_str(body).unwrap();
        assert_eq!(res.answer, "ok");
        assert_eq!(res.id, 42);
        assert_eq!(res.message_id_text().as_deref(), Some("7"));
        assert_eq!(res.conversation_id_text(), None);
        let at = res.created_at_utc().unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn out_of_range_or_missing_created_at_is_none() {
        let res: BotResponse = serde_json::from_str(r#"{"answer":"a","created_at":1e300}"#).unwrap();
        assert!(res.created_at_utc().is_none());
        let res: BotResponse = serde_json::from_str(r#"{"answer":"a","created_at":"soon"}"#).unwrap();
        assert!(res.created_at_utc().is_none());
        let res: BotResponse = serde_json::from_str(r#"{"answer":"a"}"#).unwrap();
        assert!(res.created_at_utc().is_none());
        assert_eq!(res.conversation_id_text(), None);
    }

    #[test]
    fn response_without_answer_is_rejected() {
        assert!(serde_json::from_str::<BotResponse>(r#"{"event":"message"}"#).is_err());
    }

    #[test]
    fn response_mode_parses_case_insensitively() {
        assert_eq!("Streaming".parse::<ResponseMode>(), Ok(ResponseMode::Streaming));
        assert_eq!(" blocking ".parse::<ResponseMode>(), Ok(ResponseMode::Blocking));
        assert!("chunked".parse::<ResponseMode>().is_err());
    }
}
