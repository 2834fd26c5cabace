use crate::domain::result::{DomainError, DomainResult};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single room event as emitted by the chat homeserver.
///
/// Only the envelope fields are typed; `content` stays an open JSON object
/// because its shape depends on the event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_server_ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Map<String, Value>>,
}

impl RoomEvent {
    /// Parse one event from its serialized form (as produced by the batch splitter).
    pub fn parse(raw: &str) -> DomainResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| DomainError::Transformation(format!("unparseable room event: {}", e)))
    }

    /// Origin timestamp of the event, or now when the homeserver did not supply one.
    pub fn origin_time(&self) -> DateTime<Utc> {
        self.origin_server_ts
            .filter(|ts| *ts > 0)
            .and_then(|ts| Utc.timestamp_millis_opt(ts).single())
            .unwrap_or_else(Utc::now)
    }

    /// The event content, or `MissingField` when the event carries none.
    pub fn require_content(&self) -> DomainResult<&Map<String, Value>> {
        self.content.as_ref().ok_or_else(|| {
            DomainError::MissingField(format!("{} event has no content", self.event_type))
        })
    }

    /// A required string field of the content.
    pub fn require_content_str(&self, field: &str) -> DomainResult<&str> {
        self.require_content()?
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DomainError::MissingField(format!(
                    "{} event has no content.{}",
                    self.event_type, field
                ))
            })
    }

    pub fn content_value(&self, field: &str) -> Option<&Value> {
        self.content.as_ref().and_then(|c| c.get(field))
    }

    pub fn content_str(&self, field: &str) -> Option<&str> {
        self.content_value(field).and_then(|v| v.as_str())
    }

    /// Event id this event replies to, from `m.relates_to.m.in_reply_to.event_id`.
    pub fn in_reply_to(&self) -> Option<&str> {
        self.content_value("m.relates_to")
            .and_then(|v| v.get("m.in_reply_to"))
            .and_then(|v| v.get("event_id"))
            .and_then(|v| v.as_str())
    }
}
