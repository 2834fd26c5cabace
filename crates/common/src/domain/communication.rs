use crate::domain::identifier::CanonicalIdentifier;
use crate::domain::reference::CanonicalReference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const COMMUNICATION_CATEGORY_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/communication-category";
pub const COMMUNICATION_CATEGORY_VERSION: &str = "4.0.1";
pub const ROOM_EVENT_CATEGORY_SYSTEM: &str = "https://matrix.org/docs/spec/client_server/";
pub const ROOM_EVENT_CATEGORY_VERSION: &str = "0.6.0";

/// Format tag of the plain-text payload entry.
pub const TEXT_FORMAT: &str = "text";
/// Format tag of the payload carrying unparseable message content verbatim.
pub const MALFORMED_CONTENT_FORMAT: &str = "x-room-bridge.malformed_content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationStatus {
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationPriority {
    Routine,
}

/// Coded category of a communication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTag {
    pub system: String,
    pub version: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    pub text: String,
}

impl CategoryTag {
    pub fn notification() -> Self {
        Self {
            system: COMMUNICATION_CATEGORY_SYSTEM.to_string(),
            version: COMMUNICATION_CATEGORY_VERSION.to_string(),
            code: "notification".to_string(),
            display: Some("Notification".to_string()),
            text: "HL7: Communication Category = Notification".to_string(),
        }
    }

    /// Tag mirroring a room event type or message type, e.g. `m.text`.
    pub fn room_event(code: &str) -> Self {
        Self {
            system: ROOM_EVENT_CATEGORY_SYSTEM.to_string(),
            version: ROOM_EVENT_CATEGORY_VERSION.to_string(),
            code: code.to_string(),
            display: None,
            text: format!("Matrix.org: Event = {}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    pub format: String,
    pub formatted_body: String,
}

impl TextPayload {
    pub fn new(format: impl Into<String>, formatted_body: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            formatted_body: formatted_body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationPayload {
    Text(TextPayload),
    Reference(CanonicalReference),
}

/// Projection of a single room message (or room announcement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationResource {
    pub id: String,
    pub identifiers: Vec<CanonicalIdentifier>,
    pub status: CommunicationStatus,
    pub priority: CommunicationPriority,
    pub sent: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<CanonicalReference>,
    pub subject: CanonicalReference,
    #[serde(default)]
    pub recipients: Vec<CanonicalReference>,
    pub categories: Vec<CategoryTag>,
    #[serde(default)]
    pub payload: Vec<CommunicationPayload>,
    #[serde(default)]
    pub in_response_to: Vec<CanonicalReference>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_event_category() {
        let tag = CategoryTag::room_event("m.text");
        assert_eq!(tag.code, "m.text");
        assert_eq!(tag.text, "Matrix.org: Event = m.text");
        assert_eq!(tag.system, ROOM_EVENT_CATEGORY_SYSTEM);
    }

    #[test]
    fn test_text_payload_wire_shape() {
        let payload = CommunicationPayload::Text(TextPayload::new(TEXT_FORMAT, "Hello"));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"text": {"format": "text", "formatted_body": "Hello"}})
        );
    }
}
