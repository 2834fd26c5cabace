use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier system for every identity minted from the room server.
pub const ROOM_SERVER_IDENTIFIER_SYSTEM: &str = "urn:room-bridge:identifier:room-server";

/// Provenance of a canonical identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierUse {
    #[serde(rename = "official")]
    Official,
    #[serde(rename = "temp")]
    Temporary,
}

/// Target-model identifier for a source identity (room, user, event or media item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalIdentifier {
    #[serde(rename = "use")]
    pub identifier_use: IdentifierUse,
    pub system: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
}

impl CanonicalIdentifier {
    pub fn temporary(value: impl Into<String>) -> Self {
        Self {
            identifier_use: IdentifierUse::Temporary,
            system: ROOM_SERVER_IDENTIFIER_SYSTEM.to_string(),
            value: value.into(),
            valid_from: None,
        }
    }

    pub fn official(value: impl Into<String>) -> Self {
        Self {
            identifier_use: IdentifierUse::Official,
            system: ROOM_SERVER_IDENTIFIER_SYSTEM.to_string(),
            value: value.into(),
            valid_from: None,
        }
    }

    pub fn valid_from(self, at: DateTime<Utc>) -> Self {
        Self {
            valid_from: Some(at),
            ..self
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.identifier_use == IdentifierUse::Temporary
    }
}
