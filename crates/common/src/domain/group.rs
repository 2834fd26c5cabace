use crate::domain::identifier::CanonicalIdentifier;
use crate::domain::reference::CanonicalReference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const GROUP_PRIORITY_EXTENSION: &str = "urn:room-bridge:extension:group-priority";
pub const ROOM_CREATOR_EXTENSION: &str = "urn:room-bridge:extension:room-creator";
pub const ROOM_FEDERATION_EXTENSION: &str = "urn:room-bridge:extension:room-federation";
pub const ROOM_VERSION_EXTENSION: &str = "urn:room-bridge:extension:room-version";
pub const ROOM_PREDECESSOR_ROOM_EXTENSION: &str = "urn:room-bridge:extension:predecessor-room";
pub const ROOM_PREDECESSOR_EVENT_EXTENSION: &str = "urn:room-bridge:extension:predecessor-event";
pub const EVENT_ACTION_EXTENSION: &str = "urn:room-bridge:extension:event-action";

/// Priority stamped on every group projected from a room.
pub const DEFAULT_GROUP_PRIORITY: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Practitioner,
}

/// Who may join a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRule {
    Public,
    Knock,
    Invite,
    Private,
}

impl JoinRule {
    /// Unknown rules fall back to `Private`.
    pub fn from_rule(rule: &str) -> Self {
        match rule {
            "public" => JoinRule::Public,
            "knock" => JoinRule::Knock,
            "invite" => JoinRule::Invite,
            _ => JoinRule::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    Boolean(bool),
    Integer(i64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub url: String,
    pub value: ExtensionValue,
}

impl Extension {
    pub fn boolean(url: &str, value: bool) -> Self {
        Self {
            url: url.to_string(),
            value: ExtensionValue::Boolean(value),
        }
    }

    pub fn integer(url: &str, value: i64) -> Self {
        Self {
            url: url.to_string(),
            value: ExtensionValue::Integer(value),
        }
    }

    pub fn string(url: &str, value: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            value: ExtensionValue::String(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub entity: CanonicalReference,
    pub inactive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_start: Option<DateTime<Utc>>,
}

/// Projection of a room's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResource {
    pub identifiers: Vec<CanonicalIdentifier>,
    pub kind: GroupKind,
    pub active: bool,
    pub actual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_alias: Option<CanonicalIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_rule: Option<JoinRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managing_entity: Option<CanonicalReference>,
    #[serde(default)]
    pub members: Vec<GroupMember>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

impl GroupResource {
    /// An active practitioner group known by `identifier` and nothing else.
    pub fn for_room(identifier: CanonicalIdentifier) -> Self {
        Self {
            identifiers: vec![identifier],
            kind: GroupKind::Practitioner,
            active: true,
            actual: true,
            name: None,
            canonical_alias: None,
            join_rule: None,
            managing_entity: None,
            members: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn extension(&self, url: &str) -> Option<&ExtensionValue> {
        self.extensions
            .iter()
            .find(|e| e.url == url)
            .map(|e| &e.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_rule_mapping() {
        assert_eq!(JoinRule::from_rule("public"), JoinRule::Public);
        assert_eq!(JoinRule::from_rule("knock"), JoinRule::Knock);
        assert_eq!(JoinRule::from_rule("invite"), JoinRule::Invite);
        assert_eq!(JoinRule::from_rule("private"), JoinRule::Private);
        assert_eq!(JoinRule::from_rule("restricted"), JoinRule::Private);
    }

    #[test]
    fn test_extension_lookup() {
        let mut group = GroupResource::for_room(CanonicalIdentifier::temporary("!r:x"));
        group
            .extensions
            .push(Extension::boolean(ROOM_FEDERATION_EXTENSION, false));

        assert_eq!(
            group.extension(ROOM_FEDERATION_EXTENSION),
            Some(&ExtensionValue::Boolean(false))
        );
        assert!(group.extension(ROOM_VERSION_EXTENSION).is_none());
    }

    #[test]
    fn test_extension_value_serializes_bare() {
        let json = serde_json::to_value(Extension::integer(GROUP_PRIORITY_EXTENSION, 50)).unwrap();
        assert_eq!(json["value"], 50);
    }
}
