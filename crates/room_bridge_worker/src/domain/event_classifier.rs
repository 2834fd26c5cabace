use std::fmt;

/// Handler tag for a room event, resolved once from its `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RoomCreate,
    RoomJoinRules,
    RoomCanonicalAlias,
    RoomAliases,
    RoomMember,
    RoomPowerLevels,
    RoomRedaction,
    RoomMessage,
    RoomName,
    Unhandled,
}

// Checked in order; the first match wins.
const EVENT_TYPES: &[(&str, EventKind)] = &[
    ("m.room.create", EventKind::RoomCreate),
    ("m.room.join_rules", EventKind::RoomJoinRules),
    ("m.room.canonical_alias", EventKind::RoomCanonicalAlias),
    ("m.room.canonical_aliases", EventKind::RoomCanonicalAlias),
    ("m.room.aliases", EventKind::RoomAliases),
    ("m.room.member", EventKind::RoomMember),
    ("m.room.power_levels", EventKind::RoomPowerLevels),
    ("m.room.redaction", EventKind::RoomRedaction),
    ("m.room.message", EventKind::RoomMessage),
    ("m.room.name", EventKind::RoomName),
];

impl EventKind {
    /// Classify an event type. Matching is exact but ignores ASCII case.
    pub fn classify(event_type: &str) -> Self {
        let event_type = event_type.trim();
        EVENT_TYPES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(event_type))
            .map(|(_, kind)| *kind)
            .unwrap_or(EventKind::Unhandled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RoomCreate => "ROOM_CREATE",
            EventKind::RoomJoinRules => "ROOM_JOIN_RULES",
            EventKind::RoomCanonicalAlias => "ROOM_CANONICAL_ALIAS",
            EventKind::RoomAliases => "ROOM_ALIASES",
            EventKind::RoomMember => "ROOM_MEMBER",
            EventKind::RoomPowerLevels => "ROOM_POWER_LEVELS",
            EventKind::RoomRedaction => "ROOM_REDACTION",
            EventKind::RoomMessage => "ROOM_MESSAGE",
            EventKind::RoomName => "ROOM_NAME",
            EventKind::Unhandled => "UNHANDLED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
