//! Room state events that amend an existing group: join rules, aliases and membership.

use crate::domain::identity_resolver::IdentityResolver;
use crate::domain::transformer::Projection;
use common::domain::{
    CanonicalIdentifier, DomainResult, GroupMember, GroupResource, JoinRule, Resource, RoomEvent,
};
use serde_json::Value;

async fn room_group(event: &RoomEvent, identities: &IdentityResolver) -> DomainResult<GroupResource> {
    let room = identities.room_reference(event).await?;
    Ok(GroupResource::for_room(room.identifier))
}

fn alias_identifier(event: &RoomEvent, alias: &str) -> CanonicalIdentifier {
    CanonicalIdentifier::temporary(alias).valid_from(event.origin_time())
}

fn string_items(value: Option<&Value>) -> impl Iterator<Item = &str> {
    value
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
}

/// `m.room.join_rules`
pub async fn join_rules(
    event: &RoomEvent,
    identities: &IdentityResolver,
) -> DomainResult<Vec<Projection>> {
    let mut group = room_group(event, identities).await?;
    group.join_rule = Some(JoinRule::from_rule(
        event.content_str("join_rule").unwrap_or_default(),
    ));
    Ok(vec![Projection::update(Resource::Group(group))])
}

/// `m.room.canonical_alias`: the alias becomes both an identifier and the
/// group's canonical alias; `alt_aliases` are appended as identifiers only.
pub async fn canonical_alias(
    event: &RoomEvent,
    identities: &IdentityResolver,
) -> DomainResult<Vec<Projection>> {
    let mut group = room_group(event, identities).await?;

    if let Some(alias) = event.content_str("alias") {
        let identifier = alias_identifier(event, alias);
        group.identifiers.push(identifier.clone());
        group.canonical_alias = Some(identifier);
    }

    for alias in string_items(event.content_value("alt_aliases")) {
        group.identifiers.push(alias_identifier(event, alias));
    }

    Ok(vec![Projection::update(Resource::Group(group))])
}

/// `m.room.aliases`: zero or more aliases, each an extra identifier.
pub async fn aliases(
    event: &RoomEvent,
    identities: &IdentityResolver,
) -> DomainResult<Vec<Projection>> {
    let mut group = room_group(event, identities).await?;

    for alias in string_items(event.content_value("aliases")) {
        group.identifiers.push(alias_identifier(event, alias));
    }

    Ok(vec![Projection::update(Resource::Group(group))])
}

/// `m.room.member`: the affected user (state key, else sender) as a member,
/// active only while joined.
pub async fn member(
    event: &RoomEvent,
    identities: &IdentityResolver,
) -> DomainResult<Vec<Projection>> {
    let mut group = room_group(event, identities).await?;

    let user_id = event
        .state_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .unwrap_or(event.sender.as_str());

    if !user_id.is_empty() {
        let entity = identities.practitioner_reference(user_id).await?;
        group.members.push(GroupMember {
            entity,
            inactive: event.content_str("membership") != Some("join"),
            period_start: Some(event.origin_time()),
        });
    }

    Ok(vec![Projection::update(Resource::Group(group))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{InMemoryIdentityCache, Operation};
    use serde_json::json;
    use std::sync::Arc;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(
            Arc::new(InMemoryIdentityCache::new()),
            Arc::new(InMemoryIdentityCache::new()),
            Arc::new(InMemoryIdentityCache::new()),
        )
    }

    fn state_event(event_type: &str, state_key: Option<&str>, content: Value) -> RoomEvent {
        let mut raw = json!({
            "type": event_type,
            "event_id": "$state",
            "room_id": "!ward:x",
            "sender": "@alice:x",
            "origin_server_ts": 42,
            "content": content
        });
        if let Some(key) = state_key {
            raw["state_key"] = json!(key);
        }
        RoomEvent::parse(&raw.to_string()).unwrap()
    }

    fn only_group(projections: Vec<Projection>) -> GroupResource {
        assert_eq!(projections.len(), 1);
        assert_eq!(projections[0].operation, Operation::Update);
        match projections.into_iter().next().unwrap().resource {
            Resource::Group(group) => group,
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_rules_mapping() {
        let identities = resolver();

        for (rule, expected) in [
            ("public", JoinRule::Public),
            ("knock", JoinRule::Knock),
            ("invite", JoinRule::Invite),
            ("private", JoinRule::Private),
            ("restricted", JoinRule::Private),
        ] {
            let event = state_event("m.room.join_rules", Some(""), json!({"join_rule": rule}));
            let group = only_group(join_rules(&event, &identities).await.unwrap());
            assert_eq!(group.join_rule, Some(expected), "rule {}", rule);
        }
    }

    #[tokio::test]
    async fn test_join_rules_missing_defaults_private() {
        let event = state_event("m.room.join_rules", Some(""), json!({}));

        let group = only_group(join_rules(&event, &resolver()).await.unwrap());

        assert_eq!(group.join_rule, Some(JoinRule::Private));
    }

    #[tokio::test]
    async fn test_canonical_alias_sets_field_and_identifiers() {
        // Arrange
        let event = state_event(
            "m.room.canonical_alias",
            Some(""),
            json!({"alias": "#ward4:x", "alt_aliases": ["#w4:x"]}),
        );

        // Act
        let group = only_group(canonical_alias(&event, &resolver()).await.unwrap());

        // Assert
        let values: Vec<_> = group.identifiers.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(values, vec!["!ward:x", "#ward4:x", "#w4:x"]);
        assert_eq!(group.canonical_alias.unwrap().value, "#ward4:x");
    }

    #[tokio::test]
    async fn test_aliases_zero_to_many() {
        let identities = resolver();

        let none = state_event("m.room.aliases", Some("x"), json!({"aliases": []}));
        let many = state_event("m.room.aliases", Some("x"), json!({"aliases": ["#a:x", "#b:x", 7]}));

        let none = only_group(aliases(&none, &identities).await.unwrap());
        let many = only_group(aliases(&many, &identities).await.unwrap());

        assert_eq!(none.identifiers.len(), 1);
        assert_eq!(many.identifiers.len(), 3);
    }

    #[tokio::test]
    async fn test_member_uses_state_key() {
        // Arrange
        let event = state_event("m.room.member", Some("@bob:x"), json!({"membership": "join"}));

        // Act
        let group = only_group(member(&event, &resolver()).await.unwrap());

        // Assert
        assert_eq!(group.members.len(), 1);
        assert_eq!(group.members[0].entity.identifier.value, "@bob:x");
        assert!(!group.members[0].inactive);
    }

    #[tokio::test]
    async fn test_member_leave_is_inactive_and_falls_back_to_sender() {
        let event = state_event("m.room.member", None, json!({"membership": "leave"}));

        let group = only_group(member(&event, &resolver()).await.unwrap());

        assert_eq!(group.members[0].entity.identifier.value, "@alice:x");
        assert!(group.members[0].inactive);
    }
}
