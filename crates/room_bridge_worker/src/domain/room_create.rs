use crate::domain::identity_resolver::IdentityResolver;
use crate::domain::transformer::Projection;
use common::domain::{
    CanonicalIdentifier, CanonicalReference, CategoryTag, CommunicationPriority,
    CommunicationResource, CommunicationStatus, DomainResult, Extension, GroupMember,
    GroupResource, Resource, RoomEvent, DEFAULT_GROUP_PRIORITY, GROUP_PRIORITY_EXTENSION,
    ROOM_CREATOR_EXTENSION, ROOM_FEDERATION_EXTENSION, ROOM_PREDECESSOR_EVENT_EXTENSION,
    ROOM_PREDECESSOR_ROOM_EXTENSION, ROOM_VERSION_EXTENSION,
};
use tracing::debug;

/// `m.room.create`: the room's group, then a notification announcing it.
pub async fn transform(
    event: &RoomEvent,
    identities: &IdentityResolver,
) -> DomainResult<Vec<Projection>> {
    let room = identities.register_room(event).await?;

    let creator = match event.content_str("creator") {
        Some(user_id) => Some((user_id, identities.practitioner_reference(user_id).await?)),
        None => None,
    };

    let mut group = GroupResource::for_room(room.identifier.clone());
    group
        .extensions
        .push(Extension::integer(GROUP_PRIORITY_EXTENSION, DEFAULT_GROUP_PRIORITY));

    if let Some((user_id, reference)) = &creator {
        group
            .extensions
            .push(Extension::string(ROOM_CREATOR_EXTENSION, *user_id));
        group.managing_entity = Some(reference.clone());
        group.members.push(GroupMember {
            entity: reference.clone(),
            inactive: false,
            period_start: Some(event.origin_time()),
        });
    }

    if let Some(federate) = event.content_value("m.federate").and_then(|v| v.as_bool()) {
        group
            .extensions
            .push(Extension::boolean(ROOM_FEDERATION_EXTENSION, federate));
    }

    if let Some(version) = event.content_str("room_version") {
        group
            .extensions
            .push(Extension::string(ROOM_VERSION_EXTENSION, version));
    }

    if let Some(predecessor) = event.content_value("predecessor") {
        if let Some(room_id) = predecessor.get("room_id").and_then(|v| v.as_str()) {
            group
                .extensions
                .push(Extension::string(ROOM_PREDECESSOR_ROOM_EXTENSION, room_id));
        }
        if let Some(event_id) = predecessor.get("event_id").and_then(|v| v.as_str()) {
            group
                .extensions
                .push(Extension::string(ROOM_PREDECESSOR_EVENT_EXTENSION, event_id));
        }
    }

    debug!(room_id = %event.room_id, has_creator = creator.is_some(), "built group for new room");

    let notification = creation_notice(event, room, creator.map(|(_, reference)| reference));

    Ok(vec![
        Projection::create(Resource::Group(group)),
        Projection::create(Resource::Communication(notification)),
    ])
}

fn creation_notice(
    event: &RoomEvent,
    room: CanonicalReference,
    creator: Option<CanonicalReference>,
) -> CommunicationResource {
    let sent = event.origin_time();
    CommunicationResource {
        id: event.event_id.clone(),
        identifiers: vec![CanonicalIdentifier::official(&event.event_id).valid_from(sent)],
        status: CommunicationStatus::Completed,
        priority: CommunicationPriority::Routine,
        sent,
        sender: creator,
        subject: room,
        recipients: Vec::new(),
        categories: vec![
            CategoryTag::notification(),
            CategoryTag::room_event(&event.event_type),
        ],
        payload: Vec::new(),
        in_response_to: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        ExtensionValue, InMemoryIdentityCache, Operation, ResourceType,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(
            Arc::new(InMemoryIdentityCache::new()),
            Arc::new(InMemoryIdentityCache::new()),
            Arc::new(InMemoryIdentityCache::new()),
        )
    }

    fn create_event(content: serde_json::Value) -> RoomEvent {
        RoomEvent::parse(
            &json!({
                "type": "m.room.create",
                "event_id": "$create",
                "room_id": "!ward:x",
                "sender": "@alice:x",
                "origin_server_ts": 1_600_000_000_000i64,
                "content": content
            })
            .to_string(),
        )
        .unwrap()
    }

    fn split(projections: Vec<Projection>) -> (GroupResource, CommunicationResource) {
        let mut group = None;
        let mut notice = None;
        for projection in projections {
            assert_eq!(projection.operation, Operation::Create);
            match projection.resource {
                Resource::Group(g) => group = Some(g),
                Resource::Communication(c) => notice = Some(c),
            }
        }
        (group.unwrap(), notice.unwrap())
    }

    #[tokio::test]
    async fn test_room_create_with_full_content() {
        // Arrange
        let event = create_event(json!({
            "creator": "@alice:x",
            "m.federate": false,
            "room_version": "6",
            "predecessor": {"room_id": "!old:x", "event_id": "$tomb"}
        }));

        // Act
        let (group, notice) = split(transform(&event, &resolver()).await.unwrap());

        // Assert
        assert_eq!(group.identifiers[0].value, "!ward:x");
        assert!(group.identifiers[0].is_temporary());
        assert_eq!(
            group.extension(GROUP_PRIORITY_EXTENSION),
            Some(&ExtensionValue::Integer(50))
        );
        assert_eq!(
            group.extension(ROOM_CREATOR_EXTENSION),
            Some(&ExtensionValue::String("@alice:x".to_string()))
        );
        assert_eq!(
            group.extension(ROOM_FEDERATION_EXTENSION),
            Some(&ExtensionValue::Boolean(false))
        );
        assert_eq!(
            group.extension(ROOM_VERSION_EXTENSION),
            Some(&ExtensionValue::String("6".to_string()))
        );
        assert_eq!(
            group.extension(ROOM_PREDECESSOR_ROOM_EXTENSION),
            Some(&ExtensionValue::String("!old:x".to_string()))
        );
        assert_eq!(
            group.extension(ROOM_PREDECESSOR_EVENT_EXTENSION),
            Some(&ExtensionValue::String("$tomb".to_string()))
        );

        let manager = group.managing_entity.as_ref().unwrap();
        assert_eq!(manager.target_type, ResourceType::Practitioner);
        assert_eq!(group.members.len(), 1);
        assert_eq!(&group.members[0].entity, manager);

        assert_eq!(notice.id, "$create");
        assert!(!notice.identifiers[0].is_temporary());
        assert_eq!(notice.sender.as_ref(), Some(manager));
        assert_eq!(notice.subject.target_type, ResourceType::Group);
        assert_eq!(notice.categories[1].code, "m.room.create");
        assert!(notice.payload.is_empty());
    }

    #[tokio::test]
    async fn test_room_create_optional_fields_absent() {
        let event = create_event(json!({}));

        let (group, notice) = split(transform(&event, &resolver()).await.unwrap());

        assert!(group.managing_entity.is_none());
        assert!(group.members.is_empty());
        assert!(group.extension(ROOM_FEDERATION_EXTENSION).is_none());
        assert!(group.extension(ROOM_VERSION_EXTENSION).is_none());
        assert_eq!(group.extensions.len(), 1);
        assert!(notice.sender.is_none());
    }

    #[tokio::test]
    async fn test_room_create_populates_room_cache() {
        // Arrange
        let identities = resolver();
        let event = create_event(json!({"creator": "@alice:x"}));

        // Act
        let (group, _) = split(transform(&event, &identities).await.unwrap());
        let later = identities.room_reference(&event).await.unwrap();

        // Assert
        assert_eq!(later.identifier, group.identifiers[0]);
    }
}
