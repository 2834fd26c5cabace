use common::domain::{
    CanonicalIdentifier, CanonicalReference, DomainError, DomainResult, IdentityCache, NameChange,
    ResourceType, RoomEvent, RoomNameMap, RoomReferenceMap, UserIdentifierMap,
};
use std::sync::Arc;
use tracing::debug;

/// TEMPORARY group identifier for the event's room, valid from the event's origin time.
pub fn room_group_identifier(event: &RoomEvent) -> CanonicalIdentifier {
    CanonicalIdentifier::temporary(&event.room_id).valid_from(event.origin_time())
}

/// Group reference synthesized from the event alone, without consulting any cache.
pub fn temporary_room_reference(event: &RoomEvent) -> CanonicalReference {
    CanonicalReference::labelled(
        ResourceType::Group,
        room_group_identifier(event),
        &event.room_id,
    )
}

/// TEMPORARY practitioner identifier for a user id. Equal inputs give equal identifiers.
pub fn temporary_user_identifier(user_id: &str) -> CanonicalIdentifier {
    CanonicalIdentifier::temporary(user_id)
}

/// Resolves source rooms and users to their canonical identities through the
/// room and user identity caches, plus the room-name side mapping.
#[derive(Clone)]
pub struct IdentityResolver {
    rooms: RoomReferenceMap,
    users: UserIdentifierMap,
    names: RoomNameMap,
}

impl IdentityResolver {
    pub fn new(
        rooms: Arc<dyn IdentityCache>,
        users: Arc<dyn IdentityCache>,
        names: Arc<dyn IdentityCache>,
    ) -> Self {
        Self {
            rooms: RoomReferenceMap::new(rooms),
            users: UserIdentifierMap::new(users),
            names: RoomNameMap::new(names),
        }
    }

    /// Canonical reference for the event's room, creating the mapping if this is
    /// the first time the room is seen. Only room creation and naming call this.
    pub async fn register_room(&self, event: &RoomEvent) -> DomainResult<CanonicalReference> {
        require_room_id(event)?;
        if let Some(existing) = self.rooms.get(&event.room_id).await? {
            return Ok(existing);
        }
        self.rooms
            .get_or_insert(&event.room_id, temporary_room_reference(event))
            .await
    }

    /// Canonical reference for the event's room. Falls back to an uncached
    /// TEMPORARY reference when the room has not been registered.
    pub async fn room_reference(&self, event: &RoomEvent) -> DomainResult<CanonicalReference> {
        require_room_id(event)?;
        match self.rooms.get(&event.room_id).await? {
            Some(reference) => Ok(reference),
            None => {
                debug!(room_id = %event.room_id, "room not registered, using temporary reference");
                Ok(temporary_room_reference(event))
            }
        }
    }

    /// Practitioner reference for a user, minting and caching a TEMPORARY
    /// identifier on first sight.
    pub async fn practitioner_reference(&self, user_id: &str) -> DomainResult<CanonicalReference> {
        let identifier = match self.users.get(user_id).await? {
            Some(identifier) => identifier,
            None => {
                self.users
                    .get_or_insert(user_id, temporary_user_identifier(user_id))
                    .await?
            }
        };

        Ok(CanonicalReference::labelled(
            ResourceType::Practitioner,
            identifier,
            user_id,
        ))
    }

    pub async fn record_room_name(&self, room_id: &str, name: &str) -> DomainResult<NameChange> {
        self.names.record(room_id, name).await
    }
}

fn require_room_id(event: &RoomEvent) -> DomainResult<()> {
    if event.room_id.is_empty() {
        return Err(DomainError::MissingField(format!(
            "{} event has no room_id",
            event.event_type
        )));
    }
    Ok(())
}
