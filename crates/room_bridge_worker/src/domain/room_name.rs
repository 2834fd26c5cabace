use crate::domain::identity_resolver::IdentityResolver;
use crate::domain::transformer::Projection;
use common::domain::{
    DomainResult, Extension, GroupResource, NameChange, Resource, RoomEvent,
    EVENT_ACTION_EXTENSION,
};
use tracing::{debug, info};

const EVENT_ACTION_UPDATE: &str = "update";

/// `m.room.name`: registers the room if needed, records the new name and
/// emits the renamed group.
pub async fn transform(
    event: &RoomEvent,
    identities: &IdentityResolver,
) -> DomainResult<Vec<Projection>> {
    let name = event.require_content_str("name")?;
    let room = identities.register_room(event).await?;

    match identities.record_room_name(&event.room_id, name).await? {
        NameChange::Replaced { previous } => {
            info!(room_id = %event.room_id, previous = %previous, name = %name, "room renamed")
        }
        change => debug!(room_id = %event.room_id, ?change, "room name recorded"),
    }

    let mut group = GroupResource::for_room(room.identifier);
    group.name = Some(name.to_string());
    group
        .extensions
        .push(Extension::string(EVENT_ACTION_EXTENSION, EVENT_ACTION_UPDATE));

    Ok(vec![Projection::update(Resource::Group(group))])
}
