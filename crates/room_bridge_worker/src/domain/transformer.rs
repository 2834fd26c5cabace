use crate::domain::event_classifier::EventKind;
use crate::domain::identity_resolver::IdentityResolver;
use crate::domain::{room_create, room_message, room_name, room_state};
use common::domain::{DomainResult, Operation, Resource, RoomEvent};
use tracing::{debug, instrument};

/// One resource produced from an event, with the operation downstream should apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub resource: Resource,
    pub operation: Operation,
}

impl Projection {
    pub fn create(resource: Resource) -> Self {
        Self {
            resource,
            operation: Operation::Create,
        }
    }

    pub fn update(resource: Resource) -> Self {
        Self {
            resource,
            operation: Operation::Update,
        }
    }
}

/// Routes a classified event to the transformer for its kind.
#[derive(Clone)]
pub struct EventTransformer {
    identities: IdentityResolver,
}

impl EventTransformer {
    pub fn new(identities: IdentityResolver) -> Self {
        Self { identities }
    }

    /// Project `event` into zero or more resources. Kinds that carry no
    /// projected resource give an empty list.
    #[instrument(skip(self, event), fields(event_id = %event.event_id, kind = %kind))]
    pub async fn transform(&self, kind: EventKind, event: &RoomEvent) -> DomainResult<Vec<Projection>> {
        let identities = &self.identities;
        match kind {
            EventKind::RoomCreate => room_create::transform(event, identities).await,
            EventKind::RoomJoinRules => room_state::join_rules(event, identities).await,
            EventKind::RoomCanonicalAlias => room_state::canonical_alias(event, identities).await,
            EventKind::RoomAliases => room_state::aliases(event, identities).await,
            EventKind::RoomMember => room_state::member(event, identities).await,
            EventKind::RoomName => room_name::transform(event, identities).await,
            EventKind::RoomMessage => room_message::transform(event, identities).await,
            EventKind::RoomPowerLevels | EventKind::RoomRedaction | EventKind::Unhandled => {
                debug!(event_type = %event.event_type, "event kind not projected");
                Ok(Vec::new())
            }
        }
    }
}
