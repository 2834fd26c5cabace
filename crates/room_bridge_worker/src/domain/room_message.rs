use crate::domain::identity_resolver::IdentityResolver;
use crate::domain::transformer::Projection;
use common::domain::{
    CanonicalIdentifier, CanonicalReference, CategoryTag, CommunicationPayload,
    CommunicationPriority, CommunicationResource, CommunicationStatus, DomainError, DomainResult,
    ResourceType, Resource, RoomEvent, TextPayload, MALFORMED_CONTENT_FORMAT, TEXT_FORMAT,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const RICH_TEXT_MARKER: &str = "org.matrix.custom.html";

/// Content kinds of `m.room.message`, keyed by `content.msgtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Emote,
    File,
    Location,
    Notice,
    ServerNotice,
}

impl MessageKind {
    pub fn from_msgtype(msgtype: &str) -> Option<Self> {
        let kind = match msgtype {
            "m.text" => MessageKind::Text,
            "m.image" => MessageKind::Image,
            "m.audio" => MessageKind::Audio,
            "m.video" => MessageKind::Video,
            "m.emote" => MessageKind::Emote,
            "m.file" => MessageKind::File,
            "m.location" => MessageKind::Location,
            "m.notice" => MessageKind::Notice,
            "m.server_notice" => MessageKind::ServerNotice,
            _ => return None,
        };
        Some(kind)
    }

    fn media_label(&self) -> Option<&'static str> {
        match self {
            MessageKind::Image => Some("Image"),
            MessageKind::Audio => Some("Audio"),
            MessageKind::Video => Some("Video"),
            _ => None,
        }
    }
}

/// `m.room.message`: one communication per message.
pub async fn transform(
    event: &RoomEvent,
    identities: &IdentityResolver,
) -> DomainResult<Vec<Projection>> {
    let content = event.require_content().map_err(|_| {
        DomainError::Transformation(format!("{} has no content to read msgtype from", event.event_id))
    })?;
    let msgtype = content
        .get("msgtype")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            DomainError::Transformation(format!("{} has no content.msgtype", event.event_id))
        })?;
    let kind = MessageKind::from_msgtype(msgtype)
        .ok_or_else(|| DomainError::UnknownEventType(format!("msgtype {}", msgtype)))?;

    let sent = event.origin_time();

    let sender = if event.sender.is_empty() {
        None
    } else {
        Some(identities.practitioner_reference(&event.sender).await?)
    };
    let subject = identities.room_reference(event).await?;

    let in_response_to = event
        .in_reply_to()
        .map(|event_id| {
            CanonicalReference::new(
                ResourceType::Communication,
                CanonicalIdentifier::official(event_id),
            )
        })
        .into_iter()
        .collect();

    let communication = CommunicationResource {
        id: event.event_id.clone(),
        identifiers: vec![CanonicalIdentifier::official(&event.event_id).valid_from(sent)],
        status: CommunicationStatus::Completed,
        priority: CommunicationPriority::Routine,
        sent,
        sender,
        recipients: vec![subject.clone()],
        subject,
        categories: vec![CategoryTag::notification(), CategoryTag::room_event(msgtype)],
        payload: build_payload(kind, content, event),
        in_response_to,
    };

    Ok(vec![Projection::create(Resource::Communication(communication))])
}

/// Payload entries for a message of `kind`.
pub fn build_payload(
    kind: MessageKind,
    content: &Map<String, Value>,
    event: &RoomEvent,
) -> Vec<CommunicationPayload> {
    match kind {
        MessageKind::Text => text_payload(content),
        MessageKind::Image | MessageKind::Audio | MessageKind::Video => {
            media_reference(kind, content, event)
                .map(CommunicationPayload::Reference)
                .into_iter()
                .collect()
        }
        MessageKind::Emote
        | MessageKind::File
        | MessageKind::Location
        | MessageKind::Notice
        | MessageKind::ServerNotice => {
            debug!(event_id = %event.event_id, ?kind, "message kind carries no payload");
            Vec::new()
        }
    }
}

fn text_payload(content: &Map<String, Value>) -> Vec<CommunicationPayload> {
    let Some(body) = content.get("body").and_then(|v| v.as_str()) else {
        warn!("text message without a string body, keeping raw content");
        let raw = Value::Object(content.clone()).to_string();
        return vec![CommunicationPayload::Text(TextPayload::new(
            MALFORMED_CONTENT_FORMAT,
            raw,
        ))];
    };

    let mut payload = Vec::with_capacity(2);

    let rich = content
        .get("format")
        .and_then(|v| v.as_str())
        .filter(|format| format.contains(RICH_TEXT_MARKER));
    if let Some(format) = rich {
        if let Some(formatted) = content.get("formatted_body").and_then(|v| v.as_str()) {
            payload.push(CommunicationPayload::Text(TextPayload::new(format, formatted)));
        }
    }

    payload.push(CommunicationPayload::Text(TextPayload::new(TEXT_FORMAT, body)));
    payload
}

/// TEMPORARY media reference named after the file, or `None` when `body` or `url` is missing.
fn media_reference(
    kind: MessageKind,
    content: &Map<String, Value>,
    event: &RoomEvent,
) -> Option<CanonicalReference> {
    let label = kind.media_label()?;
    let body = content.get("body").and_then(|v| v.as_str())?;
    let url = content.get("url").and_then(|v| v.as_str())?;

    Some(CanonicalReference {
        target_type: ResourceType::Media,
        identifier: CanonicalIdentifier::temporary(url).valid_from(event.origin_time()),
        display: Some(format!("{} = {}", label, body)),
    })
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

    fn message(content: Value) -> RoomEvent {
        RoomEvent::parse(
            &json!({
                "type": "m.room.message",
                "event_id": "$msg",
                "room_id": "!ward:x",
                "sender": "@bob:x",
                "origin_server_ts": 1_600_000_000_000i64,
                "content": content
            })
            .to_string(),
        )
        .unwrap()
    }

    async fn communication(content: Value) -> CommunicationResource {
        let projections = transform(&message(content), &resolver()).await.unwrap();
        assert_eq!(projections.len(), 1);
        assert_eq!(projections[0].operation, Operation::Create);
        match projections.into_iter().next().unwrap().resource {
            Resource::Communication(c) => c,
            other => panic!("expected communication, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plain_text_message() {
        // Act
        let comm = communication(json!({"msgtype": "m.text", "body": "Hello"})).await;

        // Assert
        assert_eq!(
            comm.payload,
            vec![CommunicationPayload::Text(TextPayload::new("text", "Hello"))]
        );
        assert_eq!(comm.id, "$msg");
        assert!(!comm.identifiers[0].is_temporary());
        assert_eq!(comm.identifiers[0].valid_from, Some(comm.sent));
        assert_eq!(comm.sender.as_ref().unwrap().identifier.value, "@bob:x");
        assert_eq!(comm.subject.target_type, ResourceType::Group);
        assert!(comm.subject.identifier.is_temporary());
        assert_eq!(comm.categories.len(), 2);
        assert_eq!(comm.categories[0].code, "notification");
        assert_eq!(comm.categories[1].code, "m.text");
        assert!(comm.in_response_to.is_empty());
    }

    #[tokio::test]
    async fn test_text_payload_wire_shape() {
        let comm = communication(json!({"msgtype": "m.text", "body": "Hello"})).await;

        let json = serde_json::to_value(&comm.payload[0]).unwrap();

        assert_eq!(json["text"], json!({"format": "text", "formatted_body": "Hello"}));
    }

    #[tokio::test]
    async fn test_rich_text_is_prepended() {
        let comm = communication(json!({
            "msgtype": "m.text",
            "body": "Hello",
            "format": "org.matrix.custom.html",
            "formatted_body": "<b>Hello</b>"
        }))
        .await;

        assert_eq!(
            comm.payload,
            vec![
                CommunicationPayload::Text(TextPayload::new(
                    "org.matrix.custom.html",
                    "<b>Hello</b>"
                )),
                CommunicationPayload::Text(TextPayload::new("text", "Hello")),
            ]
        );
    }

    #[tokio::test]
    async fn test_text_without_body_keeps_raw_content() {
        let comm = communication(json!({"msgtype": "m.text", "body": 12})).await;

        assert_eq!(comm.payload.len(), 1);
        let CommunicationPayload::Text(payload) = &comm.payload[0] else {
            panic!("expected text payload");
        };
        assert_eq!(payload.format, MALFORMED_CONTENT_FORMAT);
        assert!(payload.formatted_body.contains("\"body\":12"));
    }

    #[tokio::test]
    async fn test_image_reference() {
        let comm = communication(json!({
            "msgtype": "m.image",
            "body": "xray.png",
            "url": "mxc://x/abc"
        }))
        .await;

        let CommunicationPayload::Reference(media) = &comm.payload[0] else {
            panic!("expected media reference");
        };
        assert_eq!(media.target_type, ResourceType::Media);
        assert_eq!(media.identifier.value, "mxc://x/abc");
        assert!(media.identifier.is_temporary());
        assert_eq!(media.display.as_deref(), Some("Image = xray.png"));
    }

    #[tokio::test]
    async fn test_media_without_url_omits_payload() {
        let comm = communication(json!({"msgtype": "m.video", "body": "clip.mp4"})).await;

        assert!(comm.payload.is_empty());
    }

    #[tokio::test]
    async fn test_pass_through_kinds_have_no_payload() {
        for msgtype in ["m.emote", "m.file", "m.location", "m.notice", "m.server_notice"] {
            let comm = communication(json!({"msgtype": msgtype, "body": "x"})).await;
            assert!(comm.payload.is_empty(), "{} should carry no payload", msgtype);
        }
    }

    #[tokio::test]
    async fn test_reply_adds_in_response_to() {
        let comm = communication(json!({
            "msgtype": "m.text",
            "body": "> quoted\n\nreply",
            "m.relates_to": {"m.in_reply_to": {"event_id": "$parent"}}
        }))
        .await;

        assert_eq!(comm.in_response_to.len(), 1);
        assert_eq!(comm.in_response_to[0].target_type, ResourceType::Communication);
        assert_eq!(comm.in_response_to[0].identifier.value, "$parent");
        assert!(!comm.in_response_to[0].identifier.is_temporary());
    }

    #[tokio::test]
    async fn test_missing_msgtype_is_transformation_error() {
        let result = transform(&message(json!({"body": "hi"})), &resolver()).await;

        assert!(matches!(result, Err(DomainError::Transformation(_))));
    }

    #[tokio::test]
    async fn test_unknown_msgtype() {
        let result = transform(&message(json!({"msgtype": "m.sticker"})), &resolver()).await;

        assert!(matches!(result, Err(DomainError::UnknownEventType(_))));
    }

    #[tokio::test]
    async fn test_subject_uses_registered_room() {
        // Arrange
        let identities = resolver();
        let create = RoomEvent::parse(
            &json!({"type": "m.room.create", "room_id": "!ward:x", "origin_server_ts": 5}).to_string(),
        )
        .unwrap();
        let registered = identities.register_room(&create).await.unwrap();

        // Act
        let projections = transform(&message(json!({"msgtype": "m.text", "body": "hi"})), &identities)
            .await
            .unwrap();

        // Assert
        let Resource::Communication(comm) = &projections[0].resource else {
            panic!("expected communication");
        };
        assert_eq!(comm.subject, registered);
    }
}
