use crate::domain::RoomEventService;
use common::domain::DomainError;
use common::nats::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{error, warn};

/// Tower service feeding each consumed batch message to the [`RoomEventService`].
///
/// Settlement:
/// - unreadable or malformed batches are acked and dropped, redelivery cannot fix them
/// - a batch with any retryable event failure is nak'd for redelivery
/// - everything else is acked
#[derive(Clone)]
pub struct RoomEventConsumerService {
    service: Arc<RoomEventService>,
}

impl RoomEventConsumerService {
    pub fn new(service: Arc<RoomEventService>) -> Self {
        Self { service }
    }
}

impl Service<ConsumeRequest> for RoomEventConsumerService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let service = Arc::clone(&self.service);

        Box::pin(async move {
            let batch = match std::str::from_utf8(&req.payload) {
                Ok(batch) => batch,
                Err(e) => {
                    error!(subject = %req.subject, error = %e, "room event batch is not utf-8, dropping");
                    return Ok(ConsumeResponse::ack());
                }
            };

            match service.process_batch(batch).await {
                Ok(report) if report.needs_retry() => {
                    warn!(
                        subject = %req.subject,
                        failed = report.failed(),
                        "batch had retryable failures, requesting redelivery"
                    );
                    Ok(ConsumeResponse::nak(format!(
                        "{} events failed",
                        report.failed()
                    )))
                }
                Ok(_) => Ok(ConsumeResponse::ack()),
                Err(DomainError::MalformedInput(reason)) => {
                    error!(subject = %req.subject, reason = %reason, "malformed room event batch, dropping");
                    Ok(ConsumeResponse::ack())
                }
                Err(e) if e.is_retryable() => Ok(ConsumeResponse::nak(e.to_string())),
                Err(e) => {
                    error!(subject = %req.subject, error = %e, "room event batch rejected, dropping");
                    Ok(ConsumeResponse::ack())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BatchSplitter, EventTransformer, IdentityResolver, OutputPackager, PackagerConfig,
    };
    use bytes::Bytes;
    use common::domain::{InMemoryIdentityCache, MockEnvelopeProducer};
    use serde_json::json;

    fn consumer(producer: MockEnvelopeProducer) -> RoomEventConsumerService {
        let transformer = EventTransformer::new(IdentityResolver::new(
            Arc::new(InMemoryIdentityCache::new()),
            Arc::new(InMemoryIdentityCache::new()),
            Arc::new(InMemoryIdentityCache::new()),
        ));
        let packager = OutputPackager::new(PackagerConfig {
            source_name: "room-bridge".to_string(),
            software: "room-bridge-worker".to_string(),
            group_endpoint: "bundles.group".to_string(),
            communication_endpoint: "bundles.communication".to_string(),
        });
        RoomEventConsumerService::new(Arc::new(RoomEventService::new(
            BatchSplitter::default(),
            transformer,
            packager,
            Arc::new(producer),
        )))
    }

    fn request(payload: impl Into<Bytes>) -> ConsumeRequest {
        ConsumeRequest::new("room_events.batch".to_string(), payload.into(), None)
    }

    fn message_batch() -> String {
        json!({"events": [{
            "type": "m.room.message",
            "event_id": "$e1",
            "room_id": "!ward:x",
            "sender": "@bob:x",
            "origin_server_ts": 1,
            "content": {"msgtype": "m.text", "body": "hi"}
        }]})
        .to_string()
    }

    #[tokio::test]
    async fn test_successful_batch_is_acked() {
        let mut producer = MockEnvelopeProducer::new();
        producer.expect_publish().times(1).returning(|_| Ok(()));

        let response = consumer(producer).call(request(message_batch())).await.unwrap();

        assert_eq!(response, ConsumeResponse::Ack);
    }

    #[tokio::test]
    async fn test_publish_failure_is_nakked() {
        let mut producer = MockEnvelopeProducer::new();
        producer
            .expect_publish()
            .times(1)
            .returning(|_| Err(DomainError::PublishFailed(anyhow::anyhow!("timeout"))));

        let response = consumer(producer).call(request(message_batch())).await.unwrap();

        assert!(!response.is_ack());
    }

    #[tokio::test]
    async fn test_malformed_batch_is_acked_and_dropped() {
        let mut producer = MockEnvelopeProducer::new();
        producer.expect_publish().times(0);

        let response = consumer(producer).call(request("not json")).await.unwrap();

        assert_eq!(response, ConsumeResponse::Ack);
    }

    #[tokio::test]
    async fn test_batch_without_events_is_acked_and_dropped() {
        let mut producer = MockEnvelopeProducer::new();
        producer.expect_publish().times(0);

        let response = consumer(producer)
            .call(request(r#"{"not_events": []}"#))
            .await
            .unwrap();

        assert_eq!(response, ConsumeResponse::Ack);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_acked_and_dropped() {
        let producer = MockEnvelopeProducer::new();

        let response = consumer(producer)
            .call(request(Bytes::from_static(&[0xff, 0xfe])))
            .await
            .unwrap();

        assert_eq!(response, ConsumeResponse::Ack);
    }
}
