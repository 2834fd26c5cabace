use async_trait::async_trait;
use common::domain::{
    DomainError, DomainResult, EnvelopeProducer, Resource, ResourceEnvelope,
};
use common::nats::{
    build_nats_publisher, JetStreamPublisher, NatsPublisher, NatsTracingConfig, PublishRequest,
};
use std::sync::Arc;
use tower::Service;
use tracing::debug;

const CONTENT_TYPE_HEADER: &str = "Content-Type";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Publishes envelopes as JSON to the group or communication sink.
///
/// Subjects: `{group_subject}.group` for groups and
/// `{communication_subject}.{subject kind}` for communications.
pub struct ResourceEnvelopeProducer {
    publisher: NatsPublisher,
    group_subject: String,
    communication_subject: String,
}

impl ResourceEnvelopeProducer {
    pub fn new(
        jetstream: Arc<dyn JetStreamPublisher>,
        group_subject: String,
        communication_subject: String,
    ) -> Self {
        debug!(
            group_subject = %group_subject,
            communication_subject = %communication_subject,
            "initialized resource envelope producer"
        );

        Self {
            publisher: build_nats_publisher(
                jetstream,
                NatsTracingConfig::new("resource_envelope_producer"),
            ),
            group_subject,
            communication_subject,
        }
    }

    pub fn subject_for(&self, envelope: &ResourceEnvelope) -> String {
        let base = match envelope.resource {
            Resource::Group(_) => &self.group_subject,
            Resource::Communication(_) => &self.communication_subject,
        };
        format!("{}.{}", base, envelope.subject_kind().as_token())
    }
}

#[async_trait]
impl EnvelopeProducer for ResourceEnvelopeProducer {
    async fn publish(&self, envelope: &ResourceEnvelope) -> DomainResult<()> {
        let payload = serde_json::to_vec(envelope).map_err(|e| {
            DomainError::Transformation(format!("failed to serialize envelope: {}", e))
        })?;

        let request = PublishRequest::new(self.subject_for(envelope), payload)
            .with_header(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE);

        self.publisher
            .clone()
            .call(request)
            .await
            .map_err(DomainError::PublishFailed)?;

        Ok(())
    }
}
