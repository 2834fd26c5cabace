use crate::domain::batch_splitter::BatchSplitter;
use crate::domain::event_classifier::EventKind;
use crate::domain::output_packager::OutputPackager;
use crate::domain::transformer::EventTransformer;
use common::domain::{DomainError, DomainResult, EnvelopeProducer, RoomEvent};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, field, info, instrument, warn};

/// What happened to one event of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// This many envelopes were published.
    Published(usize),
    /// Nothing to project: ignored kind or unknown message type.
    Discarded,
    Failed { error: String, retryable: bool },
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Published(_) | EventOutcome::Discarded => "success",
            EventOutcome::Failed { .. } => "failure",
        }
    }

    fn from_error(error: &DomainError) -> Self {
        match error {
            DomainError::UnknownEventType(_) => EventOutcome::Discarded,
            other => EventOutcome::Failed {
                error: other.to_string(),
                retryable: other.is_retryable(),
            },
        }
    }
}

/// Per-event outcomes of a batch, in split order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<EventOutcome>,
}

impl BatchReport {
    pub fn published(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                EventOutcome::Published(n) => *n,
                _ => 0,
            })
            .sum()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, EventOutcome::Failed { .. }))
            .count()
    }

    /// Whether a redelivery of the batch could turn a failure into a success.
    pub fn needs_retry(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, EventOutcome::Failed { retryable: true, .. }))
    }
}

/// Domain service that projects one ingress batch into published envelopes
///
/// Flow per batch:
/// 1. Split the batch into events (a malformed batch fails as a whole)
/// 2. Per event, concurrently: parse, classify, transform
/// 3. Package each resulting resource and publish it via the producer
///
/// A failing event never stops its siblings; its failure is recorded in the report.
pub struct RoomEventService {
    splitter: BatchSplitter,
    transformer: EventTransformer,
    packager: OutputPackager,
    producer: Arc<dyn EnvelopeProducer>,
}

impl RoomEventService {
    pub fn new(
        splitter: BatchSplitter,
        transformer: EventTransformer,
        packager: OutputPackager,
        producer: Arc<dyn EnvelopeProducer>,
    ) -> Self {
        Self {
            splitter,
            transformer,
            packager,
            producer,
        }
    }

    #[instrument(skip(self, batch), fields(batch_bytes = batch.len()))]
    pub async fn process_batch(&self, batch: &str) -> DomainResult<BatchReport> {
        let events = self.splitter.split(batch)?;
        debug!(event_count = events.len(), "split room event batch");

        let outcomes = join_all(events.iter().map(|raw| self.process_event(raw))).await;
        let report = BatchReport { outcomes };

        info!(
            events = report.outcomes.len(),
            published = report.published(),
            failed = report.failed(),
            "processed room event batch"
        );

        Ok(report)
    }

    async fn process_event(&self, raw: &str) -> EventOutcome {
        match self.project_and_publish(raw).await {
            Ok(0) => EventOutcome::Discarded,
            Ok(published) => EventOutcome::Published(published),
            Err(e) => {
                let outcome = EventOutcome::from_error(&e);
                match &outcome {
                    EventOutcome::Discarded => debug!(error = %e, "discarding room event"),
                    _ => warn!(error = %e, "failed to process room event"),
                }
                outcome
            }
        }
    }

    #[instrument(skip_all, fields(event_id = field::Empty, event_type = field::Empty))]
    async fn project_and_publish(&self, raw: &str) -> DomainResult<usize> {
        let event = RoomEvent::parse(raw)?;
        let span = tracing::Span::current();
        span.record("event_id", event.event_id.as_str());
        span.record("event_type", event.event_type.as_str());

        let kind = EventKind::classify(&event.event_type);
        let projections = self.transformer.transform(kind, &event).await?;

        let count = projections.len();
        for projection in projections {
            let target_type = projection.resource.resource_type();
            let envelope = self
                .packager
                .package(projection.resource, target_type, projection.operation);
            self.producer.publish(&envelope).await?;
        }

        Ok(count)
    }
}
