use crate::nats::{ConsumeRequest, ConsumeResponse, JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info, warn};

/// Where a [`TowerConsumer`] pulls from, how much it takes per fetch, and how
/// rejected messages are redelivered.
#[derive(Debug, Clone)]
pub struct TowerConsumerConfig {
    pub stream_name: String,
    pub consumer_name: String,
    pub filter_subject: String,
    pub batch_size: usize,
    pub max_wait: Duration,
    /// Delay the server waits before redelivering a nak'd message.
    pub nak_delay: Duration,
    /// Deliveries after which the server stops redelivering a message.
    pub max_deliver: i64,
}

/// Durable JetStream pull consumer that feeds each message through a Tower service
/// and settles it (ack or nak) according to the service's response.
pub struct TowerConsumer<S> {
    consumer: Box<dyn PullConsumer>,
    config: TowerConsumerConfig,
    service: S,
}

impl<S> TowerConsumer<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        config: TowerConsumerConfig,
        service: S,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            filter_subject = %config.filter_subject,
            "creating tower nats consumer"
        );

        let pull_config = jetstream::consumer::pull::Config {
            name: Some(config.consumer_name.clone()),
            durable_name: Some(config.consumer_name.clone()),
            filter_subject: config.filter_subject.clone(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            max_deliver: config.max_deliver,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(pull_config, &config.stream_name)
            .await
            .context("failed to create consumer")?;

        Ok(Self {
            consumer,
            config,
            service,
        })
    }

    /// Pull and process batches until `ctx` is cancelled.
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        info!(
            stream = %self.config.stream_name,
            consumer = %self.config.consumer_name,
            "starting tower nats consumer"
        );

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!(consumer = %self.config.consumer_name, "received shutdown signal, stopping consumer");
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(consumer = %self.config.consumer_name, error = %e, "error processing batch");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn fetch_and_process_batch(&mut self) -> Result<()> {
        let messages = self
            .consumer
            .fetch_messages(self.config.batch_size, self.config.max_wait)
            .await?;

        if messages.is_empty() {
            debug!("no messages in batch");
            return Ok(());
        }

        debug!(message_count = messages.len(), "received message batch");

        for message in &messages {
            let request = ConsumeRequest::new(
                message.subject.to_string(),
                Bytes::copy_from_slice(&message.payload),
                message.headers.clone(),
            );

            let response = match self.service.call(request).await {
                Ok(response) => response,
                Err(e) => {
                    error!(subject = %message.subject, error = %e, "service error processing message");
                    ConsumeResponse::nak(e.to_string())
                }
            };

            settle(message, response, self.config.nak_delay).await;
        }

        Ok(())
    }
}

fn nak_with_delay(delay: Duration) -> jetstream::AckKind {
    jetstream::AckKind::Nak(Some(delay))
}

async fn settle(message: &jetstream::Message, response: ConsumeResponse, nak_delay: Duration) {
    let outcome = match response {
        ConsumeResponse::Ack => message.ack().await,
        ConsumeResponse::Nak(reason) => {
            warn!(
                subject = %message.subject,
                reason = reason.as_deref().unwrap_or("unspecified"),
                delay_ms = nak_delay.as_millis() as u64,
                "rejecting message for delayed redelivery"
            );
            message.ack_with(nak_with_delay(nak_delay)).await
        }
    };

    if let Err(e) = outcome {
        error!(subject = %message.subject, error = %e, "failed to settle message");
    }
}
