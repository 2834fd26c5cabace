use anyhow::Result;
use async_nats::jetstream;
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Creates durable pull consumers on JetStream streams
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamConsumer: Send + Sync {
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>>;
}

/// Fetches message batches from a pull consumer
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PullConsumer: Send + Sync {
    /// Returns up to `max_messages`, waiting at most `expires`
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: Duration,
    ) -> Result<Vec<jetstream::Message>>;
}

/// Publishes to JetStream and waits for the server acknowledgment
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamPublisher: Send + Sync {
    async fn publish_with_headers(
        &self,
        subject: String,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<()>;
}

/// Minimal key/value bucket surface used by the identity cache
///
/// Keys must already be valid NATS KV tokens; callers hash opaque ids first.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait KeyValueBucket: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Create `key` only when it has no live value. `Ok(false)` means it already existed.
    async fn create(&self, key: &str, value: Bytes) -> Result<bool>;

    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn is_empty(&self) -> Result<bool>;
}
