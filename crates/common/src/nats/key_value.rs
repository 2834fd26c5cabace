use crate::nats::traits::KeyValueBucket;
use anyhow::{Context, Result};
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use std::time::Duration;
use tracing::debug;

/// JetStream key/value bucket.
pub struct NatsKeyValueBucket {
    store: kv::Store,
}

impl NatsKeyValueBucket {
    pub async fn open(
        jetstream: &jetstream::Context,
        bucket: &str,
        max_age: Option<Duration>,
    ) -> Result<Self> {
        let store = match jetstream.get_key_value(bucket).await {
            Ok(store) => {
                debug!(bucket = %bucket, "key value bucket already exists");
                store
            }
            Err(_) => {
                debug!(bucket = %bucket, max_age_secs = ?max_age.map(|d| d.as_secs()), "creating key value bucket");
                jetstream
                    .create_key_value(kv::Config {
                        bucket: bucket.to_string(),
                        history: 1,
                        max_age: max_age.unwrap_or_default(),
                        ..Default::default()
                    })
                    .await
                    .context("failed to create key value bucket")?
            }
        };

        Ok(Self { store })
    }
}

#[async_trait]
impl KeyValueBucket for NatsKeyValueBucket {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.store.get(key).await.context("failed to read key")
    }

    async fn create(&self, key: &str, value: Bytes) -> Result<bool> {
        match self.store.create(key, value).await {
            Ok(_) => Ok(true),
            Err(err) if matches!(err.kind(), kv::CreateErrorKind::AlreadyExists) => Ok(false),
            Err(err) => Err(err).context("failed to create key"),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        self.store
            .put(key, value)
            .await
            .context("failed to put key")?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key).await.context("failed to delete key")
    }

    async fn is_empty(&self) -> Result<bool> {
        let mut keys = Box::pin(self.store.keys().await.context("failed to list keys")?);
        let first = keys.try_next().await.context("failed to read key listing")?;
        Ok(first.is_none())
    }
}
