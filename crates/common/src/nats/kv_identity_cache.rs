use crate::domain::{DomainError, DomainResult, IdentityCache, SetOutcome};
use crate::nats::traits::KeyValueBucket;
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const FORWARD_PREFIX: &str = "fwd";
const INVERSE_PREFIX: &str = "inv";

/// Identity cache shared by every bridge instance through a JetStream KV bucket.
///
/// Room and user ids contain characters NATS keys do not allow, so entries
/// live under `fwd.<sha256(key)>` and `inv.<sha256(value)>`. A mapping is
/// written inverse-first and then committed by an atomic `create` of the
/// forward entry; inverse reads are confirmed against the forward entry, so a
/// half-written or losing mapping is never observed.
pub struct NatsKvIdentityCache {
    bucket: Arc<dyn KeyValueBucket>,
}

impl NatsKvIdentityCache {
    pub fn new(bucket: Arc<dyn KeyValueBucket>) -> Self {
        Self { bucket }
    }

    async fn read(&self, key: &str) -> DomainResult<Option<String>> {
        let raw = self.bucket.get(key).await.map_err(unavailable)?;
        raw.map(|bytes| {
            String::from_utf8(bytes.to_vec()).map_err(|e| {
                DomainError::MappingUnavailable(format!("non utf-8 entry {}: {}", key, e))
            })
        })
        .transpose()
    }
}

fn hashed(prefix: &str, raw: &str) -> String {
    format!("{}.{:x}", prefix, Sha256::digest(raw.as_bytes()))
}

fn forward_key(key: &str) -> String {
    hashed(FORWARD_PREFIX, key)
}

fn inverse_key(value: &str) -> String {
    hashed(INVERSE_PREFIX, value)
}

fn unavailable(err: anyhow::Error) -> DomainError {
    DomainError::MappingUnavailable(format!("{:#}", err))
}

#[async_trait]
impl IdentityCache for NatsKvIdentityCache {
    async fn get(&self, key: &str) -> DomainResult<Option<String>> {
        self.read(&forward_key(key)).await
    }

    async fn get_inverse(&self, value: &str) -> DomainResult<Option<String>> {
        let Some(key) = self.read(&inverse_key(value)).await? else {
            return Ok(None);
        };

        match self.read(&forward_key(&key)).await? {
            Some(current) if current == value => Ok(Some(key)),
            _ => Ok(None),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> DomainResult<SetOutcome> {
        if let Some(existing) = self.get(key).await? {
            return Ok(if existing == value {
                SetOutcome::Stored
            } else {
                SetOutcome::Existing(existing)
            });
        }

        self.bucket
            .put(&inverse_key(value), Bytes::from(key.to_string()))
            .await
            .map_err(unavailable)?;

        let created = self
            .bucket
            .create(&forward_key(key), Bytes::from(value.to_string()))
            .await
            .map_err(unavailable)?;

        if created {
            debug!("identity mapping created");
            return Ok(SetOutcome::Stored);
        }

        let winner = self.get(key).await?.ok_or_else(|| {
            DomainError::MappingUnavailable(format!("mapping for {} vanished during set", key))
        })?;

        if winner == value {
            Ok(SetOutcome::Stored)
        } else {
            warn!("lost identity mapping race, using existing value");
            Ok(SetOutcome::Existing(winner))
        }
    }

    async fn replace(&self, key: &str, value: &str) -> DomainResult<()> {
        let previous = self.get(key).await?;

        self.bucket
            .put(&inverse_key(value), Bytes::from(key.to_string()))
            .await
            .map_err(unavailable)?;
        self.bucket
            .put(&forward_key(key), Bytes::from(value.to_string()))
            .await
            .map_err(unavailable)?;

        if let Some(previous) = previous.filter(|p| p != value) {
            if self.read(&inverse_key(&previous)).await?.as_deref() == Some(key) {
                self.bucket
                    .delete(&inverse_key(&previous))
                    .await
                    .map_err(unavailable)?;
            }
        }

        Ok(())
    }

    async fn is_empty(&self) -> DomainResult<bool> {
        self.bucket.is_empty().await.map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::traits::MockKeyValueBucket;

    #[test]
    fn test_hashed_keys_are_valid_tokens() {
        let key = forward_key("!abc:matrix.example.org");
        assert!(key.starts_with("fwd."));
        assert_eq!(key.len(), 4 + 64);
        assert!(key[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(forward_key("@bob:x"), inverse_key("@bob:x"));
    }

    #[tokio::test]
    async fn test_get_absent() {
        let mut bucket = MockKeyValueBucket::new();
        bucket.expect_get().times(1).returning(|_| Ok(None));

        let cache = NatsKvIdentityCache::new(Arc::new(bucket));

        assert_eq!(cache.get("@bob:x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_writes_inverse_then_creates_forward() {
        // Arrange
        let mut bucket = MockKeyValueBucket::new();
        let mut seq = mockall::Sequence::new();
        bucket
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        bucket
            .expect_put()
            .withf(|key: &str, value: &Bytes| {
                key == inverse_key("value-1") && value.as_ref() == b"@bob:x"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        bucket
            .expect_create()
            .withf(|key: &str, value: &Bytes| {
                key == forward_key("@bob:x") && value.as_ref() == b"value-1"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));

        let cache = NatsKvIdentityCache::new(Arc::new(bucket));

        // Act
        let outcome = cache.set("@bob:x", "value-1").await;

        // Assert
        assert_eq!(outcome.unwrap(), SetOutcome::Stored);
    }

    #[tokio::test]
    async fn test_set_losing_race_returns_winner() {
        // Arrange
        let mut bucket = MockKeyValueBucket::new();
        let mut reads = 0;
        bucket.expect_get().times(2).returning(move |_| {
            reads += 1;
            if reads == 1 {
                Ok(None)
            } else {
                Ok(Some(Bytes::from_static(b"winner")))
            }
        });
        bucket.expect_put().times(1).returning(|_, _| Ok(()));
        bucket.expect_create().times(1).returning(|_, _| Ok(false));

        let cache = NatsKvIdentityCache::new(Arc::new(bucket));

        // Act
        let outcome = cache.set("!room:x", "loser").await;

        // Assert
        assert_eq!(outcome.unwrap(), SetOutcome::Existing("winner".to_string()));
    }

    #[tokio::test]
    async fn test_get_inverse_ignores_orphaned_entry() {
        // Inverse written by a writer whose forward create lost
        let mut bucket = MockKeyValueBucket::new();
        bucket.expect_get().returning(|key: &str| {
            if key == inverse_key("loser") {
                Ok(Some(Bytes::from_static(b"!room:x")))
            } else if key == forward_key("!room:x") {
                Ok(Some(Bytes::from_static(b"winner")))
            } else {
                Ok(None)
            }
        });

        let cache = NatsKvIdentityCache::new(Arc::new(bucket));

        assert_eq!(cache.get_inverse("loser").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backend_failure_is_mapping_unavailable() {
        let mut bucket = MockKeyValueBucket::new();
        bucket
            .expect_get()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection closed")));

        let cache = NatsKvIdentityCache::new(Arc::new(bucket));
        let result = cache.get("!room:x").await;

        assert!(matches!(result, Err(DomainError::MappingUnavailable(_))));
    }
}
