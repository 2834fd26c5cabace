use crate::domain::identifier::CanonicalIdentifier;
use crate::domain::reference::CanonicalReference;
use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Result of a put-if-absent on the identity cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// The caller's value is now the mapping (freshly stored, or already identical).
    Stored,
    /// Another writer got there first; this is their value.
    Existing(String),
}

/// Bidirectional, concurrently shared key/value store backing identity mappings.
///
/// Every logical mapping is held as a forward (`key -> value`) and an inverse
/// (`value -> key`) entry. Implementations own all synchronization: `set` is an
/// atomic put-if-absent where the first writer wins, and a mapping is never
/// visible in one direction only. Backend failures surface as
/// `DomainError::MappingUnavailable`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityCache: Send + Sync {
    /// Forward lookup. An absent key is `Ok(None)`.
    async fn get(&self, key: &str) -> DomainResult<Option<String>>;

    /// Inverse lookup: which key maps to `value`.
    async fn get_inverse(&self, value: &str) -> DomainResult<Option<String>>;

    /// Store `key <-> value` unless `key` is already mapped.
    async fn set(&self, key: &str, value: &str) -> DomainResult<SetOutcome>;

    /// Store `key <-> value` unconditionally, dropping the previous inverse entry.
    async fn replace(&self, key: &str, value: &str) -> DomainResult<()>;

    async fn is_empty(&self) -> DomainResult<bool>;
}

/// Typed view over an [`IdentityCache`] whose values are JSON-encoded `V`.
pub struct IdentityMap<V> {
    cache: Arc<dyn IdentityCache>,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for IdentityMap<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            _value: PhantomData,
        }
    }
}

impl<V> IdentityMap<V>
where
    V: Serialize + DeserializeOwned + Send,
{
    pub fn new(cache: Arc<dyn IdentityCache>) -> Self {
        Self {
            cache,
            _value: PhantomData,
        }
    }

    pub async fn get(&self, key: &str) -> DomainResult<Option<V>> {
        match self.cache.get(key).await? {
            Some(raw) => Ok(Some(decode(key, &raw)?)),
            None => Ok(None),
        }
    }

    /// Map `key` to `candidate` unless a mapping exists, returning whichever value won.
    pub async fn get_or_insert(&self, key: &str, candidate: V) -> DomainResult<V> {
        let encoded = encode(&candidate)?;
        match self.cache.set(key, &encoded).await? {
            SetOutcome::Stored => Ok(candidate),
            SetOutcome::Existing(raw) => {
                debug!(key = %key, "identity mapping already present, reusing it");
                decode(key, &raw)
            }
        }
    }
}

fn encode<V: Serialize>(value: &V) -> DomainResult<String> {
    serde_json::to_string(value).map_err(|e| {
        DomainError::Transformation(format!("failed to encode identity mapping: {}", e))
    })
}

fn decode<V: DeserializeOwned>(key: &str, raw: &str) -> DomainResult<V> {
    serde_json::from_str(raw).map_err(|e| {
        DomainError::MappingUnavailable(format!("corrupt identity mapping for {}: {}", key, e))
    })
}

/// Room id <-> canonical group reference.
pub type RoomReferenceMap = IdentityMap<CanonicalReference>;

/// User id <-> canonical practitioner identifier.
pub type UserIdentifierMap = IdentityMap<CanonicalIdentifier>;

/// Whether a room-name write created the entry or overwrote an older name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameChange {
    Created,
    Unchanged,
    Replaced { previous: String },
}

/// Room id -> display name side mapping. Last write wins.
#[derive(Clone)]
pub struct RoomNameMap {
    cache: Arc<dyn IdentityCache>,
}

impl RoomNameMap {
    pub fn new(cache: Arc<dyn IdentityCache>) -> Self {
        Self { cache }
    }

    pub async fn record(&self, room_id: &str, name: &str) -> DomainResult<NameChange> {
        match self.cache.set(room_id, name).await? {
            SetOutcome::Stored => Ok(NameChange::Created),
            SetOutcome::Existing(previous) if previous == name => Ok(NameChange::Unchanged),
            SetOutcome::Existing(previous) => {
                self.cache.replace(room_id, name).await?;
                Ok(NameChange::Replaced { previous })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reference::ResourceType;
    use mockall::predicate::*;

    fn room_reference(room_id: &str) -> CanonicalReference {
        CanonicalReference::labelled(
            ResourceType::Group,
            CanonicalIdentifier::temporary(room_id),
            room_id,
        )
    }

    #[tokio::test]
    async fn test_get_or_insert_stores_candidate() {
        // Arrange
        let mut mock_cache = MockIdentityCache::new();
        mock_cache
            .expect_set()
            .withf(|key: &str, _value: &str| key == "!room:x")
            .times(1)
            .return_once(|_, _| Ok(SetOutcome::Stored));

        let map = RoomReferenceMap::new(Arc::new(mock_cache));

        // Act
        let result = map.get_or_insert("!room:x", room_reference("!room:x")).await;

        // Assert
        assert_eq!(result.unwrap(), room_reference("!room:x"));
    }

    #[tokio::test]
    async fn test_get_or_insert_returns_competitor_value() {
        // Arrange
        let winner = room_reference("!winner:x");
        let winner_raw = serde_json::to_string(&winner).unwrap();

        let mut mock_cache = MockIdentityCache::new();
        mock_cache
            .expect_set()
            .times(1)
            .return_once(move |_, _| Ok(SetOutcome::Existing(winner_raw)));

        let map = RoomReferenceMap::new(Arc::new(mock_cache));

        // Act
        let result = map
            .get_or_insert("!room:x", room_reference("!room:x"))
            .await
            .unwrap();

        // Assert
        assert_eq!(result, winner);
    }

    #[tokio::test]
    async fn test_get_propagates_unavailable() {
        let mut mock_cache = MockIdentityCache::new();
        mock_cache
            .expect_get()
            .with(eq("@bob:x"))
            .times(1)
            .return_once(|_| Err(DomainError::MappingUnavailable("timeout".to_string())));

        let map = UserIdentifierMap::new(Arc::new(mock_cache));
        let result = map.get("@bob:x").await;

        assert!(matches!(result, Err(DomainError::MappingUnavailable(_))));
    }

    #[tokio::test]
    async fn test_get_corrupt_entry() {
        let mut mock_cache = MockIdentityCache::new();
        mock_cache
            .expect_get()
            .times(1)
            .return_once(|_| Ok(Some("not json".to_string())));

        let map = UserIdentifierMap::new(Arc::new(mock_cache));
        let result = map.get("@bob:x").await;

        assert!(matches!(result, Err(DomainError::MappingUnavailable(_))));
    }

    #[tokio::test]
    async fn test_record_name_replaces_previous() {
        // Arrange
        let mut mock_cache = MockIdentityCache::new();
        mock_cache
            .expect_set()
            .times(1)
            .return_once(|_, _| Ok(SetOutcome::Existing("Old Name".to_string())));
        mock_cache
            .expect_replace()
            .withf(|key: &str, value: &str| key == "!room:x" && value == "New Name")
            .times(1)
            .return_once(|_, _| Ok(()));

        let names = RoomNameMap::new(Arc::new(mock_cache));

        // Act
        let change = names.record("!room:x", "New Name").await.unwrap();

        // Assert
        assert_eq!(
            change,
            NameChange::Replaced {
                previous: "Old Name".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_record_name_same_value_is_noop() {
        let mut mock_cache = MockIdentityCache::new();
        mock_cache
            .expect_set()
            .times(1)
            .return_once(|_, _| Ok(SetOutcome::Existing("Ward 4".to_string())));
        mock_cache.expect_replace().times(0);

        let names = RoomNameMap::new(Arc::new(mock_cache));
        let change = names.record("!room:x", "Ward 4").await.unwrap();

        assert_eq!(change, NameChange::Unchanged);
    }
}
