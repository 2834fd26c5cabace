use crate::domain::identity_cache::{IdentityCache, SetOutcome};
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
struct MappingTable {
    forward: HashMap<String, Entry>,
    inverse: HashMap<String, Entry>,
}

impl MappingTable {
    fn live_forward(&self, key: &str, now: Instant) -> Option<&str> {
        self.forward
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.as_str())
    }

    fn insert_pair(&mut self, key: &str, value: &str, expires_at: Option<Instant>) {
        self.forward.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        self.inverse.insert(
            value.to_string(),
            Entry {
                value: key.to_string(),
                expires_at,
            },
        );
    }
}

/// Single-process identity cache. Both directions are updated under one write lock.
pub struct InMemoryIdentityCache {
    table: Arc<RwLock<MappingTable>>,
    retention: Option<Duration>,
}

impl InMemoryIdentityCache {
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(MappingTable::default())),
            retention: None,
        }
    }

    /// Entries written through this cache expire after `retention`.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention: Some(retention),
            ..Self::new()
        }
    }

    fn expiry_from(&self, now: Instant) -> Option<Instant> {
        self.retention.map(|r| now + r)
    }
}

impl Default for InMemoryIdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityCache for InMemoryIdentityCache {
    async fn get(&self, key: &str) -> DomainResult<Option<String>> {
        let table = self.table.read().await;
        Ok(table.live_forward(key, Instant::now()).map(str::to_string))
    }

    async fn get_inverse(&self, value: &str) -> DomainResult<Option<String>> {
        let table = self.table.read().await;
        Ok(table
            .inverse
            .get(value)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> DomainResult<SetOutcome> {
        let now = Instant::now();
        let mut table = self.table.write().await;

        if let Some(existing) = table.live_forward(key, now) {
            return Ok(if existing == value {
                SetOutcome::Stored
            } else {
                SetOutcome::Existing(existing.to_string())
            });
        }

        table.insert_pair(key, value, self.expiry_from(now));
        Ok(SetOutcome::Stored)
    }

    async fn replace(&self, key: &str, value: &str) -> DomainResult<()> {
        let now = Instant::now();
        let mut table = self.table.write().await;

        if let Some(previous) = table.forward.get(key).map(|e| e.value.clone()) {
            let points_here = table
                .inverse
                .get(&previous)
                .is_some_and(|e| e.value == key);
            if points_here {
                table.inverse.remove(&previous);
            }
        }

        table.insert_pair(key, value, self.expiry_from(now));
        Ok(())
    }

    async fn is_empty(&self) -> DomainResult<bool> {
        let now = Instant::now();
        let table = self.table.read().await;
        Ok(!table.forward.values().any(|e| e.is_live(now)))
    }
}
