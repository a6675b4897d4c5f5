//! Process-local cache store.
//!
//! Used for single-instance deployments and tests. Expired entries are
//! dropped lazily on read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use forum_core::CacheError;

use super::traits::CacheStore;

#[derive(Clone, Debug)]
struct MemoryEntry {
    data: Arc<Vec<u8>>,
    stored_at: Instant,
    ttl: Duration,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

/// `DashMap`-backed store with per-entry TTL.
#[derive(Clone, Debug, Default)]
pub struct MemoryCacheStore {
    map: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether a live entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.map
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.map.len())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let Some(entry) = self.map.get(key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            drop(entry);
            self.map.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.data.as_ref().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.map.insert(
            key.to_string(),
            MemoryEntry {
                data: Arc::new(value),
                stored_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.map.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryCacheStore::new();
        store
            .set("p_d1", b"alice".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("p_d1").await.unwrap(), Some(b"alice".to_vec()));

        store.delete("p_d1").await.unwrap();
        assert_eq!(store.get("p_d1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_ok() {
        let store = MemoryCacheStore::new();
        assert!(store.delete("nothing").await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent() {
        let store = MemoryCacheStore::new();
        store.set("m_c1", vec![1], Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(!store.contains("m_c1"));
        assert_eq!(store.get("m_c1").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryCacheStore::new();
        store.set("a", vec![1], Duration::ZERO).await.unwrap();
        store.set("b", vec![2], Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("b"));
    }
}
