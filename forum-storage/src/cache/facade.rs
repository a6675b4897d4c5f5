//! Typed access to the shared cache store.
//!
//! The facade never fails a caller. Store errors and undecodable values are
//! logged, counted and reported as a miss; failed writes and deletes are
//! logged and dropped. The relational store stays the source of truth.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use forum_core::{CacheError, EntityType, Identifier, Scope, DEFAULT_CACHE_TTL_SECS};
use serde::{de::DeserializeOwned, Serialize};

use super::key::CacheKey;
use super::registry::ScopeKeyRegistry;
use super::traits::{CacheStats, CacheStore};
use crate::telemetry;

#[derive(Debug, Default)]
struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

/// Cache facade shared by loaders and the invalidator.
#[derive(Clone)]
pub struct CacheFacade {
    store: Arc<dyn CacheStore>,
    registry: Arc<ScopeKeyRegistry>,
    counters: Arc<StatCounters>,
}

impl CacheFacade {
    pub fn new(store: Arc<dyn CacheStore>, registry: Arc<ScopeKeyRegistry>) -> Self {
        Self {
            store,
            registry,
            counters: Arc::new(StatCounters::default()),
        }
    }

    pub fn registry(&self) -> &ScopeKeyRegistry {
        &self.registry
    }

    /// Name of the underlying store, for logs.
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Build a key through the registry.
    pub fn key(
        &self,
        entity_type: EntityType,
        scope: Scope,
        identifier: impl Into<Identifier>,
    ) -> Result<CacheKey, CacheError> {
        self.registry.key(entity_type, scope, identifier)
    }

    /// Read and decode a JSON value.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = self.get_bytes(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                self.record_hit(key);
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached value could not be decoded");
                self.record_error(key);
                None
            }
        }
    }

    /// Encode and store a value with the TTL registered for its scope.
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let ttl = self.ttl_for(key);
        self.set_with_ttl(key, value, ttl).await;
    }

    pub async fn set_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set_bytes(key, bytes, ttl).await,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "value could not be encoded for cache");
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Remove a key. Missing keys are fine.
    pub async fn delete(&self, key: &CacheKey) {
        if let Err(e) = self.try_delete(key).await {
            tracing::warn!(key = %key, error = %e, "cache delete failed");
        }
    }

    /// Remove a key and report store failures, for callers that retry.
    pub async fn try_delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        match self.store.delete(key.as_str()).await {
            Ok(()) => {
                self.counters.deletes.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Read a raw string, as used by secondary indexes and dedup tokens.
    pub async fn get_string(&self, key: &CacheKey) -> Option<String> {
        let bytes = self.get_bytes(key).await?;
        match String::from_utf8(bytes) {
            Ok(value) => {
                self.record_hit(key);
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached string is not UTF-8");
                self.record_error(key);
                None
            }
        }
    }

    pub async fn set_string(&self, key: &CacheKey, value: &str) {
        let ttl = self.ttl_for(key);
        self.set_bytes(key, value.as_bytes().to_vec(), ttl).await;
    }

    /// Read an integer stored as decimal text.
    pub async fn get_int(&self, key: &CacheKey) -> Option<i64> {
        let bytes = self.get_bytes(key).await?;
        let parsed = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse::<i64>().ok());
        match parsed {
            Some(value) => {
                self.record_hit(key);
                Some(value)
            }
            None => {
                tracing::warn!(key = %key, "cached value is not an integer");
                self.record_error(key);
                None
            }
        }
    }

    pub async fn set_int(&self, key: &CacheKey, value: i64) {
        let ttl = self.ttl_for(key);
        self.set_bytes(key, value.to_string().into_bytes(), ttl).await;
    }

    /// Snapshot of the counters since this facade was created.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    fn ttl_for(&self, key: &CacheKey) -> Duration {
        self.registry
            .ttl(key.entity_type(), key.scope())
            .unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }

    /// Fetch bytes; absent values and store errors both count as a miss.
    async fn get_bytes(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.store.get(key.as_str()).await {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => {
                self.record_miss(key);
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, store = self.store.name(), error = %e, "cache read failed");
                self.record_error(key);
                None
            }
        }
    }

    async fn set_bytes(&self, key: &CacheKey, bytes: Vec<u8>, ttl: Duration) {
        match self.store.set(key.as_str(), bytes, ttl).await {
            Ok(()) => {
                self.counters.sets.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(key = %key, store = self.store.name(), error = %e, "cache write failed");
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn record_hit(&self, key: &CacheKey) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        record_read(key, "hit");
    }

    fn record_miss(&self, key: &CacheKey) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        record_read(key, "miss");
    }

    /// Downgraded errors count as a miss too.
    fn record_error(&self, key: &CacheKey) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        record_read(key, "error");
    }
}

fn record_read(key: &CacheKey, result: &str) {
    if let Some(metrics) = telemetry::metrics() {
        metrics.record_cache_read(key.entity_type().as_str(), key.scope().as_str(), result);
    }
}
