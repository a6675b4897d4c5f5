//! Single-item read-through loader.
//!
//! `cached_snapshot` is the cache/store half of a read: it returns the record
//! exactly as cached, never anything computed for a particular viewer.
//! Hydration (related summaries, live flags) happens in [`ForumData`].
//!
//! [`ForumData`]: crate::data::ForumData

use std::marker::PhantomData;

use forum_core::{EntityId, ForumError, ForumResult};

use crate::cache::{CacheFacade, Cacheable};
use crate::store::StorageFetcher;

/// Read-through loader for one record type.
pub struct ReadThroughLoader<T: Cacheable> {
    cache: CacheFacade,
    _record: PhantomData<fn() -> T>,
}

impl<T: Cacheable> Clone for ReadThroughLoader<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Cacheable> ReadThroughLoader<T> {
    pub fn new(cache: CacheFacade) -> Self {
        Self {
            cache,
            _record: PhantomData,
        }
    }

    /// Get a record from the cache, falling back to storage on miss.
    ///
    /// A miss that the store answers with "no rows" is a not-found error.
    /// Store failures are returned unchanged. Cache failures only cost the
    /// round trip to the store.
    pub async fn cached_snapshot<S>(&self, store: &S, id: EntityId) -> ForumResult<T>
    where
        S: StorageFetcher<T> + ?Sized,
    {
        let entity_type = T::entity_type();
        let key = match self.cache.key(entity_type, T::scope(), id) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(entity = %entity_type, id, error = %e, "record type has no cache key");
                None
            }
        };

        if let Some(key) = &key {
            if let Some(record) = self.cache.get::<T>(key).await {
                return Ok(record);
            }
        }

        let record = store
            .fetch(id)
            .await?
            .ok_or_else(|| ForumError::not_found(entity_type, id))?;

        if let Some(key) = &key {
            self.cache.set(key, &record).await;
        }
        Ok(record)
    }

    /// Write a freshly loaded record into the cache.
    pub async fn prime(&self, record: &T) {
        let entity_type = T::entity_type();
        match self.cache.key(entity_type, T::scope(), record.entity_id()) {
            Ok(key) => self.cache.set(&key, record).await,
            Err(e) => {
                tracing::warn!(entity = %entity_type, error = %e, "record type has no cache key")
            }
        }
    }
}
