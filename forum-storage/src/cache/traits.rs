//! Cache store traits and cacheable entity marker.
//!
//! This module defines the byte-level contract of the external key-value
//! store and the trait that entity records implement to be cached.

use std::time::Duration;

use async_trait::async_trait;
use forum_core::{
    Attendee, Attribute, CacheError, Conversation, EntityId, EntityType, Event, Huddle, Microcosm,
    ProfileSummary, Role, Scope, Update, Watcher,
};
use serde::{de::DeserializeOwned, Serialize};

/// Marker trait for records that can be cached.
///
/// # Implementation Requirements
///
/// - `entity_type()` and `scope()` must be constant for the type and name a
///   pair registered in the scope key registry
/// - `entity_id()` must return the primary key the record was loaded by
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Entity type this record caches.
    fn entity_type() -> EntityType;

    /// Scope the record is cached under.
    fn scope() -> Scope {
        Scope::Detail
    }

    /// Primary key of this record.
    fn entity_id(&self) -> EntityId;
}

/// Byte-level contract of the shared cache store.
///
/// Implementations must be safe to share between concurrent fetch tasks.
/// Values are opaque; serialization is the facade's job.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the bytes stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store bytes under `key` for `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including downgraded errors.
    pub misses: u64,
    /// Number of values written.
    pub sets: u64,
    /// Number of keys deleted.
    pub deletes: u64,
    /// Store or serialization failures that were swallowed.
    pub errors: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// IMPLEMENTATIONS FOR FORUM RECORDS
// ============================================================================

impl Cacheable for ProfileSummary {
    fn entity_type() -> EntityType {
        EntityType::Profile
    }

    fn scope() -> Scope {
        Scope::Summary
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Cacheable for Conversation {
    fn entity_type() -> EntityType {
        EntityType::Conversation
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Cacheable for Microcosm {
    fn entity_type() -> EntityType {
        EntityType::Microcosm
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Cacheable for Event {
    fn entity_type() -> EntityType {
        EntityType::Event
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Cacheable for Attendee {
    fn entity_type() -> EntityType {
        EntityType::Attendee
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Cacheable for Attribute {
    fn entity_type() -> EntityType {
        EntityType::Attribute
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Cacheable for Role {
    fn entity_type() -> EntityType {
        EntityType::Role
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Cacheable for Update {
    fn entity_type() -> EntityType {
        EntityType::Update
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Cacheable for Watcher {
    fn entity_type() -> EntityType {
        EntityType::Watcher
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

impl Cacheable for Huddle {
    fn entity_type() -> EntityType {
        EntityType::Huddle
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }
}
