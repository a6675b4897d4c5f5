//! Scoped cache layer.
//!
//! Single-entity reads are served from a shared key-value store. Keys are
//! built from (entity type, scope, identifier) through the
//! [`ScopeKeyRegistry`], so a key can only exist for a registered scope and
//! two different scopes can never write to the same key.
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(ScopeKeyRegistry::standard(config.default_ttl)?);
//! let facade = CacheFacade::new(connect_store(&config).await?, registry);
//!
//! let key = facade.key(EntityType::Conversation, Scope::Detail, 42)?;
//! if let Some(conversation) = facade.get::<Conversation>(&key).await {
//!     // hit
//! }
//! ```

pub mod facade;
pub mod key;
pub mod memory;
pub mod redis_store;
pub mod registry;
pub mod traits;

pub use facade::CacheFacade;
pub use key::CacheKey;
pub use memory::MemoryCacheStore;
pub use redis_store::{connect_store, RedisCacheStore};
pub use registry::{RegistryBuilder, ScopeEntry, ScopeKeyRegistry, COUNTS_TTL};
pub use traits::{CacheStats, CacheStore, Cacheable};
