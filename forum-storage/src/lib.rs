//! Forum Storage - Cached Data Access
//!
//! The read path of the forum: a scoped cache over a shared key-value
//! store, read-through loaders, a bounded scatter-gather executor for
//! collections, and invalidation that runs after writes commit.
//!
//! The relational store, permission engine and role-membership
//! recomputation are external; see [`store`] for their contracts.

pub mod cache;
pub mod collection;
pub mod data;
pub mod dispatcher;
pub mod invalidate;
pub mod loader;
pub mod scatter;
pub mod store;
pub mod telemetry;

// Re-export cache types for service integration
pub use cache::{
    connect_store, CacheFacade, CacheKey, CacheStats, CacheStore, Cacheable, MemoryCacheStore,
    RedisCacheStore, RegistryBuilder, ScopeEntry, ScopeKeyRegistry, COUNTS_TTL,
};
pub use collection::CollectionAssembler;
pub use data::ForumData;
pub use dispatcher::{DispatchStats, InvalidationDispatcher, PurgeRequest};
pub use invalidate::Invalidator;
pub use loader::ReadThroughLoader;
pub use scatter::{FetchResponse, ScatterGather};
pub use store::{
    ForumStore, IdPage, ListQuery, ListSource, MicrocosmTree, PermissionOracle,
    RoleMembershipCache, StorageFetcher,
};
pub use telemetry::{init_tracing, TelemetryConfig};
