//! Cache invalidation after writes.
//!
//! `purge` removes every registered scope of an entity, `purge_scope` just
//! one. Two entity types cascade:
//!
//! - Microcosm: the category tree aggregates counts upwards, so every
//!   ancestor except the root is purged too.
//! - Role: the derived role-membership cache is flushed, after the keys.
//!
//! Types without registered scopes are a no-op. The plain methods log and
//! swallow failures; the `try_` variants report them so a caller can retry.

use std::sync::Arc;

use forum_core::{EntityId, EntityType, ForumError, ForumResult, Identifier, Scope};

use crate::cache::{CacheFacade, CacheKey};
use crate::store::{MicrocosmTree, RoleMembershipCache};

/// Deletes cache entries for written entities.
#[derive(Clone)]
pub struct Invalidator {
    cache: CacheFacade,
    tree: Arc<dyn MicrocosmTree>,
    roles: Arc<dyn RoleMembershipCache>,
}

impl Invalidator {
    pub fn new(
        cache: CacheFacade,
        tree: Arc<dyn MicrocosmTree>,
        roles: Arc<dyn RoleMembershipCache>,
    ) -> Self {
        Self { cache, tree, roles }
    }

    /// Purge every scope of an entity, with cascades. Never fails.
    pub async fn purge(&self, entity_type: EntityType, id: impl Into<Identifier>) {
        let id = id.into();
        if let Err(e) = self.try_purge(entity_type, id.clone()).await {
            tracing::warn!(entity = %entity_type, id = %id, error = %e, "cache purge failed");
        }
    }

    /// Purge one scope of an entity. Never fails.
    pub async fn purge_scope(&self, scope: Scope, entity_type: EntityType, id: impl Into<Identifier>) {
        let id = id.into();
        if let Err(e) = self.try_purge_scope(scope, entity_type, id.clone()).await {
            tracing::warn!(entity = %entity_type, scope = %scope, id = %id, error = %e, "cache purge failed");
        }
    }

    /// Purge every scope of an entity, with cascades.
    ///
    /// Every key is attempted even after a failure; the first failure is
    /// returned. Returns the number of keys deleted.
    pub async fn try_purge(
        &self,
        entity_type: EntityType,
        id: impl Into<Identifier>,
    ) -> ForumResult<usize> {
        let id = id.into();
        if !self.cache.registry().is_cached(entity_type) {
            tracing::trace!(entity = %entity_type, "entity type is not cached");
            return Ok(0);
        }

        let mut keys = self.cache.registry().keys_for(entity_type, &id);
        let mut first_error: Option<ForumError> = None;

        if entity_type == EntityType::Microcosm {
            match id.as_int() {
                Some(microcosm_id) => match self.ancestors_to_purge(microcosm_id).await {
                    Ok(ancestors) => {
                        for ancestor in ancestors {
                            keys.extend(
                                self.cache
                                    .registry()
                                    .keys_for(EntityType::Microcosm, &Identifier::Int(ancestor)),
                            );
                        }
                    }
                    Err(e) => first_error = Some(e),
                },
                None => tracing::debug!(id = %id, "microcosm purged by text id, no cascade"),
            }
        }

        let (deleted, delete_error) = self.delete_all(&keys).await;
        tracing::debug!(entity = %entity_type, id = %id, deleted, "cache purged");

        if let Some(e) = first_error.or(delete_error) {
            return Err(e);
        }

        // Flush only after every delete succeeded; a retry re-runs the deletes.
        if entity_type == EntityType::Role {
            if let Some(role_id) = id.as_int() {
                self.roles.flush(role_id).await?;
            }
        }
        Ok(deleted)
    }

    /// Purge one scope of an entity. Unregistered pairs are a no-op.
    pub async fn try_purge_scope(
        &self,
        scope: Scope,
        entity_type: EntityType,
        id: impl Into<Identifier>,
    ) -> ForumResult<usize> {
        let key = match self.cache.key(entity_type, scope, id) {
            Ok(key) => key,
            Err(_) => {
                tracing::trace!(entity = %entity_type, scope = %scope, "scope is not cached");
                return Ok(0);
            }
        };
        let (deleted, error) = self.delete_all(std::slice::from_ref(&key)).await;
        match error {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    /// Strict ancestors of a microcosm, minus the root.
    async fn ancestors_to_purge(&self, id: EntityId) -> ForumResult<Vec<EntityId>> {
        let path = self.tree.microcosm_ancestors(id).await?;
        Ok(path.into_iter().skip(1).filter(|a| *a != id).collect())
    }

    async fn delete_all(&self, keys: &[CacheKey]) -> (usize, Option<ForumError>) {
        let mut deleted = 0;
        let mut first_error = None;
        for key in keys {
            match self.cache.try_delete(key).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "cache delete failed");
                    first_error.get_or_insert(ForumError::from(e));
                }
            }
        }
        (deleted, first_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCacheStore, ScopeKeyRegistry};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockTree {
        paths: HashMap<EntityId, Vec<EntityId>>,
    }

    #[async_trait]
    impl MicrocosmTree for MockTree {
        async fn microcosm_ancestors(&self, id: EntityId) -> ForumResult<Vec<EntityId>> {
            Ok(self.paths.get(&id).cloned().unwrap_or_else(|| vec![id]))
        }
    }

    #[derive(Default)]
    struct RecordingRoles {
        flushed: Mutex<Vec<EntityId>>,
    }

    #[async_trait]
    impl RoleMembershipCache for RecordingRoles {
        async fn flush(&self, role_id: EntityId) -> ForumResult<()> {
            self.flushed.lock().unwrap().push(role_id);
            Ok(())
        }
    }

    struct FailingDeletes;

    #[async_trait]
    impl CacheStore for FailingDeletes {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, forum_core::CacheError> {
            Ok(None)
        }
        async fn set(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> Result<(), forum_core::CacheError> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<(), forum_core::CacheError> {
            Err(forum_core::CacheError::Unavailable {
                reason: "down".to_string(),
            })
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Fixture {
        store: Arc<MemoryCacheStore>,
        cache: CacheFacade,
        roles: Arc<RecordingRoles>,
        invalidator: Invalidator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryCacheStore::new());
        let registry = ScopeKeyRegistry::standard(Duration::from_secs(600)).unwrap();
        let cache = CacheFacade::new(store.clone(), Arc::new(registry));
        let tree = MockTree {
            // root 1 -> A 2 -> B 3 -> 4
            paths: HashMap::from([(4, vec![1, 2, 3, 4])]),
        };
        let roles = Arc::new(RecordingRoles::default());
        let invalidator = Invalidator::new(cache.clone(), Arc::new(tree), roles.clone());
        Fixture {
            store,
            cache,
            roles,
            invalidator,
        }
    }

    async fn seed(fixture: &Fixture, entity_type: EntityType, id: EntityId) {
        for key in fixture
            .cache
            .registry()
            .keys_for(entity_type, &Identifier::Int(id))
        {
            fixture.cache.set_int(&key, id).await;
        }
    }

    #[tokio::test]
    async fn test_microcosm_purge_skips_root() {
        let f = fixture();
        for id in [1, 2, 3, 4] {
            seed(&f, EntityType::Microcosm, id).await;
        }

        f.invalidator.purge(EntityType::Microcosm, 4).await;

        assert!(f.store.contains("m_d1"));
        assert!(f.store.contains("m_c1"));
        for id in [2, 3, 4] {
            for prefix in ["m_d", "m_s", "m_t", "m_b", "m_c"] {
                assert!(!f.store.contains(&format!("{}{}", prefix, id)));
            }
        }
    }

    #[tokio::test]
    async fn test_purge_scope_is_isolated() {
        let f = fixture();
        seed(&f, EntityType::Profile, 8).await;
        seed(&f, EntityType::Profile, 9).await;

        let deleted = f
            .invalidator
            .try_purge_scope(Scope::Counts, EntityType::Profile, 8)
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(!f.store.contains("p_c8"));
        assert!(f.store.contains("p_d8"));
        assert!(f.store.contains("p_s8"));
        // same scope, other id
        assert!(f.store.contains("p_c9"));
        assert!(f.store.contains("p_d9"));
    }

    #[tokio::test]
    async fn test_role_purge_flushes_membership() {
        let f = fixture();
        seed(&f, EntityType::Role, 5).await;

        let deleted = f.invalidator.try_purge(EntityType::Role, 5).await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(*f.roles.flushed.lock().unwrap(), vec![5]);
        assert!(!f.store.contains("r_d5"));
        assert!(!f.store.contains("r_m5"));
    }

    #[tokio::test]
    async fn test_uncached_types_are_noop() {
        let f = fixture();
        for entity_type in [
            EntityType::Album,
            EntityType::Article,
            EntityType::Classified,
            EntityType::Question,
            EntityType::Poll,
        ] {
            assert_eq!(f.invalidator.try_purge(entity_type, 1).await, Ok(0));
        }
        assert_eq!(
            f.invalidator
                .try_purge_scope(Scope::Detail, EntityType::Album, 1)
                .await,
            Ok(0)
        );
        assert_eq!(f.cache.stats().deletes, 0);
    }

    #[tokio::test]
    async fn test_text_identifier_purge() {
        let f = fixture();
        let key = f
            .cache
            .key(EntityType::Site, Scope::Lookup, "forum.example.org")
            .unwrap();
        f.cache.set_int(&key, 3).await;

        f.invalidator
            .purge_scope(Scope::Lookup, EntityType::Site, "forum.example.org")
            .await;
        assert!(!f.store.contains(key.as_str()));
    }

    #[tokio::test]
    async fn test_delete_failures_are_reported_by_try_purge() {
        let registry = ScopeKeyRegistry::standard(Duration::from_secs(600)).unwrap();
        let cache = CacheFacade::new(Arc::new(FailingDeletes), Arc::new(registry));
        let invalidator = Invalidator::new(
            cache.clone(),
            Arc::new(MockTree {
                paths: HashMap::new(),
            }),
            Arc::new(RecordingRoles::default()),
        );

        let result = invalidator.try_purge(EntityType::Conversation, 1).await;
        assert!(matches!(result, Err(ForumError::Cache(_))));
        // every scope was attempted
        assert_eq!(cache.stats().errors, 4);

        // the swallowing variant does not fail
        invalidator.purge(EntityType::Conversation, 1).await;
    }

    #[tokio::test]
    async fn test_role_flush_waits_for_successful_deletes() {
        let registry = ScopeKeyRegistry::standard(Duration::from_secs(600)).unwrap();
        let cache = CacheFacade::new(Arc::new(FailingDeletes), Arc::new(registry));
        let roles = Arc::new(RecordingRoles::default());
        let invalidator = Invalidator::new(
            cache,
            Arc::new(MockTree {
                paths: HashMap::new(),
            }),
            roles.clone(),
        );

        for _ in 0..3 {
            assert!(invalidator.try_purge(EntityType::Role, 5).await.is_err());
        }
        assert!(roles.flushed.lock().unwrap().is_empty());
    }
}
