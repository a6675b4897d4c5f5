//! Scoped cache keys.
//!
//! A `CacheKey` can only be produced by a [`ScopeKeyRegistry`], so every key
//! in circulation corresponds to a registered (entity type, scope) pair and
//! was rendered from that pair's template.
//!
//! [`ScopeKeyRegistry`]: super::registry::ScopeKeyRegistry

use forum_core::{EntityType, Identifier, Scope};
use std::fmt;

/// A rendered cache key together with the triple it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Private inner data - cannot be constructed outside this crate
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyInner {
    entity_type: EntityType,
    scope: Scope,
    identifier: Identifier,
    rendered: String,
}

impl CacheKey {
    /// Render `prefix` + identifier. Only the registry calls this, after it
    /// has checked that the prefix set is collision-free.
    pub(crate) fn render(
        prefix: &str,
        entity_type: EntityType,
        scope: Scope,
        identifier: Identifier,
    ) -> Self {
        let rendered = format!("{}{}", prefix, identifier);
        Self {
            inner: KeyInner {
                entity_type,
                scope,
                identifier,
                rendered,
            },
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.inner.entity_type
    }

    pub fn scope(&self) -> Scope {
        self.inner.scope
    }

    pub fn identifier(&self) -> &Identifier {
        &self.inner.identifier
    }

    /// The string sent to the cache store.
    pub fn as_str(&self) -> &str {
        &self.inner.rendered
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.rendered)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
