//! Scope key registry.
//!
//! An immutable table, built once at startup, that maps each cached
//! (entity type, scope) pair to a key template and a TTL. It is passed to the
//! facade and invalidator explicitly.
//!
//! Templates are a prefix followed by a single trailing `{}`. The builder
//! rejects any pair of prefixes where one starts with the other, which is
//! exactly the condition under which `prefix + identifier` could render the
//! same string for two different triples.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use forum_core::{CacheError, EntityType, Identifier, Scope};

use super::key::CacheKey;

const PLACEHOLDER: &str = "{}";

/// TTL for aggregates that change with every comment.
pub const COUNTS_TTL: Duration = Duration::from_secs(60 * 60);

/// One registered (entity type, scope) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    prefix: String,
    ttl: Duration,
}

impl ScopeEntry {
    pub fn template(&self) -> String {
        format!("{}{}", self.prefix, PLACEHOLDER)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Immutable scope key table.
#[derive(Debug, Clone)]
pub struct ScopeKeyRegistry {
    entries: HashMap<EntityType, BTreeMap<Scope, ScopeEntry>>,
}

impl ScopeKeyRegistry {
    pub fn builder(default_ttl: Duration) -> RegistryBuilder {
        RegistryBuilder {
            default_ttl,
            pending: Vec::new(),
        }
    }

    /// The forum's standard table.
    ///
    /// Album, Article, Classified, Poll, Question, User, Auth, UpdateType and
    /// Attachment are deliberately absent: they are never cached.
    pub fn standard(default_ttl: Duration) -> Result<Self, CacheError> {
        use EntityType as E;
        use Scope as S;

        Self::builder(default_ttl)
            .register(E::Site, S::Detail, "s_d{}")
            .register(E::Site, S::Lookup, "s_h{}")
            .register(E::Microcosm, S::Detail, "m_d{}")
            .register(E::Microcosm, S::Summary, "m_s{}")
            .register(E::Microcosm, S::Title, "m_t{}")
            .register(E::Microcosm, S::Breadcrumb, "m_b{}")
            .register_with_ttl(E::Microcosm, S::Counts, "m_c{}", COUNTS_TTL)
            .register(E::Profile, S::Detail, "p_d{}")
            .register(E::Profile, S::Summary, "p_s{}")
            .register(E::Profile, S::Title, "p_t{}")
            .register(E::Profile, S::Options, "p_o{}")
            .register_with_ttl(E::Profile, S::Counts, "p_c{}", COUNTS_TTL)
            .register(E::Profile, S::Lookup, "p_n{}")
            .register(E::Comment, S::Detail, "c_d{}")
            .register(E::Comment, S::Summary, "c_s{}")
            .register(E::Huddle, S::Detail, "h_d{}")
            .register(E::Huddle, S::Summary, "h_s{}")
            .register(E::Huddle, S::Title, "h_t{}")
            .register(E::Conversation, S::Detail, "cv_d{}")
            .register(E::Conversation, S::Summary, "cv_s{}")
            .register(E::Conversation, S::Title, "cv_t{}")
            .register(E::Conversation, S::Breadcrumb, "cv_b{}")
            .register(E::Event, S::Detail, "e_d{}")
            .register(E::Event, S::Summary, "e_s{}")
            .register(E::Event, S::Title, "e_t{}")
            .register(E::Event, S::Breadcrumb, "e_b{}")
            .register(E::Attendee, S::Detail, "ea_d{}")
            .register(E::Attribute, S::Detail, "at_d{}")
            .register(E::Update, S::Detail, "u_d{}")
            .register(E::Role, S::Detail, "r_d{}")
            .register(E::Role, S::Members, "r_m{}")
            .register(E::Watcher, S::Detail, "w_d{}")
            .build()
    }

    /// Build the key for one (entity type, scope, identifier) triple.
    pub fn key(
        &self,
        entity_type: EntityType,
        scope: Scope,
        identifier: impl Into<Identifier>,
    ) -> Result<CacheKey, CacheError> {
        let entry = self
            .entry(entity_type, scope)
            .ok_or(CacheError::UnregisteredScope { entity_type, scope })?;
        Ok(CacheKey::render(
            &entry.prefix,
            entity_type,
            scope,
            identifier.into(),
        ))
    }

    /// Keys for every id-keyed scope of an entity. Empty for uncached types.
    ///
    /// `Lookup` entries are keyed by a name or domain token rather than the
    /// entity id, so they are not part of this expansion; they are purged by
    /// token through [`ScopeKeyRegistry::key`].
    pub fn keys_for(&self, entity_type: EntityType, identifier: &Identifier) -> Vec<CacheKey> {
        self.entries
            .get(&entity_type)
            .map(|scopes| {
                scopes
                    .iter()
                    .filter(|(scope, _)| **scope != Scope::Lookup)
                    .map(|(scope, entry)| {
                        CacheKey::render(&entry.prefix, entity_type, *scope, identifier.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn entry(&self, entity_type: EntityType, scope: Scope) -> Option<&ScopeEntry> {
        self.entries.get(&entity_type)?.get(&scope)
    }

    pub fn ttl(&self, entity_type: EntityType, scope: Scope) -> Option<Duration> {
        self.entry(entity_type, scope).map(ScopeEntry::ttl)
    }

    pub fn is_cached(&self, entity_type: EntityType) -> bool {
        self.entries.contains_key(&entity_type)
    }

    /// Registered scopes of an entity type, in declaration order of [`Scope`].
    pub fn scopes(&self, entity_type: EntityType) -> Vec<Scope> {
        self.entries
            .get(&entity_type)
            .map(|scopes| scopes.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Entity types with at least one registered scope.
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.entries.keys().copied().collect();
        types.sort();
        types
    }
}

/// Collects registrations and validates them in [`RegistryBuilder::build`].
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    default_ttl: Duration,
    pending: Vec<(EntityType, Scope, String, Duration)>,
}

impl RegistryBuilder {
    pub fn register(self, entity_type: EntityType, scope: Scope, template: &str) -> Self {
        let ttl = self.default_ttl;
        self.register_with_ttl(entity_type, scope, template, ttl)
    }

    pub fn register_with_ttl(
        mut self,
        entity_type: EntityType,
        scope: Scope,
        template: &str,
        ttl: Duration,
    ) -> Self {
        self.pending
            .push((entity_type, scope, template.to_string(), ttl));
        self
    }

    pub fn build(self) -> Result<ScopeKeyRegistry, CacheError> {
        let mut entries: HashMap<EntityType, BTreeMap<Scope, ScopeEntry>> = HashMap::new();
        let mut prefixes: Vec<String> = Vec::with_capacity(self.pending.len());

        for (entity_type, scope, template, ttl) in self.pending {
            let prefix = parse_template(&template)?;

            if let Some(existing) = prefixes
                .iter()
                .find(|p| p.starts_with(prefix.as_str()) || prefix.starts_with(p.as_str()))
            {
                return Err(CacheError::ConflictingTemplates {
                    first: format!("{}{}", existing, PLACEHOLDER),
                    second: template,
                });
            }

            let scopes = entries.entry(entity_type).or_default();
            if scopes.contains_key(&scope) {
                return Err(CacheError::DuplicateScope { entity_type, scope });
            }
            prefixes.push(prefix.clone());
            scopes.insert(scope, ScopeEntry { prefix, ttl });
        }

        if let Some((entity_type, _)) = entries.iter().find(|(_, scopes)| scopes.is_empty()) {
            return Err(CacheError::EmptyEntityType {
                entity_type: *entity_type,
            });
        }

        Ok(ScopeKeyRegistry { entries })
    }
}

fn parse_template(template: &str) -> Result<String, CacheError> {
    let malformed = || CacheError::MalformedTemplate {
        template: template.to_string(),
    };
    let prefix = template.strip_suffix(PLACEHOLDER).ok_or_else(malformed)?;
    if prefix.is_empty() || prefix.contains('{') || prefix.contains('}') || !prefix.is_ascii() {
        return Err(malformed());
    }
    Ok(prefix.to_string())
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn registered_pair() -> impl Strategy<Value = (EntityType, Scope)> {
        let registry = ScopeKeyRegistry::standard(Duration::from_secs(60))
            .expect("standard registry is valid");
        let pairs: Vec<(EntityType, Scope)> = registry
            .entity_types()
            .into_iter()
            .flat_map(|t| registry.scopes(t).into_iter().map(move |s| (t, s)))
            .collect();
        proptest::sample::select(pairs)
    }

    fn identifier() -> impl Strategy<Value = Identifier> {
        prop_oneof![
            any::<i64>().prop_map(Identifier::Int),
            "[a-z0-9.]{1,16}".prop_map(Identifier::Text),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Keys of different (entity type, scope) pairs never collide, and the
        /// same triple always renders the same key.
        #[test]
        fn prop_keys_are_injective(
            (type1, scope1) in registered_pair(),
            (type2, scope2) in registered_pair(),
            id1 in identifier(),
            id2 in identifier(),
        ) {
            let registry = ScopeKeyRegistry::standard(Duration::from_secs(60))
                .expect("standard registry is valid");
            let key1 = registry.key(type1, scope1, id1.clone()).expect("registered");
            let key2 = registry.key(type2, scope2, id2.clone()).expect("registered");

            let same_triple = type1 == type2 && scope1 == scope2 && id1 == id2;
            if same_triple {
                prop_assert_eq!(key1.as_str(), key2.as_str());
            } else if (type1, scope1) != (type2, scope2) {
                prop_assert_ne!(key1.as_str(), key2.as_str());
            }
        }
    }
}
