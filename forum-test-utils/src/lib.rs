//! Forum Test Utilities
//!
//! Shared test infrastructure for the forum workspace:
//! - An in-memory relational store with failure and latency injection
//! - Recording permission oracle and role-membership cache
//! - Proptest generators for entity records and cache coordinates
//! - A seeded forum fixture with a four-level microcosm tree
//! - Custom assertions for error classification and cache state

// Re-export core types for convenience
pub use forum_core::{
    Attendee, Attribute, AttributeValue, Conversation, DataConfig, EntityId, EntityType,
    ErrorCode, ErrorSelection, Event, ForumError, ForumResult, Huddle, Identifier, Microcosm,
    Page, PaginatedCollection, ProfileId, ProfileSummary, Role, Rsvp, Scope, SiteId,
    StorageError, Timestamp, Update, ValidationError, Watcher,
};
pub use forum_storage::{
    Cacheable, ForumStore, IdPage, ListQuery, ListSource, MemoryCacheStore, MicrocosmTree,
    PermissionOracle, RoleMembershipCache, StorageFetcher,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// A record type with a table in [`InMemoryForumStore`].
pub trait StoredRecord: Cacheable {
    fn table(store: &InMemoryForumStore) -> &RwLock<HashMap<EntityId, Self>>;
}

type Table<T> = Arc<RwLock<HashMap<EntityId, T>>>;

/// In-memory stand-in for the relational store.
///
/// Clones share state, so a test can keep a handle for seeding and
/// inspection after giving one to the data layer.
#[derive(Debug, Default, Clone)]
pub struct InMemoryForumStore {
    profiles: Table<ProfileSummary>,
    conversations: Table<Conversation>,
    microcosms: Table<Microcosm>,
    events: Table<Event>,
    attendees: Table<Attendee>,
    attributes: Table<Attribute>,
    roles: Table<Role>,
    updates: Table<Update>,
    watchers: Table<Watcher>,
    huddles: Table<Huddle>,
    role_members: Arc<RwLock<HashMap<EntityId, Vec<ProfileId>>>>,
    unread: Arc<RwLock<HashSet<(EntityId, ProfileId)>>>,
    domains: Arc<RwLock<HashMap<String, SiteId>>>,
    failing: Arc<RwLock<HashSet<(EntityType, EntityId)>>>,
    failing_queries: Arc<RwLock<HashSet<ListQuery>>>,
    delays: Arc<RwLock<HashMap<(EntityType, EntityId), Duration>>>,
    fetches: Arc<RwLock<HashMap<EntityType, usize>>>,
    lookups: Arc<AtomicUsize>,
}

macro_rules! stored_record {
    ($ty:ty, $field:ident) => {
        impl StoredRecord for $ty {
            fn table(store: &InMemoryForumStore) -> &RwLock<HashMap<EntityId, Self>> {
                &store.$field
            }
        }
    };
}

stored_record!(ProfileSummary, profiles);
stored_record!(Conversation, conversations);
stored_record!(Microcosm, microcosms);
stored_record!(Event, events);
stored_record!(Attendee, attendees);
stored_record!(Attribute, attributes);
stored_record!(Role, roles);
stored_record!(Update, updates);
stored_record!(Watcher, watchers);
stored_record!(Huddle, huddles);

impl InMemoryForumStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record.
    pub fn insert<T: StoredRecord>(&self, record: T) {
        T::table(self)
            .write()
            .unwrap()
            .insert(record.entity_id(), record);
    }

    pub fn remove<T: StoredRecord>(&self, id: EntityId) -> Option<T> {
        T::table(self).write().unwrap().remove(&id)
    }

    pub fn get<T: StoredRecord>(&self, id: EntityId) -> Option<T> {
        T::table(self).read().unwrap().get(&id).cloned()
    }

    pub fn add_role_member(&self, role_id: EntityId, profile_id: ProfileId) {
        self.role_members
            .write()
            .unwrap()
            .entry(role_id)
            .or_default()
            .push(profile_id);
    }

    pub fn set_unread(&self, conversation_id: EntityId, profile_id: ProfileId, unread: bool) {
        let mut set = self.unread.write().unwrap();
        if unread {
            set.insert((conversation_id, profile_id));
        } else {
            set.remove(&(conversation_id, profile_id));
        }
    }

    pub fn add_domain(&self, domain: &str, site_id: SiteId) {
        self.domains
            .write()
            .unwrap()
            .insert(domain.to_string(), site_id);
    }

    pub fn remove_domain(&self, domain: &str) {
        self.domains.write().unwrap().remove(domain);
    }

    /// Make every fetch of `(entity_type, id)` fail with a query error.
    pub fn fail_fetch(&self, entity_type: EntityType, id: EntityId) {
        self.failing.write().unwrap().insert((entity_type, id));
    }

    pub fn heal_fetch(&self, entity_type: EntityType, id: EntityId) {
        self.failing.write().unwrap().remove(&(entity_type, id));
    }

    /// Make the id page of `query` fail with a query error.
    pub fn fail_list(&self, query: ListQuery) {
        self.failing_queries.write().unwrap().insert(query);
    }

    /// Delay every fetch of `(entity_type, id)` by `delay`.
    pub fn delay_fetch(&self, entity_type: EntityType, id: EntityId, delay: Duration) {
        self.delays
            .write()
            .unwrap()
            .insert((entity_type, id), delay);
    }

    /// Number of single-record fetches served for an entity type.
    pub fn fetch_count(&self, entity_type: EntityType) -> usize {
        self.fetches
            .read()
            .unwrap()
            .get(&entity_type)
            .copied()
            .unwrap_or(0)
    }

    /// Number of username and domain lookups served.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.fetches.write().unwrap().clear();
        self.lookups.store(0, Ordering::SeqCst);
    }

    async fn before_fetch(&self, entity_type: EntityType, id: EntityId) -> ForumResult<()> {
        *self
            .fetches
            .write()
            .unwrap()
            .entry(entity_type)
            .or_default() += 1;

        let delay = self.delays.read().unwrap().get(&(entity_type, id)).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.read().unwrap().contains(&(entity_type, id)) {
            return Err(ForumError::query_failed(
                entity_type,
                format!("injected failure for id {}", id),
            ));
        }
        Ok(())
    }

    /// Every id of a listing in display order.
    fn listing(&self, query: &ListQuery) -> Vec<EntityId> {
        match query {
            ListQuery::AttendeesOfEvent { event_id } => {
                sorted_ids(&self.attendees, |a| a.event_id == *event_id)
            }
            ListQuery::AttributesOfItem { item_type, item_id } => sorted_ids(&self.attributes, |a| {
                a.item_type == *item_type && a.item_id == *item_id
            }),
            ListQuery::ProfilesOnSite { site_id } => {
                sorted_ids(&self.profiles, |p| p.site_id == *site_id)
            }
            ListQuery::ConversationsInMicrocosm { microcosm_id } => {
                sorted_ids(&self.conversations, |c| c.microcosm_id == *microcosm_id)
            }
            ListQuery::MicrocosmChildren { microcosm_id } => {
                sorted_ids(&self.microcosms, |m| m.parent_id == Some(*microcosm_id))
            }
            ListQuery::RolesInMicrocosm {
                site_id,
                microcosm_id,
            } => sorted_ids(&self.roles, |r| {
                r.site_id == *site_id && r.microcosm_id == *microcosm_id
            }),
            ListQuery::RoleMembers { role_id } => self
                .role_members
                .read()
                .unwrap()
                .get(role_id)
                .cloned()
                .unwrap_or_default(),
            ListQuery::HuddleParticipants { huddle_id } => self
                .huddles
                .read()
                .unwrap()
                .get(huddle_id)
                .map(|h| h.participant_ids.clone())
                .unwrap_or_default(),
            // Newest first
            ListQuery::UpdatesForProfile { profile_id } => {
                let mut ids = sorted_ids(&self.updates, |u| u.for_profile_id == *profile_id);
                ids.reverse();
                ids
            }
            ListQuery::WatchersOfProfile { profile_id } => {
                sorted_ids(&self.watchers, |w| w.profile_id == *profile_id)
            }
        }
    }
}

fn sorted_ids<T>(table: &RwLock<HashMap<EntityId, T>>, keep: impl Fn(&T) -> bool) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = table
        .read()
        .unwrap()
        .iter()
        .filter(|(_, record)| keep(record))
        .map(|(id, _)| *id)
        .collect();
    ids.sort_unstable();
    ids
}

#[async_trait]
impl<T: StoredRecord> StorageFetcher<T> for InMemoryForumStore {
    async fn fetch(&self, id: EntityId) -> ForumResult<Option<T>> {
        self.before_fetch(T::entity_type(), id).await?;
        let record = self.get::<T>(id);
        Ok(record)
    }
}

#[async_trait]
impl ListSource for InMemoryForumStore {
    async fn page(&self, query: &ListQuery, page: Page) -> ForumResult<IdPage> {
        if self.failing_queries.read().unwrap().contains(query) {
            return Err(ForumError::query_failed(
                query.item_type(),
                format!("injected failure for {}", query.name()),
            ));
        }

        let ids = self.listing(query);
        let total = ids.len() as i64;
        let ids = ids
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect();
        Ok(IdPage::new(total, ids))
    }
}

#[async_trait]
impl MicrocosmTree for InMemoryForumStore {
    async fn microcosm_ancestors(&self, id: EntityId) -> ForumResult<Vec<EntityId>> {
        let microcosms = self.microcosms.read().unwrap();
        let mut path = Vec::new();
        let mut current = Some(id);

        while let Some(node) = current {
            // Corrupt parent links must not loop forever
            if path.contains(&node) {
                break;
            }
            let microcosm = microcosms
                .get(&node)
                .ok_or_else(|| ForumError::not_found(EntityType::Microcosm, node))?;
            path.push(node);
            current = microcosm.parent_id;
        }

        path.reverse();
        Ok(path)
    }
}

#[async_trait]
impl ForumStore for InMemoryForumStore {
    async fn has_unread(
        &self,
        conversation_id: EntityId,
        profile_id: ProfileId,
    ) -> ForumResult<bool> {
        Ok(self
            .unread
            .read()
            .unwrap()
            .contains(&(conversation_id, profile_id)))
    }

    async fn profile_id_by_name(
        &self,
        site_id: SiteId,
        name: &str,
    ) -> ForumResult<Option<ProfileId>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .profiles
            .read()
            .unwrap()
            .values()
            .find(|p| p.site_id == site_id && p.profile_name == name)
            .map(|p| p.id))
    }

    async fn site_id_by_domain(&self, domain: &str) -> ForumResult<Option<SiteId>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.domains.read().unwrap().get(domain).copied())
    }
}

// ============================================================================
// RECORDING COLLABORATORS
// ============================================================================

/// Permission oracle that allows everything not explicitly denied and
/// counts how often it is asked.
#[derive(Debug, Default)]
pub struct RecordingPermissionOracle {
    denied: RwLock<HashSet<(EntityType, EntityId, Option<ProfileId>)>>,
    checks: AtomicUsize,
}

impl RecordingPermissionOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, item_type: EntityType, item_id: EntityId, profile_id: Option<ProfileId>) {
        self.denied
            .write()
            .unwrap()
            .insert((item_type, item_id, profile_id));
    }

    pub fn allow(&self, item_type: EntityType, item_id: EntityId, profile_id: Option<ProfileId>) {
        self.denied
            .write()
            .unwrap()
            .remove(&(item_type, item_id, profile_id));
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionOracle for RecordingPermissionOracle {
    async fn can_read(
        &self,
        _site_id: SiteId,
        _microcosm_id: Option<EntityId>,
        item_type: EntityType,
        item_id: EntityId,
        profile_id: Option<ProfileId>,
    ) -> ForumResult<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(!self
            .denied
            .read()
            .unwrap()
            .contains(&(item_type, item_id, profile_id)))
    }
}

/// Role-membership cache that records which roles were flushed.
#[derive(Debug, Default)]
pub struct RecordingRoleCache {
    flushed: RwLock<Vec<EntityId>>,
}

impl RecordingRoleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flushed(&self) -> Vec<EntityId> {
        self.flushed.read().unwrap().clone()
    }
}

#[async_trait]
impl RoleMembershipCache for RecordingRoleCache {
    async fn flush(&self, role_id: EntityId) -> ForumResult<()> {
        self.flushed.write().unwrap().push(role_id);
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for forum records and cache coordinates.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_entity_type() -> impl Strategy<Value = EntityType> {
        prop::sample::select(EntityType::ALL.to_vec())
    }

    pub fn arb_scope() -> impl Strategy<Value = Scope> {
        prop::sample::select(Scope::ALL.to_vec())
    }

    pub fn arb_entity_id() -> impl Strategy<Value = EntityId> {
        1i64..1_000_000
    }

    /// Numeric ids and domain-like text tokens.
    pub fn arb_identifier() -> impl Strategy<Value = Identifier> {
        prop_oneof![
            any::<i64>().prop_map(Identifier::Int),
            "[a-z0-9][a-z0-9.:-]{0,30}".prop_map(Identifier::Text),
        ]
    }

    /// A valid page request.
    pub fn arb_page() -> impl Strategy<Value = Page> {
        (1i64..=forum_core::MAX_LIMIT, 0i64..2_000)
            .prop_map(|(limit, offset)| Page { limit, offset })
    }

    /// Timestamps between 2020 and 2030, whole seconds.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_rsvp() -> impl Strategy<Value = Rsvp> {
        prop_oneof![
            Just(Rsvp::Invited),
            Just(Rsvp::Yes),
            Just(Rsvp::Maybe),
            Just(Rsvp::No),
        ]
    }

    pub fn arb_profile_summary() -> impl Strategy<Value = ProfileSummary> {
        (
            arb_entity_id(),
            1i64..10,
            "[a-z][a-z0-9_]{2,15}",
            proptest::option::of("https://img\\.example\\.org/[a-z0-9]{8}\\.png"),
            any::<bool>(),
        )
            .prop_map(|(id, site_id, profile_name, avatar_url, visible)| ProfileSummary {
                id,
                site_id,
                profile_name,
                avatar_url,
                visible,
            })
    }

    pub fn arb_conversation() -> impl Strategy<Value = Conversation> {
        (
            arb_entity_id(),
            arb_entity_id(),
            "[A-Za-z ]{1,40}",
            arb_entity_id(),
            arb_timestamp(),
            proptest::option::of(arb_entity_id()),
            0i64..10_000,
            0i64..100_000,
            any::<bool>(),
        )
            .prop_map(
                |(id, microcosm_id, title, created_by, created_at, edited_by, comments, views, sticky)| {
                    Conversation {
                        id,
                        site_id: 1,
                        microcosm_id,
                        title,
                        created_by,
                        created_at,
                        edited_at: edited_by.map(|_| created_at),
                        edited_by,
                        comment_count: comments,
                        view_count: views,
                        is_sticky: sticky,
                        is_open: true,
                    }
                },
            )
    }

    pub fn arb_attendee() -> impl Strategy<Value = Attendee> {
        (
            arb_entity_id(),
            arb_entity_id(),
            arb_entity_id(),
            arb_rsvp(),
            arb_timestamp(),
        )
            .prop_map(|(id, event_id, profile_id, rsvp, created_at)| Attendee {
                id,
                event_id,
                profile_id,
                rsvp,
                created_at,
            })
    }

    pub fn arb_attribute_value() -> impl Strategy<Value = AttributeValue> {
        prop_oneof![
            "[a-z ]{0,20}".prop_map(AttributeValue::String),
            (-1.0e6f64..1.0e6).prop_map(AttributeValue::Number),
            arb_timestamp().prop_map(AttributeValue::Date),
            any::<bool>().prop_map(AttributeValue::Boolean),
        ]
    }

    pub fn arb_attribute() -> impl Strategy<Value = Attribute> {
        (
            arb_entity_id(),
            arb_entity_type(),
            arb_entity_id(),
            "[a-z_]{1,16}",
            arb_attribute_value(),
        )
            .prop_map(|(id, item_type, item_id, key, value)| Attribute {
                id,
                item_type,
                item_id,
                key,
                value,
            })
    }

    /// Distinct ids in arbitrary order, as a page of a listing would hold.
    pub fn arb_id_batch(max_len: usize) -> impl Strategy<Value = Vec<EntityId>> {
        prop::collection::hash_set(arb_entity_id(), 0..=max_len)
            .prop_map(|set| set.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and a seeded forum.
    //!
    //! The seeded forum has one site with five profiles and this
    //! microcosm tree:
    //!
    //! ```text
    //! 1 (root)
    //! ├── 2
    //! │   └── 3
    //! │       └── 4 (leaf: conversations, events)
    //! └── 5
    //! ```

    use super::*;

    pub const SITE_ID: SiteId = 1;
    pub const SITE_DOMAIN: &str = "forum.example.org";
    pub const PROFILE_NAMES: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];

    pub const ROOT_MICROCOSM: EntityId = 1;
    pub const LEAF_MICROCOSM: EntityId = 4;
    pub const SIBLING_MICROCOSM: EntityId = 5;

    /// Conversations in the leaf microcosm. The second one has been edited.
    pub const CONVERSATIONS: [EntityId; 3] = [10, 11, 12];

    /// Event with 47 attendees, ids 1001..=1047.
    pub const BIG_EVENT: EntityId = 20;
    pub const BIG_EVENT_ATTENDEES: i64 = 47;
    pub const EMPTY_EVENT: EntityId = 21;

    pub const SITE_ROLE: EntityId = 30;
    pub const MICROCOSM_ROLE: EntityId = 31;
    pub const HUDDLE: EntityId = 40;

    /// A fixed point in time so fixtures compare equal across calls.
    pub fn fixed_time() -> Timestamp {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_else(Utc::now)
    }

    /// Config with a tiny retry backoff.
    pub fn test_config() -> DataConfig {
        DataConfig {
            invalidation_backoff: Duration::from_millis(1),
            ..DataConfig::default()
        }
    }

    pub fn profile(id: ProfileId, name: &str) -> ProfileSummary {
        ProfileSummary {
            id,
            site_id: SITE_ID,
            profile_name: name.to_string(),
            avatar_url: Some(format!("https://img.example.org/{}.png", name)),
            visible: true,
        }
    }

    pub fn microcosm(id: EntityId, parent_id: Option<EntityId>) -> Microcosm {
        Microcosm {
            id,
            site_id: SITE_ID,
            parent_id,
            title: format!("Microcosm {}", id),
            description: String::new(),
            created_by: 1,
            created_at: fixed_time(),
            edited_by: None,
            item_count: 0,
            comment_count: 0,
        }
    }

    pub fn conversation(id: EntityId, microcosm_id: EntityId, created_by: ProfileId) -> Conversation {
        Conversation {
            id,
            site_id: SITE_ID,
            microcosm_id,
            title: format!("Conversation {}", id),
            created_by,
            created_at: fixed_time(),
            edited_by: None,
            edited_at: None,
            comment_count: 0,
            view_count: 0,
            is_sticky: false,
            is_open: true,
        }
    }

    pub fn event(id: EntityId, microcosm_id: EntityId, created_by: ProfileId) -> Event {
        Event {
            id,
            site_id: SITE_ID,
            microcosm_id,
            title: format!("Event {}", id),
            created_by,
            created_at: fixed_time(),
            edited_by: None,
            starts_at: Some(fixed_time()),
            location: Some("Town hall".to_string()),
            attendee_count: 0,
        }
    }

    pub fn attendee(id: EntityId, event_id: EntityId, profile_id: ProfileId) -> Attendee {
        Attendee {
            id,
            event_id,
            profile_id,
            rsvp: Rsvp::Yes,
            created_at: fixed_time(),
        }
    }

    pub fn attribute(id: EntityId, item_type: EntityType, item_id: EntityId, key: &str) -> Attribute {
        Attribute {
            id,
            item_type,
            item_id,
            key: key.to_string(),
            value: AttributeValue::Boolean(true),
        }
    }

    pub fn role(id: EntityId, microcosm_id: Option<EntityId>) -> Role {
        Role {
            id,
            site_id: SITE_ID,
            microcosm_id,
            title: format!("Role {}", id),
            is_moderator_role: false,
            is_banned_role: false,
            include_guests: false,
            include_users: true,
            can_read: true,
            can_create: true,
        }
    }

    pub fn watcher(id: EntityId, profile_id: ProfileId, item_type: EntityType, item_id: EntityId) -> Watcher {
        Watcher {
            id,
            profile_id,
            item_type,
            item_id,
            send_email: true,
            send_sms: false,
            last_notified: None,
        }
    }

    pub fn update(id: EntityId, for_profile_id: ProfileId, created_by: ProfileId) -> Update {
        Update {
            id,
            site_id: SITE_ID,
            for_profile_id,
            update_type_id: 1,
            item_type: EntityType::Conversation,
            item_id: CONVERSATIONS[0],
            created_by,
            created_at: fixed_time(),
            is_read: false,
        }
    }

    pub fn huddle(id: EntityId, created_by: ProfileId, participant_ids: Vec<ProfileId>) -> Huddle {
        Huddle {
            id,
            site_id: SITE_ID,
            title: format!("Huddle {}", id),
            created_by,
            created_at: fixed_time(),
            participant_ids,
        }
    }

    /// A store holding the seeded forum described in the module docs.
    pub fn seeded_forum() -> InMemoryForumStore {
        let store = InMemoryForumStore::new();
        store.add_domain(SITE_DOMAIN, SITE_ID);

        for (i, name) in PROFILE_NAMES.iter().enumerate() {
            store.insert(profile(i as ProfileId + 1, name));
        }

        store.insert(microcosm(ROOT_MICROCOSM, None));
        store.insert(microcosm(2, Some(ROOT_MICROCOSM)));
        store.insert(microcosm(3, Some(2)));
        store.insert(microcosm(LEAF_MICROCOSM, Some(3)));
        store.insert(microcosm(SIBLING_MICROCOSM, Some(ROOT_MICROCOSM)));

        for id in CONVERSATIONS {
            store.insert(conversation(id, LEAF_MICROCOSM, 1));
        }
        let mut edited = conversation(CONVERSATIONS[1], LEAF_MICROCOSM, 1);
        edited.edited_by = Some(2);
        edited.edited_at = Some(fixed_time());
        store.insert(edited);
        store.set_unread(CONVERSATIONS[0], 2, true);

        let mut big = event(BIG_EVENT, LEAF_MICROCOSM, 1);
        big.attendee_count = BIG_EVENT_ATTENDEES;
        store.insert(big);
        store.insert(event(EMPTY_EVENT, LEAF_MICROCOSM, 2));
        for n in 1..=BIG_EVENT_ATTENDEES {
            let profile_id = (n - 1) % PROFILE_NAMES.len() as i64 + 1;
            store.insert(attendee(1000 + n, BIG_EVENT, profile_id));
        }

        store.insert(role(SITE_ROLE, None));
        store.insert(role(MICROCOSM_ROLE, Some(LEAF_MICROCOSM)));
        for profile_id in [1, 2, 3] {
            store.add_role_member(SITE_ROLE, profile_id);
        }

        store.insert(huddle(HUDDLE, 1, vec![1, 2, 3]));

        for id in [50, 51, 52] {
            store.insert(update(id, 1, 2));
        }
        store.insert(watcher(60, 1, EntityType::Conversation, CONVERSATIONS[0]));
        store.insert(watcher(61, 1, EntityType::Event, BIG_EVENT));
        store.insert(attribute(70, EntityType::Conversation, CONVERSATIONS[0], "pinned"));
        store.insert(attribute(71, EntityType::Conversation, CONVERSATIONS[0], "featured"));

        store
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for error classification and cache state.

    use super::*;
    use forum_storage::CacheKey;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &ForumResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a result is a NotFound for the given entity and id.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(
        result: &ForumResult<T>,
        entity_type: EntityType,
        id: impl Into<Identifier>,
    ) {
        let id = id.into();
        match result {
            Err(ForumError::Storage(StorageError::NotFound {
                entity_type: et,
                id: got,
            })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
                assert_eq!(*got, id, "Wrong id in NotFound error");
            }
            other => panic!("Expected NotFound for {} {}, got: {:?}", entity_type, id, other),
        }
    }

    #[track_caller]
    pub fn assert_bad_request<T: std::fmt::Debug>(result: &ForumResult<T>) {
        match result {
            Err(e) if e.code() == ErrorCode::BadRequest => {}
            other => panic!("Expected bad request, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_internal<T: std::fmt::Debug>(result: &ForumResult<T>) {
        match result {
            Err(e) if e.code() == ErrorCode::Internal => {}
            other => panic!("Expected internal error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_offset_out_of_range<T: std::fmt::Debug>(
        result: &ForumResult<T>,
        offset: i64,
        max_offset: i64,
        total: i64,
    ) {
        let expected = ValidationError::OffsetOutOfRange {
            offset,
            max_offset,
            total,
        };
        match result {
            Err(ForumError::Validation(got)) => assert_eq!(*got, expected),
            other => panic!("Expected {:?}, got: {:?}", expected, other),
        }
    }

    /// Assert the pagination numbers of a collection.
    #[track_caller]
    pub fn assert_page_shape<T>(collection: &PaginatedCollection<T>, total: i64, pages: i64, len: usize) {
        assert_eq!(collection.total, total, "total mismatch");
        assert_eq!(collection.pages, pages, "page count mismatch");
        assert_eq!(collection.len(), len, "item count mismatch");
    }

    #[track_caller]
    pub fn assert_cached(store: &MemoryCacheStore, key: &CacheKey) {
        assert!(store.contains(key.as_str()), "Expected {} to be cached", key.as_str());
    }

    #[track_caller]
    pub fn assert_not_cached(store: &MemoryCacheStore, key: &CacheKey) {
        assert!(!store.contains(key.as_str()), "Expected {} to be absent", key.as_str());
    }
}

// ============================================================================
// TESTS
// ============================================================================
