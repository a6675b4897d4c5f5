//! Collaborators the data-access layer consumes but does not implement.
//!
//! The relational store, the permission engine and the role-membership
//! recomputation all live outside this crate. They are reached through the
//! traits below so the layer can run against an in-memory store in tests.

use async_trait::async_trait;
use forum_core::{
    Attendee, Attribute, Conversation, EntityId, EntityType, Event, ForumResult, Huddle,
    Microcosm, Page, ProfileId, ProfileSummary, Role, SiteId, Update, Watcher,
};
use serde::{Deserialize, Serialize};

use crate::cache::Cacheable;

/// Storage fetcher trait for retrieving one record by primary key.
///
/// `Ok(None)` means "no rows". Any other failure is returned as an error
/// and classified by the caller.
#[async_trait]
pub trait StorageFetcher<T: Cacheable>: Send + Sync {
    async fn fetch(&self, id: EntityId) -> ForumResult<Option<T>>;
}

/// Ancestor lookup in the microcosm tree.
#[async_trait]
pub trait MicrocosmTree: Send + Sync {
    /// Path from the root microcosm down to `id`, inclusive. Root first.
    async fn microcosm_ancestors(&self, id: EntityId) -> ForumResult<Vec<EntityId>>;
}

/// Bounded SELECT behind every paginated listing.
#[async_trait]
pub trait ListSource: Send + Sync {
    /// One page of ids plus the total row count, in display order.
    async fn page(&self, query: &ListQuery, page: Page) -> ForumResult<IdPage>;
}

/// The relational store, as seen by the read path.
#[async_trait]
pub trait ForumStore:
    ListSource
    + MicrocosmTree
    + StorageFetcher<ProfileSummary>
    + StorageFetcher<Conversation>
    + StorageFetcher<Microcosm>
    + StorageFetcher<Event>
    + StorageFetcher<Attendee>
    + StorageFetcher<Attribute>
    + StorageFetcher<Role>
    + StorageFetcher<Update>
    + StorageFetcher<Watcher>
    + StorageFetcher<Huddle>
    + Send
    + Sync
{
    /// Whether `profile_id` has unread comments in a conversation.
    async fn has_unread(&self, conversation_id: EntityId, profile_id: ProfileId)
        -> ForumResult<bool>;

    async fn profile_id_by_name(&self, site_id: SiteId, name: &str)
        -> ForumResult<Option<ProfileId>>;

    async fn site_id_by_domain(&self, domain: &str) -> ForumResult<Option<SiteId>>;
}

/// Black-box permission predicate.
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    /// Can `profile_id` (guest when `None`) read the item?
    async fn can_read(
        &self,
        site_id: SiteId,
        microcosm_id: Option<EntityId>,
        item_type: EntityType,
        item_id: EntityId,
        profile_id: Option<ProfileId>,
    ) -> ForumResult<bool>;
}

/// Derived cache of which profiles hold which role.
#[async_trait]
pub trait RoleMembershipCache: Send + Sync {
    /// Recompute the membership of `role_id`. Runs in its own transaction.
    async fn flush(&self, role_id: EntityId) -> ForumResult<()>;
}

/// Every paginated listing the layer serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum ListQuery {
    AttendeesOfEvent { event_id: EntityId },
    AttributesOfItem { item_type: EntityType, item_id: EntityId },
    ProfilesOnSite { site_id: SiteId },
    ConversationsInMicrocosm { microcosm_id: EntityId },
    MicrocosmChildren { microcosm_id: EntityId },
    /// Site-wide roles when `microcosm_id` is `None`.
    RolesInMicrocosm { site_id: SiteId, microcosm_id: Option<EntityId> },
    RoleMembers { role_id: EntityId },
    HuddleParticipants { huddle_id: EntityId },
    UpdatesForProfile { profile_id: ProfileId },
    WatchersOfProfile { profile_id: ProfileId },
}

impl ListQuery {
    /// Entity type of the ids this query returns.
    pub fn item_type(&self) -> EntityType {
        match self {
            ListQuery::AttendeesOfEvent { .. } => EntityType::Attendee,
            ListQuery::AttributesOfItem { .. } => EntityType::Attribute,
            ListQuery::ProfilesOnSite { .. } => EntityType::Profile,
            ListQuery::ConversationsInMicrocosm { .. } => EntityType::Conversation,
            ListQuery::MicrocosmChildren { .. } => EntityType::Microcosm,
            ListQuery::RolesInMicrocosm { .. } => EntityType::Role,
            ListQuery::RoleMembers { .. } => EntityType::Profile,
            ListQuery::HuddleParticipants { .. } => EntityType::Profile,
            ListQuery::UpdatesForProfile { .. } => EntityType::Update,
            ListQuery::WatchersOfProfile { .. } => EntityType::Watcher,
        }
    }

    /// Short name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ListQuery::AttendeesOfEvent { .. } => "attendees_of_event",
            ListQuery::AttributesOfItem { .. } => "attributes_of_item",
            ListQuery::ProfilesOnSite { .. } => "profiles_on_site",
            ListQuery::ConversationsInMicrocosm { .. } => "conversations_in_microcosm",
            ListQuery::MicrocosmChildren { .. } => "microcosm_children",
            ListQuery::RolesInMicrocosm { .. } => "roles_in_microcosm",
            ListQuery::RoleMembers { .. } => "role_members",
            ListQuery::HuddleParticipants { .. } => "huddle_participants",
            ListQuery::UpdatesForProfile { .. } => "updates_for_profile",
            ListQuery::WatchersOfProfile { .. } => "watchers_of_profile",
        }
    }
}

/// One page of ids as returned by a bounded SELECT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPage {
    /// Row count of the whole listing, not of this page.
    pub total: i64,
    pub ids: Vec<EntityId>,
}

impl IdPage {
    pub fn new(total: i64, ids: Vec<EntityId>) -> Self {
        Self { total, ids }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_types() {
        assert_eq!(
            ListQuery::AttendeesOfEvent { event_id: 1 }.item_type(),
            EntityType::Attendee
        );
        assert_eq!(
            ListQuery::RoleMembers { role_id: 1 }.item_type(),
            EntityType::Profile
        );
        assert_eq!(
            ListQuery::RolesInMicrocosm {
                site_id: 1,
                microcosm_id: None
            }
            .item_type(),
            EntityType::Role
        );
    }

    #[test]
    fn test_list_query_serializes_tagged() {
        let query = ListQuery::AttributesOfItem {
            item_type: EntityType::Conversation,
            item_id: 9,
        };
        let json = serde_json::to_value(&query).expect("serialize");
        assert_eq!(json["query"], "attributes_of_item");
        assert_eq!(json["item_id"], 9);
        assert_eq!(query.name(), "attributes_of_item");
    }
}
