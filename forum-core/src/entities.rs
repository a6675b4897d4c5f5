//! Entity records as they are cached, and the hydrated views built from them.
//!
//! The plain records are what the store returns and what the cache holds.
//! The `*View` types add related summaries and live flags, and are never
//! cached as a whole.

use crate::{EntityId, EntityType, ProfileId, SiteId, Timestamp};
use serde::{Deserialize, Serialize};

// ============================================================================
// CACHED RECORDS
// ============================================================================

/// Lightweight profile representation embedded in other entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: ProfileId,
    pub site_id: SiteId,
    pub profile_name: String,
    pub avatar_url: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: EntityId,
    pub site_id: SiteId,
    pub microcosm_id: EntityId,
    pub title: String,
    pub created_by: ProfileId,
    pub created_at: Timestamp,
    pub edited_by: Option<ProfileId>,
    pub edited_at: Option<Timestamp>,
    pub comment_count: i64,
    pub view_count: i64,
    pub is_sticky: bool,
    pub is_open: bool,
}

/// A node in the category tree. `parent_id` is `None` only for the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Microcosm {
    pub id: EntityId,
    pub site_id: SiteId,
    pub parent_id: Option<EntityId>,
    pub title: String,
    pub description: String,
    pub created_by: ProfileId,
    pub created_at: Timestamp,
    pub edited_by: Option<ProfileId>,
    pub item_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EntityId,
    pub site_id: SiteId,
    pub microcosm_id: EntityId,
    pub title: String,
    pub created_by: ProfileId,
    pub created_at: Timestamp,
    pub edited_by: Option<ProfileId>,
    pub starts_at: Option<Timestamp>,
    pub location: Option<String>,
    pub attendee_count: i64,
}

/// RSVP state of an attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rsvp {
    Invited,
    Yes,
    Maybe,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: EntityId,
    pub event_id: EntityId,
    pub profile_id: ProfileId,
    pub rsvp: Rsvp,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Date(Timestamp),
    Boolean(bool),
}

/// A key/value pair attached to any item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: EntityId,
    pub item_type: EntityType,
    pub item_id: EntityId,
    pub key: String,
    pub value: AttributeValue,
}

/// A permission role. Site-wide when `microcosm_id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: EntityId,
    pub site_id: SiteId,
    pub microcosm_id: Option<EntityId>,
    pub title: String,
    pub is_moderator_role: bool,
    pub is_banned_role: bool,
    pub include_guests: bool,
    pub include_users: bool,
    pub can_read: bool,
    pub can_create: bool,
}

/// A profile's subscription to notifications about an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watcher {
    pub id: EntityId,
    pub profile_id: ProfileId,
    pub item_type: EntityType,
    pub item_id: EntityId,
    pub send_email: bool,
    pub send_sms: bool,
    pub last_notified: Option<Timestamp>,
}

/// A private conversation between a fixed set of profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Huddle {
    pub id: EntityId,
    pub site_id: SiteId,
    pub title: String,
    pub created_by: ProfileId,
    pub created_at: Timestamp,
    pub participant_ids: Vec<ProfileId>,
}

/// An entry in a profile's updates feed, pointing at the item that changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub id: EntityId,
    pub site_id: SiteId,
    pub for_profile_id: ProfileId,
    pub update_type_id: i64,
    pub item_type: EntityType,
    pub item_id: EntityId,
    pub created_by: ProfileId,
    pub created_at: Timestamp,
    pub is_read: bool,
}

// ============================================================================
// HYDRATED VIEWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationView {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub author: ProfileSummary,
    pub editor: Option<ProfileSummary>,
    /// Whether the viewing profile has unread comments. Always computed live.
    pub unread: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrocosmView {
    #[serde(flatten)]
    pub microcosm: Microcosm,
    pub author: ProfileSummary,
    pub editor: Option<ProfileSummary>,
    /// Permission oracle verdict for the viewing profile. Always computed live.
    pub can_read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub author: ProfileSummary,
    pub editor: Option<ProfileSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeView {
    #[serde(flatten)]
    pub attendee: Attendee,
    pub profile: ProfileSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateView {
    #[serde(flatten)]
    pub update: Update,
    pub author: ProfileSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherView {
    #[serde(flatten)]
    pub watcher: Watcher,
    pub profile: ProfileSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HuddleView {
    #[serde(flatten)]
    pub huddle: Huddle,
    pub author: ProfileSummary,
    pub participants: Vec<ProfileSummary>,
}
