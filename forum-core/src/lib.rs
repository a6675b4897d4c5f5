//! Forum Core - Entity Types
//!
//! Pure data structures shared by the data-access layer: entity and scope
//! tags, identifiers, cached records, errors, pagination math and
//! configuration. All other crates depend on this one.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod pagination;

pub use config::{DataConfig, ErrorSelection, DEFAULT_CACHE_TTL_SECS};
pub use entities::{
    Attendee, AttendeeView, Attribute, AttributeValue, Conversation, ConversationView, Event,
    EventView, Huddle, HuddleView, Microcosm, MicrocosmView, ProfileSummary, Role, Rsvp, Update,
    UpdateView, Watcher, WatcherView,
};
pub use enums::{EntityType, Scope};
pub use error::{
    CacheError, ConfigError, ErrorCode, ForumError, ForumResult, StorageError, ValidationError,
};
pub use identity::{EntityId, Identifier, ProfileId, SiteId, Timestamp};
pub use pagination::{
    max_offset, page_count, validate_offset, Page, PaginatedCollection, DEFAULT_LIMIT, MAX_LIMIT,
};
