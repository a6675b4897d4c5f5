//! Enum types for forum entities

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY TYPE
// ============================================================================

/// Entity type discriminator.
///
/// The integer identity returned by [`EntityType::id`] is stored in the
/// database as the item-type column and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Site,
    Microcosm,
    Profile,
    Comment,
    Huddle,
    Conversation,
    Poll,
    Article,
    Event,
    Question,
    Classified,
    Album,
    Attendee,
    User,
    Attribute,
    Update,
    Role,
    UpdateType,
    Watcher,
    Auth,
    Attachment,
}

impl EntityType {
    /// Every entity type, in identity order.
    pub const ALL: [EntityType; 21] = [
        EntityType::Site,
        EntityType::Microcosm,
        EntityType::Profile,
        EntityType::Comment,
        EntityType::Huddle,
        EntityType::Conversation,
        EntityType::Poll,
        EntityType::Article,
        EntityType::Event,
        EntityType::Question,
        EntityType::Classified,
        EntityType::Album,
        EntityType::Attendee,
        EntityType::User,
        EntityType::Attribute,
        EntityType::Update,
        EntityType::Role,
        EntityType::UpdateType,
        EntityType::Watcher,
        EntityType::Auth,
        EntityType::Attachment,
    ];

    /// Stable integer identity.
    pub fn id(self) -> i64 {
        match self {
            EntityType::Site => 1,
            EntityType::Microcosm => 2,
            EntityType::Profile => 3,
            EntityType::Comment => 4,
            EntityType::Huddle => 5,
            EntityType::Conversation => 6,
            EntityType::Poll => 7,
            EntityType::Article => 8,
            EntityType::Event => 9,
            EntityType::Question => 10,
            EntityType::Classified => 11,
            EntityType::Album => 12,
            EntityType::Attendee => 13,
            EntityType::User => 14,
            EntityType::Attribute => 15,
            EntityType::Update => 16,
            EntityType::Role => 17,
            EntityType::UpdateType => 18,
            EntityType::Watcher => 19,
            EntityType::Auth => 20,
            EntityType::Attachment => 21,
        }
    }

    /// Resolve an integer identity back to an entity type.
    pub fn from_id(id: i64) -> Result<Self, ValidationError> {
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.id() == id)
            .ok_or(ValidationError::UnknownEntityType { id })
    }

    /// Lowercase name used in logs, metrics labels and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Site => "site",
            EntityType::Microcosm => "microcosm",
            EntityType::Profile => "profile",
            EntityType::Comment => "comment",
            EntityType::Huddle => "huddle",
            EntityType::Conversation => "conversation",
            EntityType::Poll => "poll",
            EntityType::Article => "article",
            EntityType::Event => "event",
            EntityType::Question => "question",
            EntityType::Classified => "classified",
            EntityType::Album => "album",
            EntityType::Attendee => "attendee",
            EntityType::User => "user",
            EntityType::Attribute => "attribute",
            EntityType::Update => "update",
            EntityType::Role => "role",
            EntityType::UpdateType => "updatetype",
            EntityType::Watcher => "watcher",
            EntityType::Auth => "auth",
            EntityType::Attachment => "attachment",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_token(s);
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "entity_type".to_string(),
                reason: format!("unknown entity type '{}'", s),
            })
    }
}

// ============================================================================
// CACHE SCOPE
// ============================================================================

/// A named facet of an entity's cached representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The full object
    Detail,
    /// A lighter read view
    Summary,
    /// Just the display name
    Title,
    /// Aggregate numeric stats
    Counts,
    /// Per-user preference object
    Options,
    /// Ancestor chain
    Breadcrumb,
    /// String-keyed secondary index (domain, username)
    Lookup,
    /// Derived membership set
    Members,
}

impl Scope {
    pub const ALL: [Scope; 8] = [
        Scope::Detail,
        Scope::Summary,
        Scope::Title,
        Scope::Counts,
        Scope::Options,
        Scope::Breadcrumb,
        Scope::Lookup,
        Scope::Members,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Detail => "detail",
            Scope::Summary => "summary",
            Scope::Title => "title",
            Scope::Counts => "counts",
            Scope::Options => "options",
            Scope::Breadcrumb => "breadcrumb",
            Scope::Lookup => "lookup",
            Scope::Members => "members",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_token(s);
        Scope::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "scope".to_string(),
                reason: format!("unknown scope '{}'", s),
            })
    }
}

fn normalize_token(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_entity_type_ids_are_unique_and_stable() {
        let ids: HashSet<i64> = EntityType::ALL.iter().map(|t| t.id()).collect();
        assert_eq!(ids.len(), EntityType::ALL.len());
        assert_eq!(EntityType::Site.id(), 1);
        assert_eq!(EntityType::Conversation.id(), 6);
        assert_eq!(EntityType::Role.id(), 17);
        assert_eq!(EntityType::Attachment.id(), 21);
    }

    #[test]
    fn test_entity_type_from_id_roundtrip() {
        for entity_type in EntityType::ALL {
            assert_eq!(EntityType::from_id(entity_type.id()), Ok(entity_type));
        }
    }

    #[test]
    fn test_entity_type_from_unknown_id() {
        assert_eq!(
            EntityType::from_id(99),
            Err(ValidationError::UnknownEntityType { id: 99 })
        );
    }

    #[test]
    fn test_entity_type_parse_is_lenient() {
        assert_eq!("Update_Type".parse::<EntityType>(), Ok(EntityType::UpdateType));
        assert_eq!(" microcosm ".parse::<EntityType>(), Ok(EntityType::Microcosm));
        assert!("forum".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_scope_display_and_parse() {
        for scope in Scope::ALL {
            assert_eq!(scope.to_string().parse::<Scope>(), Ok(scope));
        }
    }
}
