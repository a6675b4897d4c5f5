//! Identity types for forum entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric primary key of a stored entity.
pub type EntityId = i64;

/// Identifier of the site (tenant) an entity belongs to.
pub type SiteId = i64;

/// Identifier of a profile (a user's presence on one site).
pub type ProfileId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// The identifier half of a cache key.
///
/// Most entities are keyed by their numeric id; secondary indexes such as
/// site domains or usernames are keyed by a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Int(i64),
    Text(String),
}

impl Identifier {
    /// The numeric id, if this identifier is numeric.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Identifier::Int(id) => Some(*id),
            Identifier::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Identifier::Text(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(id) => write!(f, "{}", id),
            Identifier::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Identifier::Int(id)
    }
}

impl From<i32> for Identifier {
    fn from(id: i32) -> Self {
        Identifier::Int(i64::from(id))
    }
}

impl From<&str> for Identifier {
    fn from(text: &str) -> Self {
        Identifier::Text(text.to_string())
    }
}

impl From<String> for Identifier {
    fn from(text: String) -> Self {
        Identifier::Text(text)
    }
}
