//! Error types for forum data operations

use crate::{EntityType, Identifier, Scope};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: EntityType,
        id: Identifier,
    },

    #[error("Query failed for {entity_type}: {reason}")]
    QueryFailed {
        entity_type: EntityType,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Row mapping failed for {entity_type}: {reason}")]
    RowMapping {
        entity_type: EntityType,
        reason: String,
    },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown entity type id {id}")]
    UnknownEntityType { id: i64 },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Limit must be positive, got {limit}")]
    InvalidLimit { limit: i64 },

    #[error("Offset must not be negative, got {offset}")]
    NegativeOffset { offset: i64 },

    #[error("Offset {offset} is beyond the last page (max offset {max_offset} for {total} items)")]
    OffsetOutOfRange {
        offset: i64,
        max_offset: i64,
        total: i64,
    },
}

/// Cache layer errors. These are logged and downgraded to misses by the
/// facade; they only surface from registry construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache value could not be (de)serialized: {reason}")]
    Serialization { reason: String },

    #[error("No key template registered for {entity_type}/{scope}")]
    UnregisteredScope { entity_type: EntityType, scope: Scope },

    #[error("Key templates '{first}' and '{second}' can produce the same key")]
    ConflictingTemplates { first: String, second: String },

    #[error("Key template '{template}' must be a non-empty prefix followed by one trailing '{{}}'")]
    MalformedTemplate { template: String },

    #[error("{entity_type}/{scope} is registered twice")]
    DuplicateScope { entity_type: EntityType, scope: Scope },

    #[error("{entity_type} is registered without any scope")]
    EmptyEntityType { entity_type: EntityType },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all forum data errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForumError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for forum data operations.
pub type ForumResult<T> = Result<T, ForumError>;

/// Coarse classification handed back to upstream callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Entity absent, including "no rows"
    NotFound,
    /// Caller-supplied data failed a precondition
    BadRequest,
    /// Query, serialization, transaction or cache failure
    Internal,
}

impl ErrorCode {
    /// HTTP-style status code for this classification.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::BadRequest => 400,
            ErrorCode::Internal => 500,
        }
    }
}

impl ForumError {
    /// Shorthand for a not-found storage error.
    pub fn not_found(entity_type: EntityType, id: impl Into<Identifier>) -> Self {
        ForumError::Storage(StorageError::NotFound {
            entity_type,
            id: id.into(),
        })
    }

    /// Shorthand for a query failure.
    pub fn query_failed(entity_type: EntityType, reason: impl Into<String>) -> Self {
        ForumError::Storage(StorageError::QueryFailed {
            entity_type,
            reason: reason.into(),
        })
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ForumError::Storage(StorageError::NotFound { .. }) => ErrorCode::NotFound,
            ForumError::Storage(_) => ErrorCode::Internal,
            ForumError::Validation(_) => ErrorCode::BadRequest,
            ForumError::Cache(_) | ForumError::Config(_) => ErrorCode::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.code().status_code()
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity_type: EntityType::Conversation,
            id: Identifier::Int(3),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("conversation"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_offset_out_of_range_display() {
        let err = ValidationError::OffsetOutOfRange {
            offset: 60,
            max_offset: 40,
            total: 47,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("60"));
        assert!(msg.contains("40"));
        assert!(msg.contains("47"));
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(
            ForumError::not_found(EntityType::Profile, 1).code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            ForumError::from(ValidationError::InvalidLimit { limit: 0 }).status_code(),
            400
        );
        assert_eq!(
            ForumError::query_failed(EntityType::Role, "connection reset").status_code(),
            500
        );
        assert_eq!(
            ForumError::from(StorageError::TransactionFailed {
                reason: "commit".to_string()
            })
            .code(),
            ErrorCode::Internal
        );
    }

    #[test]
    fn test_master_error_from_conversions() {
        let err: ForumError = CacheError::Unavailable {
            reason: "refused".to_string(),
        }
        .into();
        assert!(matches!(err, ForumError::Cache(_)));
        assert!(!err.is_not_found());
    }
}
