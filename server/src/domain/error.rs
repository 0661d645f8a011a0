//! Domain error taxonomy
//!
//! Every fallible domain operation returns [`DomainError`]. The API layer
//! owns the mapping to HTTP status codes; domain code never thinks in HTTP
//! terms.

use thiserror::Error;

use crate::data::SqliteError;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Request payload failed validation
    #[error("{0}")]
    Validation(String),

    /// Entity does not exist (or belongs to another tenant)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Pipeline transition not allowed from the current status
    #[error("cannot transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: String,
        to: String,
        /// Statuses that would have been accepted
        allowed: Vec<String>,
    },

    /// Entity exists but is in a state that forbids the operation
    #[error("{0}")]
    InvalidState(String),

    /// A referenced value is unusable (wrong tenant, inactive user, ...)
    #[error("{0}")]
    InvalidArgument(String),

    /// Bulk assignment found no active users to assign to
    #[error("no eligible assignees")]
    NoEligibleAssignees,

    /// Graph API (or other upstream) failure
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Storage failure
    #[error("database error: {0}")]
    Database(#[from] SqliteError),

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = DomainError::InvalidTransition {
            from: "new".to_string(),
            to: "negotiation".to_string(),
            allowed: vec!["qualified".to_string(), "lost".to_string()],
        };
        assert_eq!(err.to_string(), "cannot transition from 'new' to 'negotiation'");
    }

    #[test]
    fn test_not_found_display() {
        let err = DomainError::not_found("lead", "abc123");
        assert_eq!(err.to_string(), "lead not found: abc123");
    }

    #[test]
    fn test_database_error_wraps() {
        let err: DomainError = SqliteError::Conflict("status moved".to_string()).into();
        assert!(matches!(err, DomainError::Database(_)));
    }
}
