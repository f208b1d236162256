//! Domain errors

use thiserror::Error;

/// Errors raised while parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("Illegal {kind} '{value}'")]
    Malformed { kind: &'static str, value: String },

    #[error("Unknown country '{0}'")]
    UnknownCountry(String),

    #[error("{kind} '{value}' does not belong to operator '{operator}'")]
    ForeignOperator {
        kind: &'static str,
        value: String,
        operator: String,
    },
}

impl IdError {
    pub(crate) fn malformed(kind: &'static str, value: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            value: value.into(),
        }
    }
}

/// Errors raised by roaming network aggregates.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with id={id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Already exists: {entity} with id={id}")]
    Conflict { entity: &'static str, id: String },

    #[error("Addition of {entity} '{id}' was vetoed: {reason}")]
    Vetoed {
        entity: &'static str,
        id: String,
        reason: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error(transparent)]
    Id(#[from] IdError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
