//! Error types for the scheduling engine.
//!
//! Two kinds of failure exist: a value or configuration violating a
//! precondition ([`ValidationError`]), and reading an attribute that is
//! only defined after setup. Both are caller errors; nothing is retried.

use thiserror::Error;

pub use crate::validation::{ValidationError, ValidationErrorKind};

/// Errors returned by the scheduling engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobShopError {
    /// A precondition or schedule invariant was violated.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An attribute was read before it became well-defined.
    #[error("uninitialized attribute `{attribute}`: {reason}")]
    UninitializedAttribute {
        /// Name of the attribute.
        attribute: &'static str,
        /// Why the attribute is undefined.
        reason: String,
    },
}

impl JobShopError {
    /// Creates a validation error of the given kind.
    pub fn validation(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(kind, message))
    }

    /// Returns the validation category, if this is a validation error.
    pub fn validation_kind(&self) -> Option<ValidationErrorKind> {
        match self {
            Self::Validation(e) => Some(e.kind),
            Self::UninitializedAttribute { .. } => None,
        }
    }

    /// Whether this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Collapses a list of validation errors into one, joining the messages.
impl From<Vec<ValidationError>> for JobShopError {
    fn from(errors: Vec<ValidationError>) -> Self {
        let kind = errors
            .first()
            .map(|e| e.kind)
            .unwrap_or(ValidationErrorKind::InvalidShape);
        let message = errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Self::validation(kind, message)
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, JobShopError>;
