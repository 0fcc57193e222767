//! Core error taxonomy
//!
//! Every failure the engine can surface falls into one of four buckets:
//! a missing referenced entity, a validation failure (always carrying the
//! full list of reasons so callers can render all problems at once), a
//! uniqueness/version conflict, or an unexpected storage fault. Nothing is
//! retried internally beyond the bounded revision retry in the association
//! engine; errors surface synchronously.

use miette::Diagnostic;
use thiserror::Error;

use crate::core::identity::EntityPrefix;

/// Result alias used throughout the core
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for all core operations
#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    /// A referenced entity does not exist
    #[error("{} not found: {key}", .kind.noun())]
    #[diagnostic(code(mdt::not_found))]
    NotFound { kind: EntityPrefix, key: String },

    /// One or more validation checks failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationFailure),

    /// Unique-code or compound-key collision, or a revision conflict that
    /// survived the retry bound
    #[error("conflict: {0}")]
    #[diagnostic(code(mdt::conflict))]
    Conflict(String),

    /// Unexpected persistence failure
    #[error("storage error: {0}")]
    #[diagnostic(code(mdt::storage))]
    Storage(String),
}

impl CoreError {
    /// A `NotFound` for the given entity kind, keyed by id or code
    pub fn not_found(kind: EntityPrefix, key: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// A `Validation` error from a list of individual reasons
    pub fn validation(reasons: Vec<String>) -> Self {
        CoreError::Validation(ValidationFailure::new(reasons))
    }
}

/// A validation failure carrying every individual reason.
///
/// The engine collects all problems before failing rather than stopping at
/// the first, so a caller can render the complete picture in one pass.
#[derive(Debug, Error, Diagnostic)]
#[error("validation failed: {summary}")]
#[diagnostic(code(mdt::validation))]
pub struct ValidationFailure {
    summary: String,

    #[help]
    detail: String,

    reasons: Vec<String>,
}

impl ValidationFailure {
    pub fn new(reasons: Vec<String>) -> Self {
        let summary = if reasons.len() == 1 {
            "1 problem".to_string()
        } else {
            format!("{} problems", reasons.len())
        };
        let detail = reasons.join("\n");
        Self {
            summary,
            detail,
            reasons,
        }
    }

    /// The individual failure reasons, in check order
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_uses_noun() {
        let err = CoreError::not_found(EntityPrefix::Type, "television");
        assert_eq!(err.to_string(), "item type not found: television");
    }

    #[test]
    fn test_validation_carries_all_reasons() {
        let err = CoreError::validation(vec![
            "missing required attribute: warranty_months".to_string(),
            "missing required attribute: screen_size".to_string(),
        ]);
        match err {
            CoreError::Validation(f) => {
                assert_eq!(f.reasons().len(), 2);
                assert!(f.to_string().contains("2 problems"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
