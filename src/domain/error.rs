//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent malformed input to the document model.
/// Missing markers are not errors; the locator reports them as absent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("node is not part of the document: {0}")]
    DetachedNode(String),

    #[error("node cannot be inserted there: {0}")]
    HierarchyRequest(String),

    #[error("invalid document snapshot: {0}")]
    InvalidSnapshot(String),
}

impl DomainError {
    pub(crate) fn selector(selector: &str, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
