use thiserror::Error;
use uuid::Uuid;

/// Errors reported by an [`ImportStore`](super::ImportStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed.
    #[error("Store error: {message}")]
    Backend { message: String },

    /// A referenced record does not exist.
    #[error("Record not found: {context}")]
    NotFound { context: String },

    /// A write collided with a record under a different identity.
    #[error("Conflicting record for key {key}")]
    Conflict { key: String },
}

impl StoreError {
    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a NotFound error for an internal id.
    pub fn not_found_by_id(id: Uuid) -> Self {
        Self::NotFound {
            context: format!("id={}", id),
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
