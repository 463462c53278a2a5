//! Attachment error types.

use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

/// Attachment operation errors.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// MIME type not in the configured allow-set.
    #[error("unsupported MIME type: {mime_type}")]
    UnsupportedType {
        /// The rejected MIME type.
        mime_type: String,
    },

    /// File size exceeds the configured maximum.
    #[error("file too large: {size} bytes exceeds maximum {max} bytes")]
    TooLarge {
        /// Actual file size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Finalize called for a key that storage does not have.
    #[error("upload did not complete: no object at key {key}")]
    ObjectMissing {
        /// The probed object key.
        key: String,
    },

    /// Mediated-path storage write failed; no record was created.
    #[error("upload failed: {0}")]
    UploadFailed(#[source] StorageError),

    /// Attachment not found or soft-deleted.
    #[error("attachment not found: {0}")]
    NotFound(Uuid),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Record store operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl AttachmentError {
    /// Create an unsupported MIME type error.
    #[must_use]
    pub fn unsupported_type(mime_type: impl Into<String>) -> Self {
        Self::UnsupportedType {
            mime_type: mime_type.into(),
        }
    }

    /// Create a too large error.
    #[must_use]
    pub fn too_large(size: u64, max: u64) -> Self {
        Self::TooLarge { size, max }
    }

    /// Create an object missing error.
    #[must_use]
    pub fn object_missing(key: impl Into<String>) -> Self {
        Self::ObjectMissing { key: key.into() }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(id: Uuid) -> Self {
        Self::NotFound(id)
    }

    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Whether the caller can fix this by changing the request.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType { .. }
                | Self::TooLarge { .. }
                | Self::ObjectMissing { .. }
                | Self::NotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_error_classification() {
        assert!(AttachmentError::unsupported_type("text/html").is_caller_error());
        assert!(AttachmentError::too_large(2, 1).is_caller_error());
        assert!(AttachmentError::object_missing("a/b").is_caller_error());
        assert!(AttachmentError::not_found(Uuid::new_v4()).is_caller_error());
        assert!(!AttachmentError::repository("boom").is_caller_error());
        assert!(
            !AttachmentError::UploadFailed(StorageError::operation("down")).is_caller_error()
        );
    }
}
