//! Error types for the collection store

use thiserror::Error;

/// Result type alias for collection store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateName,
    NotFound,
    Validation,
    Embedding,
    Internal,
}

/// Error types that can occur in collection store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection already exists: {name}")]
    DuplicateCollection { name: String },

    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error("Record not found: {id}")]
    RecordNotFound { id: String },

    #[error("Invalid collection name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Record already exists: {id}")]
    DuplicateId { id: String },

    #[error("Length mismatch for {field}: expected {expected}, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Embedding error: {reason}")]
    Embedding { reason: String },

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StoreError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        StoreError::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn embedding(reason: impl Into<String>) -> Self {
        StoreError::Embedding {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::DuplicateCollection { .. } => ErrorKind::DuplicateName,
            StoreError::CollectionNotFound { .. } | StoreError::RecordNotFound { .. } => {
                ErrorKind::NotFound
            }
            StoreError::InvalidName { .. }
            | StoreError::DuplicateId { .. }
            | StoreError::LengthMismatch { .. }
            | StoreError::DimensionMismatch { .. }
            | StoreError::InvalidVector { .. }
            | StoreError::Validation { .. } => ErrorKind::Validation,
            StoreError::Embedding { .. } => ErrorKind::Embedding,
            StoreError::LockPoisoned | StoreError::IoError(_) | StoreError::ConfigError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// True for missing collections and records. Lets cleanup code treat
    /// deleting something that is already gone as success.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let dup = StoreError::DuplicateCollection {
            name: "x".to_string(),
        };
        assert_eq!(dup.kind(), ErrorKind::DuplicateName);

        let missing = StoreError::RecordNotFound {
            id: "id1".to_string(),
        };
        assert!(missing.is_not_found());

        let dim = StoreError::DimensionMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(dim.kind(), ErrorKind::Validation);
        assert!(!dim.is_not_found());

        assert_eq!(StoreError::embedding("boom").kind(), ErrorKind::Embedding);
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::LengthMismatch {
            field: "documents",
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Length mismatch for documents: expected 3, got 2"
        );
    }
}
