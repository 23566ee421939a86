//! Error types for textgraph

use thiserror::Error;

/// Errors that can occur while storing or loading annotated text
#[derive(Debug, Error)]
pub enum GraphError {
    /// RocksDB error
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UUID parsing error
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Node or document not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A handle resolved to a node of a different kind than expected
    #[error("Unexpected node {id}: expected {expected}, found {found}")]
    UnexpectedNode {
        id: String,
        expected: &'static str,
        found: &'static str,
    },

    /// On-disk schema is newer than this build understands
    #[error("Incompatible schema version {found} (supported: {supported})")]
    IncompatibleSchema { found: u32, supported: u32 },

    /// Invalid path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl GraphError {
    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an unexpected node error
    pub fn unexpected_node(
        id: impl std::fmt::Display,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::UnexpectedNode {
            id: id.to_string(),
            expected,
            found,
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error means the requested entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
