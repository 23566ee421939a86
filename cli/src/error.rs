//! Error types for the TextGraph command line.

use thiserror::Error;

/// Errors raised while interpreting command-line input.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid numeric document id: {0}")]
    InvalidNumericId(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),
}

/// Result type alias for command-line operations.
pub type CliResult<T> = Result<T, CliError>;
