//! TextGraph command-line library
//!
//! Store JSON-encoded annotated text in a TextGraph database, read it back and
//! run filter queries against it.

pub mod commands;
pub mod error;

pub use error::CliError;
