//! Error types for the core library.

use thiserror::Error;

use crate::list::ListId;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Neither a user reference nor an email address was supplied.
    #[error("Invalid identity: a user reference or an email address is required")]
    InvalidIdentity,

    /// A required argument of a query was empty.
    #[error("Missing argument: `{0}` is required")]
    MissingArgument(&'static str),

    /// A batch replacement referenced a list that does not exist.
    #[error("The subscriber list with id {0} does not exist")]
    UnknownList(ListId),

    /// Database operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
