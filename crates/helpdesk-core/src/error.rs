use thiserror::Error;

/// Top-level error type for the help desk.
///
/// Subsystem crates define their own error types and convert into or out of
/// `HelpdeskError` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HelpdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid knowledge base: {0}")]
    InvalidKnowledgeBase(String),

    #[error("Knowledge entry not found: {0}")]
    EntryNotFound(String),

    #[error("Duplicate knowledge entry: {0}")]
    DuplicateEntry(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ticket not found: {0}")]
    TicketNotFound(usize),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for HelpdeskError {
    fn from(err: toml::de::Error) -> Self {
        HelpdeskError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HelpdeskError {
    fn from(err: toml::ser::Error) -> Self {
        HelpdeskError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for HelpdeskError {
    fn from(err: serde_json::Error) -> Self {
        HelpdeskError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for help desk operations.
pub type Result<T> = std::result::Result<T, HelpdeskError>;
