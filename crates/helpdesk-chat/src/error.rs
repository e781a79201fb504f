//! Error types for query resolution and chat sessions.

use helpdesk_core::error::HelpdeskError;
use uuid::Uuid;

/// Errors from resolving unvalidated input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid knowledge base: {0}")]
    InvalidKnowledgeBase(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("no pending choices for session {0}")]
    NoPendingChoices(Uuid),
    #[error("'{0}' was not one of the offered choices")]
    SelectionNotOffered(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<HelpdeskError> for ChatError {
    fn from(err: HelpdeskError) -> Self {
        match err {
            HelpdeskError::Config(msg) => ChatError::Config(msg),
            other => ChatError::StorageError(other.to_string()),
        }
    }
}
