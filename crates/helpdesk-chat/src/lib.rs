//! Conversational query resolution for the help desk.
//!
//! Fuzzy-matches free-text questions against the knowledge base, decides
//! between answering, asking for clarification and giving up, and keeps the
//! per-session state (recent turns, pending choices) needed to carry a
//! conversation across requests.

pub mod context;
pub mod error;
pub mod escalation;
pub mod orchestrator;
pub mod resolver;
pub mod response;
pub mod scorer;
pub mod types;

pub use context::ConversationContext;
pub use error::{ChatError, ResolveError};
pub use escalation::EscalationDetector;
pub use orchestrator::ChatOrchestrator;
pub use resolver::QueryResolver;
pub use response::ResponseComposer;
pub use types::{
    ChatMessage, ChatReply, ChatRole, ChatSessionSummary, ConversationSession, EscalationHint,
    PendingChoices, ReplyKind,
};
