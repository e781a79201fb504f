//! Chat session and reply types.

use helpdesk_core::types::{Candidate, TicketPriority};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ConversationContext;

// =============================================================================
// Sessions
// =============================================================================

/// Candidates offered to the user and not yet answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoices {
    pub candidates: Vec<Candidate>,
    /// Epoch seconds when the choices were offered.
    pub offered_at: i64,
}

impl PendingChoices {
    /// Find an offered candidate by key, ignoring case and surrounding whitespace.
    pub fn find(&self, key: &str) -> Option<&Candidate> {
        let wanted = helpdesk_core::types::comparison_key(key);
        self.candidates
            .iter()
            .find(|c| helpdesk_core::types::comparison_key(&c.key) == wanted)
    }
}

/// State of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: Uuid,
    /// Epoch seconds.
    pub started_at: i64,
    /// Epoch seconds of the most recent user action.
    pub last_message_at: i64,
    pub message_count: u32,
    pub context: ConversationContext,
    pub pending: Option<PendingChoices>,
}

impl ConversationSession {
    pub fn new(context_turns: usize, now: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: now,
            last_message_at: now,
            message_count: 0,
            context: ConversationContext::new(context_turns),
            pending: None,
        }
    }

    /// True when the session has been idle longer than `timeout_minutes`.
    pub fn is_expired(&self, timeout_minutes: u32, now: i64) -> bool {
        now - self.last_message_at > i64::from(timeout_minutes) * 60
    }

    pub(crate) fn touch(&mut self, now: i64) {
        self.last_message_at = now;
        self.message_count += 1;
    }
}

/// Summary of a session for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionSummary {
    pub id: Uuid,
    pub started_at: String,
    pub last_message_at: String,
    pub message_count: u32,
    pub has_pending_choices: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of a session's message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: i64,
}

// =============================================================================
// Replies
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Answered,
    Ambiguous,
    Unknown,
}

/// Suggestion to raise a support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationHint {
    pub priority: TicketPriority,
    pub reason: String,
}

impl EscalationHint {
    pub fn message(&self) -> String {
        format!(
            "Would you like to raise a {} priority support ticket? ({})",
            self.priority, self.reason
        )
    }
}

/// A rendered reply to one user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub kind: ReplyKind,
    pub text: String,
    /// Offered choices, only populated for [`ReplyKind::Ambiguous`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationHint>,
}
