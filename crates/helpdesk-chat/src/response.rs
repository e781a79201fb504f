//! Reply composition.
//!
//! Turns a [`ResolutionResult`] into the text shown to the user and attaches a
//! ticket suggestion when the message looks urgent or nothing matched.

use helpdesk_core::types::{Candidate, ResolutionResult, TicketPriority};

use crate::types::{ChatReply, EscalationHint, ReplyKind};

pub const UNKNOWN_ANSWER: &str = "Sorry, I don't know the answer to that question.";
pub const CLARIFY_PROMPT: &str = "I'm not sure which one you mean. Please choose one below.";
pub const NONE_OF_THESE: &str = "None of these";

/// Builds [`ChatReply`] values.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseComposer;

impl ResponseComposer {
    /// Compose a reply. `keyword` is an escalation keyword found in the
    /// user's message, if any.
    pub fn compose(&self, result: ResolutionResult, keyword: Option<&str>) -> ChatReply {
        let (kind, text, candidates) = match result {
            ResolutionResult::Answered { text } => (ReplyKind::Answered, text, Vec::new()),
            ResolutionResult::Ambiguous { candidates } => {
                (ReplyKind::Ambiguous, CLARIFY_PROMPT.to_string(), candidates)
            }
            ResolutionResult::Unknown => (ReplyKind::Unknown, UNKNOWN_ANSWER.to_string(), Vec::new()),
        };

        let escalation = match (keyword, kind) {
            (Some(keyword), _) => Some(EscalationHint {
                priority: TicketPriority::High,
                reason: format!("message mentions '{}'", keyword),
            }),
            (None, ReplyKind::Unknown) => Some(EscalationHint {
                priority: TicketPriority::Medium,
                reason: "no matching answer was found".to_string(),
            }),
            _ => None,
        };

        ChatReply {
            kind,
            text,
            candidates,
            escalation,
        }
    }

    /// Display label of a disambiguation choice.
    pub fn candidate_label(candidate: &Candidate) -> String {
        format!("{} (confidence: {})", candidate.key, candidate.score)
    }

    /// Plain-text rendering for the terminal front end: numbered choices,
    /// with `0` for "none of these".
    pub fn render_terminal(reply: &ChatReply) -> String {
        let mut lines = vec![reply.text.clone()];
        if reply.kind == ReplyKind::Ambiguous {
            for (i, candidate) in reply.candidates.iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, Self::candidate_label(candidate)));
            }
            lines.push(format!("  0. {}", NONE_OF_THESE));
        }
        if let Some(hint) = &reply.escalation {
            lines.push(hint.message());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate {
                key: "reset password".into(),
                score: 58,
            },
            Candidate {
                key: "change email".into(),
                score: 58,
            },
        ]
    }

    #[test]
    fn test_answered_reply() {
        let reply = ResponseComposer.compose(
            ResolutionResult::Answered {
                text: "Go to settings > reset.".into(),
            },
            None,
        );
        assert_eq!(reply.kind, ReplyKind::Answered);
        assert_eq!(reply.text, "Go to settings > reset.");
        assert!(reply.candidates.is_empty());
        assert!(reply.escalation.is_none());
    }

    #[test]
    fn test_unknown_reply_suggests_ticket() {
        let reply = ResponseComposer.compose(ResolutionResult::Unknown, None);
        assert_eq!(reply.kind, ReplyKind::Unknown);
        assert_eq!(reply.text, UNKNOWN_ANSWER);
        assert_eq!(reply.escalation.unwrap().priority, TicketPriority::Medium);
    }

    #[test]
    fn test_keyword_escalates_to_high() {
        let reply = ResponseComposer.compose(
            ResolutionResult::Answered { text: "ok".into() },
            Some("urgent"),
        );
        let hint = reply.escalation.unwrap();
        assert_eq!(hint.priority, TicketPriority::High);
        assert!(hint.reason.contains("urgent"));
    }

    #[test]
    fn test_ambiguous_reply_carries_candidates() {
        let reply = ResponseComposer.compose(
            ResolutionResult::Ambiguous {
                candidates: candidates(),
            },
            None,
        );
        assert_eq!(reply.kind, ReplyKind::Ambiguous);
        assert_eq!(reply.text, CLARIFY_PROMPT);
        assert_eq!(reply.candidates, candidates());
        assert!(reply.escalation.is_none());
    }

    #[test]
    fn test_candidate_label() {
        assert_eq!(
            ResponseComposer::candidate_label(&candidates()[0]),
            "reset password (confidence: 58)"
        );
    }

    #[test]
    fn test_render_terminal_numbers_choices() {
        let reply = ResponseComposer.compose(
            ResolutionResult::Ambiguous {
                candidates: candidates(),
            },
            None,
        );
        let rendered = ResponseComposer::render_terminal(&reply);
        assert_eq!(
            rendered,
            "I'm not sure which one you mean. Please choose one below.\n  \
             1. reset password (confidence: 58)\n  \
             2. change email (confidence: 58)\n  \
             0. None of these"
        );
    }

    #[test]
    fn test_render_terminal_appends_escalation() {
        let reply = ResponseComposer.compose(ResolutionResult::Unknown, None);
        let rendered = ResponseComposer::render_terminal(&reply);
        assert!(rendered.starts_with(UNKNOWN_ANSWER));
        assert!(rendered.contains("Medium priority support ticket"));
    }
}
