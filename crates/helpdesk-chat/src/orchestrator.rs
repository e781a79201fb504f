//! Chat orchestrator: session management around the query resolver.
//!
//! Owns conversation sessions (context window and pending choices), routes
//! messages and disambiguation follow-ups through the resolver, and keeps a
//! bounded message history per session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local, TimeZone};
use helpdesk_core::config::{ChatConfig, HelpdeskConfig};
use helpdesk_core::types::{KnowledgeSource, ResolutionResult};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ChatError;
use crate::escalation::EscalationDetector;
use crate::resolver::QueryResolver;
use crate::response::{ResponseComposer, NONE_OF_THESE};
use crate::types::{
    ChatMessage, ChatReply, ChatRole, ChatSessionSummary, ConversationSession, PendingChoices,
    ReplyKind,
};

/// Central chat coordinator.
pub struct ChatOrchestrator {
    resolver: QueryResolver,
    escalation: EscalationDetector,
    composer: ResponseComposer,
    knowledge: Arc<dyn KnowledgeSource>,
    sessions: Mutex<HashMap<Uuid, ConversationSession>>,
    messages: Mutex<HashMap<Uuid, Vec<ChatMessage>>>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(
        config: &HelpdeskConfig,
        knowledge: Arc<dyn KnowledgeSource>,
    ) -> Result<Self, ChatError> {
        Ok(Self {
            resolver: QueryResolver::new(config.resolver.clone()),
            escalation: EscalationDetector::new(&config.escalation)?,
            composer: ResponseComposer,
            knowledge,
            sessions: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            config: config.chat.clone(),
        })
    }

    pub fn resolver(&self) -> &QueryResolver {
        &self.resolver
    }

    /// Handle a free-text message.
    ///
    /// Returns the reply and the session ID, which is new when `session_id`
    /// is absent, unknown or expired. Any pending choices are superseded.
    pub fn handle_message(
        &self,
        message: &str,
        session_id: Option<Uuid>,
    ) -> Result<(ChatReply, Uuid), ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        if message.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        let sid = self.resolve_session(session_id)?;

        if message.trim().is_empty() {
            return Ok((self.composer.compose(ResolutionResult::Unknown, None), sid));
        }

        let context = {
            let sessions = self.lock_sessions()?;
            sessions
                .get(&sid)
                .map(|s| s.context.turns().to_vec())
                .unwrap_or_default()
        };

        let kb = self.knowledge.snapshot();
        let result = self.resolver.resolve(message, &kb, &context);
        let keyword = self.escalation.detect(message);
        let reply = self.composer.compose(result, keyword.as_deref());

        let now = Local::now().timestamp();
        {
            let mut sessions = self.lock_sessions()?;
            if let Some(session) = sessions.get_mut(&sid) {
                session.touch(now);
                session.context.push(message);
                session.pending = (reply.kind == ReplyKind::Ambiguous).then(|| PendingChoices {
                    candidates: reply.candidates.clone(),
                    offered_at: now,
                });
            }
        }

        self.record(sid, message, &reply, now)?;
        debug!(session = %sid, kind = ?reply.kind, "Message handled");
        Ok((reply, sid))
    }

    /// Answer one of the choices offered by the last ambiguous reply.
    pub fn select(&self, session_id: Uuid, key: &str) -> Result<ChatReply, ChatError> {
        let now = Local::now().timestamp();
        let chosen = {
            let mut sessions = self.lock_sessions()?;
            let session = self.live_session(&mut sessions, session_id, now)?;
            let pending = session
                .pending
                .as_ref()
                .ok_or(ChatError::NoPendingChoices(session_id))?;
            let chosen = pending
                .find(key)
                .map(|c| c.key.clone())
                .ok_or_else(|| ChatError::SelectionNotOffered(key.to_string()))?;
            session.pending = None;
            session.touch(now);
            chosen
        };

        let kb = self.knowledge.snapshot();
        let result = match kb.get(&chosen) {
            Some(entry) => ResolutionResult::Answered {
                text: entry.answer.join(self.resolver.config().answer_join),
            },
            None => {
                info!(key = %chosen, "Selected entry no longer exists");
                ResolutionResult::Unknown
            }
        };
        let reply = self.composer.compose(result, None);

        self.record(session_id, &chosen, &reply, now)?;
        Ok(reply)
    }

    /// Decline all offered choices.
    pub fn reject(&self, session_id: Uuid) -> Result<ChatReply, ChatError> {
        let now = Local::now().timestamp();
        {
            let mut sessions = self.lock_sessions()?;
            let session = self.live_session(&mut sessions, session_id, now)?;
            if session.pending.take().is_none() {
                return Err(ChatError::NoPendingChoices(session_id));
            }
            session.touch(now);
        }

        let reply = self.composer.compose(ResolutionResult::Unknown, None);
        self.record(session_id, NONE_OF_THESE, &reply, now)?;
        Ok(reply)
    }

    /// Get a session by ID.
    pub fn get_session(&self, session_id: Uuid) -> Option<ConversationSession> {
        self.sessions
            .lock()
            .ok()
            .and_then(|s| s.get(&session_id).cloned())
    }

    /// List all sessions as summaries.
    pub fn list_sessions(&self) -> Vec<ChatSessionSummary> {
        let sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        sessions
            .values()
            .map(|s| ChatSessionSummary {
                id: s.id,
                started_at: format_epoch(s.started_at),
                last_message_at: format_epoch(s.last_message_at),
                message_count: s.message_count,
                has_pending_choices: s.pending.is_some(),
            })
            .collect()
    }

    /// Delete a session and its history.
    pub fn delete_session(&self, session_id: Uuid) -> Result<(), ChatError> {
        let mut sessions = self.lock_sessions()?;
        if sessions.remove(&session_id).is_some() {
            if let Ok(mut msgs) = self.messages.lock() {
                msgs.remove(&session_id);
            }
            Ok(())
        } else {
            Err(ChatError::SessionNotFound(session_id))
        }
    }

    /// Message history of a session, oldest first.
    pub fn get_history(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, ChatError> {
        if !self.lock_sessions()?.contains_key(&session_id) {
            return Err(ChatError::SessionNotFound(session_id));
        }
        let msgs = self
            .messages
            .lock()
            .map_err(|e| ChatError::StorageError(format!("messages lock poisoned: {}", e)))?;
        Ok(msgs.get(&session_id).cloned().unwrap_or_default())
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, ChatError> {
        let now = Local::now().timestamp();
        let timeout = self.config.session_timeout_minutes;
        let mut sessions = self.lock_sessions()?;
        let expired: Vec<Uuid> = sessions
            .values()
            .filter(|s| s.is_expired(timeout, now))
            .map(|s| s.id)
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        drop(sessions);

        if let Ok(mut msgs) = self.messages.lock() {
            for id in &expired {
                msgs.remove(id);
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Purged expired chat sessions");
        }
        Ok(expired.len())
    }

    // -- Private helpers --

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<Uuid, ConversationSession>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::StorageError(format!("session lock poisoned: {}", e)))
    }

    /// Reuse the requested session if it is still live, otherwise start a
    /// new one.
    fn resolve_session(&self, requested: Option<Uuid>) -> Result<Uuid, ChatError> {
        let now = Local::now().timestamp();
        let mut sessions = self.lock_sessions()?;

        if let Some(sid) = requested {
            if let Some(session) = sessions.get(&sid) {
                if !session.is_expired(self.config.session_timeout_minutes, now) {
                    return Ok(sid);
                }
                debug!(session = %sid, "Session expired, starting a new one");
                sessions.remove(&sid);
            }
        }

        let session = ConversationSession::new(self.resolver.config().context_turns, now);
        let sid = session.id;
        sessions.insert(sid, session);
        Ok(sid)
    }

    /// Look up a session for a follow-up action. Expired sessions are removed
    /// and reported as not found.
    fn live_session<'a>(
        &self,
        sessions: &'a mut HashMap<Uuid, ConversationSession>,
        session_id: Uuid,
        now: i64,
    ) -> Result<&'a mut ConversationSession, ChatError> {
        let expired = sessions
            .get(&session_id)
            .ok_or(ChatError::SessionNotFound(session_id))?
            .is_expired(self.config.session_timeout_minutes, now);
        if expired {
            sessions.remove(&session_id);
            return Err(ChatError::SessionNotFound(session_id));
        }
        sessions
            .get_mut(&session_id)
            .ok_or(ChatError::SessionNotFound(session_id))
    }

    fn record(
        &self,
        session_id: Uuid,
        user_text: &str,
        reply: &ChatReply,
        now: i64,
    ) -> Result<(), ChatError> {
        let mut msgs = self
            .messages
            .lock()
            .map_err(|e| ChatError::StorageError(format!("messages lock poisoned: {}", e)))?;
        let history = msgs.entry(session_id).or_default();
        history.push(ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            role: ChatRole::User,
            content: user_text.to_string(),
            created_at: now,
        });
        history.push(ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            role: ChatRole::Assistant,
            content: ResponseComposer::render_terminal(reply),
            created_at: now,
        });

        let limit = self.config.history_limit;
        if history.len() > limit {
            let excess = history.len() - limit;
            history.drain(..excess);
        }
        Ok(())
    }
}

/// Format epoch seconds as an RFC 3339 string.
fn format_epoch(epoch: i64) -> String {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|dt: DateTime<Local>| dt.to_rfc3339())
        .unwrap_or_else(|| epoch.to_string())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::types::{KnowledgeBase, KnowledgeEntry, TicketPriority};
    use std::sync::RwLock;

    use crate::response::{CLARIFY_PROMPT, UNKNOWN_ANSWER};

    /// Knowledge source whose contents can be swapped mid-test.
    struct SwappableKnowledge(RwLock<Arc<KnowledgeBase>>);

    impl KnowledgeSource for SwappableKnowledge {
        fn snapshot(&self) -> Arc<KnowledgeBase> {
            Arc::clone(&self.0.read().unwrap())
        }
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(vec![
            KnowledgeEntry::new("reset password", "Go to settings > reset."),
            KnowledgeEntry::new("change email", "Go to profile > email."),
            KnowledgeEntry::new(
                "vpn setup",
                vec!["Step 1.".to_string(), "Step 2.".to_string()],
            ),
        ])
        .unwrap()
    }

    fn orchestrator_with(config: HelpdeskConfig) -> ChatOrchestrator {
        ChatOrchestrator::new(&config, Arc::new(Arc::new(kb()))).unwrap()
    }

    fn orchestrator() -> ChatOrchestrator {
        orchestrator_with(HelpdeskConfig::default())
    }

    fn ambiguous_session(orch: &ChatOrchestrator) -> Uuid {
        let (reply, sid) = orch.handle_message("reset email", None).unwrap();
        assert_eq!(reply.kind, ReplyKind::Ambiguous);
        sid
    }

    fn expire(orch: &ChatOrchestrator, sid: Uuid) {
        let mut sessions = orch.sessions.lock().unwrap();
        sessions.get_mut(&sid).unwrap().last_message_at -= 31 * 60;
    }

    // ---- Construction and validation ----

    #[test]
    fn test_new_orchestrator() {
        let orch = orchestrator();
        assert!(orch.list_sessions().is_empty());
    }

    #[test]
    fn test_disabled_returns_error() {
        let mut config = HelpdeskConfig::default();
        config.chat.enabled = false;
        let orch = orchestrator_with(config);
        assert!(matches!(
            orch.handle_message("hello", None),
            Err(ChatError::Disabled)
        ));
    }

    #[test]
    fn test_message_too_long_returns_error() {
        let orch = orchestrator();
        let long_msg = "a".repeat(2001);
        assert!(matches!(
            orch.handle_message(&long_msg, None),
            Err(ChatError::MessageTooLong(2000))
        ));
        assert!(orch.handle_message(&"a".repeat(2000), None).is_ok());
    }

    #[test]
    fn test_empty_message_is_unknown_without_context() {
        let orch = orchestrator();
        let (reply, sid) = orch.handle_message("   ", None).unwrap();
        assert_eq!(reply.kind, ReplyKind::Unknown);
        assert_eq!(reply.text, UNKNOWN_ANSWER);
        let session = orch.get_session(sid).unwrap();
        assert!(session.context.is_empty());
        assert_eq!(session.message_count, 0);
    }

    // ---- Basic message handling ----

    #[test]
    fn test_answered_message() {
        let orch = orchestrator();
        let (reply, sid) = orch.handle_message("reset my password", None).unwrap();
        assert_eq!(reply.kind, ReplyKind::Answered);
        assert_eq!(reply.text, "Go to settings > reset.");
        assert!(reply.escalation.is_none());
        assert_eq!(orch.get_session(sid).unwrap().message_count, 1);
    }

    #[test]
    fn test_list_answer_uses_newline_by_default() {
        let orch = orchestrator();
        let (reply, _) = orch.handle_message("vpn setup", None).unwrap();
        assert_eq!(reply.text, "Step 1.\nStep 2.");
    }

    #[test]
    fn test_unknown_message_suggests_ticket() {
        let orch = orchestrator();
        let (reply, _) = orch.handle_message("qqqq", None).unwrap();
        assert_eq!(reply.kind, ReplyKind::Unknown);
        assert_eq!(reply.escalation.unwrap().priority, TicketPriority::Medium);
    }

    #[test]
    fn test_urgent_message_escalates() {
        let orch = orchestrator();
        let (reply, _) = orch.handle_message("my server is down urgent", None).unwrap();
        assert_eq!(reply.kind, ReplyKind::Unknown);
        let hint = reply.escalation.unwrap();
        assert_eq!(hint.priority, TicketPriority::High);
        assert!(hint.reason.contains("down"));
    }

    // ---- Sessions ----

    #[test]
    fn test_same_session_id_reuses_session() {
        let orch = orchestrator();
        let (_, sid1) = orch.handle_message("reset password", None).unwrap();
        let (_, sid2) = orch.handle_message("change email", Some(sid1)).unwrap();
        assert_eq!(sid1, sid2);
        assert_eq!(orch.list_sessions().len(), 1);
        assert_eq!(orch.get_session(sid1).unwrap().message_count, 2);
    }

    #[test]
    fn test_unknown_session_id_creates_new() {
        let orch = orchestrator();
        let fake_sid = Uuid::new_v4();
        let (_, sid) = orch.handle_message("reset password", Some(fake_sid)).unwrap();
        assert_ne!(sid, fake_sid);
    }

    #[test]
    fn test_expired_session_is_replaced() {
        let orch = orchestrator();
        let sid = ambiguous_session(&orch);
        expire(&orch, sid);

        let (_, new_sid) = orch.handle_message("reset password", Some(sid)).unwrap();
        assert_ne!(new_sid, sid);
        assert!(orch.get_session(sid).is_none());
    }

    #[test]
    fn test_context_carries_follow_up() {
        let orch = orchestrator();
        let (reply, sid) = orch.handle_message("what about it", None).unwrap();
        assert_eq!(reply.kind, ReplyKind::Unknown);

        let orch = orchestrator();
        let (_, sid2) = orch.handle_message("how do i reset my password", None).unwrap();
        let (reply, _) = orch.handle_message("what about it", Some(sid2)).unwrap();
        assert_eq!(reply.kind, ReplyKind::Answered);
        assert_eq!(reply.text, "Go to settings > reset.");
        assert_ne!(sid, sid2);
    }

    #[test]
    fn test_each_turn_answers_its_own_question() {
        let orch = orchestrator();
        let (reply, sid) = orch.handle_message("reset password", None).unwrap();
        assert_eq!(reply.text, "Go to settings > reset.");

        let (reply, _) = orch.handle_message("change email", Some(sid)).unwrap();
        assert_eq!(reply.kind, ReplyKind::Answered);
        assert_eq!(reply.text, "Go to profile > email.");

        let (reply, _) = orch.handle_message("vpn setup", Some(sid)).unwrap();
        assert_eq!(reply.kind, ReplyKind::Answered);
        assert_eq!(reply.text, "Step 1.\nStep 2.");
    }

    #[test]
    fn test_context_is_bounded() {
        let orch = orchestrator();
        let (_, sid) = orch.handle_message("one", None).unwrap();
        orch.handle_message("two", Some(sid)).unwrap();
        orch.handle_message("three", Some(sid)).unwrap();
        let session = orch.get_session(sid).unwrap();
        assert_eq!(
            session.context.turns(),
            &["two".to_string(), "three".to_string()]
        );
    }

    #[test]
    fn test_delete_session() {
        let orch = orchestrator();
        let (_, sid) = orch.handle_message("reset password", None).unwrap();
        orch.delete_session(sid).unwrap();
        assert!(orch.get_session(sid).is_none());
        assert!(matches!(
            orch.delete_session(sid),
            Err(ChatError::SessionNotFound(_))
        ));
        assert!(matches!(
            orch.get_history(sid),
            Err(ChatError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_purge_expired() {
        let orch = orchestrator();
        let (_, keep) = orch.handle_message("reset password", None).unwrap();
        let (_, old) = orch.handle_message("change email", None).unwrap();
        expire(&orch, old);

        assert_eq!(orch.purge_expired().unwrap(), 1);
        assert!(orch.get_session(keep).is_some());
        assert!(orch.get_session(old).is_none());
    }

    // ---- Disambiguation ----

    #[test]
    fn test_ambiguous_sets_pending() {
        let orch = orchestrator();
        let (reply, sid) = orch.handle_message("reset email", None).unwrap();
        assert_eq!(reply.text, CLARIFY_PROMPT);
        assert_eq!(reply.candidates.len(), 3);
        let pending = orch.get_session(sid).unwrap().pending.unwrap();
        assert_eq!(pending.candidates, reply.candidates);
        assert!(orch.list_sessions()[0].has_pending_choices);
    }

    #[test]
    fn test_select_answers_and_clears_pending() {
        let orch = orchestrator();
        let sid = ambiguous_session(&orch);
        let reply = orch.select(sid, "change email").unwrap();
        assert_eq!(reply.kind, ReplyKind::Answered);
        assert_eq!(reply.text, "Go to profile > email.");
        assert!(orch.get_session(sid).unwrap().pending.is_none());
        assert!(matches!(
            orch.select(sid, "change email"),
            Err(ChatError::NoPendingChoices(_))
        ));
    }

    #[test]
    fn test_select_unoffered_key_keeps_pending() {
        let orch = orchestrator_with({
            let mut config = HelpdeskConfig::default();
            config.resolver.max_candidates = 2;
            config
        });
        let sid = ambiguous_session(&orch);
        assert!(matches!(
            orch.select(sid, "vpn setup"),
            Err(ChatError::SelectionNotOffered(_))
        ));
        assert!(orch.get_session(sid).unwrap().pending.is_some());
    }

    #[test]
    fn test_select_is_case_insensitive() {
        let orch = orchestrator();
        let sid = ambiguous_session(&orch);
        let reply = orch.select(sid, "RESET PASSWORD").unwrap();
        assert_eq!(reply.text, "Go to settings > reset.");
    }

    #[test]
    fn test_select_removed_entry_is_unknown() {
        let source = Arc::new(SwappableKnowledge(RwLock::new(Arc::new(kb()))));
        let orch = ChatOrchestrator::new(&HelpdeskConfig::default(), source.clone()).unwrap();
        let sid = ambiguous_session(&orch);

        let remaining = KnowledgeBase::new(vec![KnowledgeEntry::new(
            "reset password",
            "Go to settings > reset.",
        )])
        .unwrap();
        *source.0.write().unwrap() = Arc::new(remaining);

        let reply = orch.select(sid, "change email").unwrap();
        assert_eq!(reply.kind, ReplyKind::Unknown);
    }

    #[test]
    fn test_reject_clears_pending() {
        let orch = orchestrator();
        let sid = ambiguous_session(&orch);
        let reply = orch.reject(sid).unwrap();
        assert_eq!(reply.kind, ReplyKind::Unknown);
        assert!(reply.escalation.is_some());
        assert!(orch.get_session(sid).unwrap().pending.is_none());
        assert!(matches!(
            orch.reject(sid),
            Err(ChatError::NoPendingChoices(_))
        ));
    }

    #[test]
    fn test_new_query_supersedes_pending() {
        let orch = orchestrator();
        let sid = ambiguous_session(&orch);
        let (reply, _) = orch.handle_message("reset password", Some(sid)).unwrap();
        assert_eq!(reply.kind, ReplyKind::Answered);
        assert!(orch.get_session(sid).unwrap().pending.is_none());
    }

    #[test]
    fn test_select_on_expired_session_fails() {
        let orch = orchestrator();
        let sid = ambiguous_session(&orch);
        expire(&orch, sid);
        assert!(matches!(
            orch.select(sid, "change email"),
            Err(ChatError::SessionNotFound(_))
        ));
        assert!(orch.get_session(sid).is_none());
    }

    #[test]
    fn test_select_unknown_session() {
        let orch = orchestrator();
        assert!(matches!(
            orch.select(Uuid::new_v4(), "reset password"),
            Err(ChatError::SessionNotFound(_))
        ));
    }

    // ---- History ----

    #[test]
    fn test_history_records_both_roles() {
        let orch = orchestrator();
        let sid = ambiguous_session(&orch);
        orch.select(sid, "reset password").unwrap();

        let history = orch.get_history(sid).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "reset email");
        assert!(history[1].content.contains("1. reset password (confidence: 58)"));
        assert_eq!(history[2].content, "reset password");
        assert_eq!(history[3].content, "Go to settings > reset.");
    }

    #[test]
    fn test_history_is_bounded() {
        let mut config = HelpdeskConfig::default();
        config.chat.history_limit = 4;
        let orch = orchestrator_with(config);
        let (_, sid) = orch.handle_message("one", None).unwrap();
        orch.handle_message("two", Some(sid)).unwrap();
        orch.handle_message("three", Some(sid)).unwrap();

        let history = orch.get_history(sid).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "two");
    }
}
