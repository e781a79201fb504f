//! Terminal chat loop.
//!
//! Numbered choices answer an ambiguous reply, `0` declines them, anything
//! else is a new question. A failed turn is reported and the loop carries on.

use std::io::{self, BufRead, Write};

use helpdesk_chat::{ChatError, ChatOrchestrator, ChatReply, ReplyKind, ResponseComposer};
use helpdesk_core::types::TicketPriority;
use helpdesk_storage::{NewTicket, TicketStore};
use tracing::warn;
use uuid::Uuid;

pub struct ChatRepl {
    orchestrator: ChatOrchestrator,
    tickets: TicketStore,
    session: Option<Uuid>,
    offered: Option<ChatReply>,
    /// Last free-text question, used as the ticket issue.
    last_question: Option<String>,
}

enum Choice {
    Select(String),
    Reject,
}

impl ChatRepl {
    pub fn new(orchestrator: ChatOrchestrator, tickets: TicketStore) -> Self {
        Self {
            orchestrator,
            tickets,
            session: None,
            offered: None,
            last_question: None,
        }
    }

    /// Read lines from `input` until EOF or `quit`.
    pub fn run<B: BufRead, W: Write>(&mut self, input: B, out: &mut W) -> io::Result<()> {
        let mut lines = input.lines();
        writeln!(out, "Ask a question (type 'quit' to leave).")?;
        loop {
            let Some(line) = prompt(&mut lines, out, "You: ")? else {
                break;
            };
            let input = line.trim();
            if matches!(input, "quit" | "exit") {
                break;
            }

            let reply = match self.turn(input) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "Chat turn failed");
                    writeln!(out, "Sorry, that did not work: {}", e)?;
                    continue;
                }
            };

            writeln!(out, "{}", ResponseComposer::render_terminal(&reply))?;
            if let Some(hint) = &reply.escalation {
                self.offer_ticket(hint.priority, &mut lines, out)?;
            }
            self.offered = (reply.kind == ReplyKind::Ambiguous).then_some(reply);
        }
        Ok(())
    }

    fn turn(&mut self, input: &str) -> Result<ChatReply, ChatError> {
        let choice = self
            .offered
            .as_ref()
            .and_then(|reply| pick_choice(reply, input));
        let result = match (choice, self.session) {
            (Some(Choice::Reject), Some(sid)) => self.orchestrator.reject(sid),
            (Some(Choice::Select(key)), Some(sid)) => self.orchestrator.select(sid, &key),
            _ => match self.orchestrator.handle_message(input, self.session) {
                Ok((reply, sid)) => {
                    self.session = Some(sid);
                    self.last_question = Some(input.to_string());
                    Ok(reply)
                }
                Err(e) => Err(e),
            },
        };

        if let Err(ChatError::SessionNotFound(_)) = &result {
            self.session = None;
            self.offered = None;
        }
        result
    }

    fn offer_ticket<B: BufRead, W: Write>(
        &self,
        priority: TicketPriority,
        lines: &mut io::Lines<B>,
        out: &mut W,
    ) -> io::Result<()> {
        let answer = prompt(lines, out, "Raise a ticket? [y/N]: ")?.unwrap_or_default();
        if !answer.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
        let name = prompt(lines, out, "Your name (blank for Guest): ")?.unwrap_or_default();
        let ticket = NewTicket {
            name,
            issue: self.last_question.clone().unwrap_or_default(),
            priority,
        };
        match self.tickets.append(ticket) {
            Ok(ticket) => writeln!(out, "Ticket submitted with {} priority.", ticket.priority),
            Err(e) => {
                warn!(error = %e, "Ticket not submitted");
                writeln!(out, "Ticket not submitted: {}", e)
            }
        }
    }
}

/// Map a numeric answer onto the choices of `reply`.
fn pick_choice(reply: &ChatReply, input: &str) -> Option<Choice> {
    match input.parse::<usize>().ok()? {
        0 => Some(Choice::Reject),
        n => reply
            .candidates
            .get(n - 1)
            .map(|c| Choice::Select(c.key.clone())),
    }
}

fn prompt<B: BufRead, W: Write>(
    lines: &mut io::Lines<B>,
    out: &mut W,
    label: &str,
) -> io::Result<Option<String>> {
    write!(out, "{}", label)?;
    out.flush()?;
    lines.next().transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use helpdesk_core::config::HelpdeskConfig;
    use helpdesk_core::types::{KnowledgeBase, KnowledgeEntry};
    use tempfile::TempDir;

    fn repl_with(config: HelpdeskConfig, dir: &TempDir) -> ChatRepl {
        let kb = KnowledgeBase::new(vec![
            KnowledgeEntry::new("reset password", "Go to settings > reset."),
            KnowledgeEntry::new("change email", "Go to profile > email."),
            KnowledgeEntry::new(
                "vpn setup",
                vec!["Step 1.".to_string(), "Step 2.".to_string()],
            ),
        ])
        .unwrap();
        let orchestrator = ChatOrchestrator::new(&config, Arc::new(Arc::new(kb))).unwrap();
        ChatRepl::new(orchestrator, TicketStore::open(&dir.path().join("tickets.csv")))
    }

    fn run(repl: &mut ChatRepl, script: &str) -> String {
        let mut out = Vec::new();
        repl.run(Cursor::new(script.to_string()), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_declined_choices_file_ticket_for_the_question() {
        let dir = TempDir::new().unwrap();
        let mut repl = repl_with(HelpdeskConfig::default(), &dir);

        let output = run(&mut repl, "reset email\n0\ny\nAlice\nquit\n");
        assert!(output.contains("Ticket submitted with Medium priority."));

        let tickets = repl.tickets.list().unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].issue, "reset email");
        assert_eq!(tickets[0].name, "Alice");
        assert_eq!(tickets[0].priority, TicketPriority::Medium);
    }

    #[test]
    fn test_overlong_message_keeps_chat_running() {
        let dir = TempDir::new().unwrap();
        let mut config = HelpdeskConfig::default();
        config.chat.max_message_length = 20;
        let mut repl = repl_with(config, &dir);

        let output = run(&mut repl, "this message is far too long to accept\nvpn setup\n");
        assert!(output.contains("maximum length of 20 characters"));
        assert!(output.contains("Step 1.\nStep 2."));
    }

    #[test]
    fn test_blank_ticket_issue_keeps_chat_running() {
        let dir = TempDir::new().unwrap();
        let mut repl = repl_with(HelpdeskConfig::default(), &dir);

        let output = run(&mut repl, "\ny\n\nvpn setup\n");
        assert!(output.contains("Ticket not submitted"));
        assert!(output.contains("Step 1.\nStep 2."));
        assert!(repl.tickets.list().unwrap().is_empty());
    }

    #[test]
    fn test_choice_for_ended_session_keeps_chat_running() {
        let dir = TempDir::new().unwrap();
        let mut repl = repl_with(HelpdeskConfig::default(), &dir);

        let output = run(&mut repl, "reset email\n");
        assert!(output.contains("0. None of these"));
        let sid = repl.session.unwrap();
        repl.orchestrator.delete_session(sid).unwrap();

        let output = run(&mut repl, "1\nvpn setup\n");
        assert!(output.contains("session not found"));
        assert!(output.contains("Step 1.\nStep 2."));
        assert_ne!(repl.session, Some(sid));
    }
}
