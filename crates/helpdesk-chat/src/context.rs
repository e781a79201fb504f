//! Conversation context: a rolling window of recent user queries.

use serde::{Deserialize, Serialize};

/// The last few user queries of a session, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    turns: Vec<String>,
    capacity: usize,
}

impl ConversationContext {
    /// A context keeping at most `capacity` turns. 0 keeps nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a user query. Blank queries are ignored.
    pub fn push(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() || self.capacity == 0 {
            return;
        }
        self.turns.push(query.to_string());
        while self.turns.len() > self.capacity {
            self.turns.remove(0);
        }
    }

    pub fn turns(&self) -> &[String] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Prepend up to `max_turns` of the most recent context entries to `query`.
pub fn augment_query(query: &str, context: &[String], max_turns: usize) -> String {
    let query = query.trim();
    let start = context.len().saturating_sub(max_turns);
    let prefix: Vec<&str> = context[start..]
        .iter()
        .map(|turn| turn.trim())
        .filter(|turn| !turn.is_empty())
        .collect();

    if prefix.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", prefix.join(" "), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_last_turns() {
        let mut ctx = ConversationContext::new(2);
        ctx.push("one");
        ctx.push("two");
        ctx.push("three");
        assert_eq!(ctx.turns(), &["two".to_string(), "three".to_string()]);
    }

    #[test]
    fn test_push_ignores_blank() {
        let mut ctx = ConversationContext::new(2);
        ctx.push("   ");
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut ctx = ConversationContext::new(0);
        ctx.push("reset password");
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut ctx = ConversationContext::new(2);
        ctx.push("one");
        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_augment_with_empty_context_is_query() {
        assert_eq!(augment_query("  what about it ", &[], 2), "what about it");
    }

    #[test]
    fn test_augment_prepends_recent_turns() {
        let context = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        assert_eq!(augment_query("now", &context, 2), "second third now");
        assert_eq!(augment_query("now", &context, 5), "first second third now");
        assert_eq!(augment_query("now", &context, 0), "now");
    }
}
