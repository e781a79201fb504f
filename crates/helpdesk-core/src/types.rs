//! Shared domain types: knowledge base, resolution results and tickets.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{HelpdeskError, Result};

// =============================================================================
// Knowledge base
// =============================================================================

/// Separator used when a list-valued answer is rendered as one string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerJoin {
    Space,
    #[default]
    Newline,
}

impl AnswerJoin {
    pub fn separator(self) -> &'static str {
        match self {
            AnswerJoin::Space => " ",
            AnswerJoin::Newline => "\n",
        }
    }
}

/// The answer stored for a knowledge-base question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerPayload {
    /// A single answer string, displayed as-is.
    Text(String),
    /// Ordered steps, joined with the caller's separator for display.
    Steps(Vec<String>),
}

impl AnswerPayload {
    /// Render the payload for display.
    pub fn join(&self, join: AnswerJoin) -> String {
        match self {
            AnswerPayload::Text(text) => text.clone(),
            AnswerPayload::Steps(steps) => steps.join(join.separator()),
        }
    }

    /// True when the payload carries no displayable text.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerPayload::Text(text) => text.trim().is_empty(),
            AnswerPayload::Steps(steps) => steps.iter().all(|s| s.trim().is_empty()),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        let payload = match value {
            Value::String(text) => AnswerPayload::Text(text.clone()),
            Value::Array(items) => AnswerPayload::Steps(
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()?,
            ),
            _ => return None,
        };
        (!payload.is_blank()).then_some(payload)
    }
}

impl From<&str> for AnswerPayload {
    fn from(text: &str) -> Self {
        AnswerPayload::Text(text.to_string())
    }
}

impl From<String> for AnswerPayload {
    fn from(text: String) -> Self {
        AnswerPayload::Text(text)
    }
}

impl From<Vec<String>> for AnswerPayload {
    fn from(steps: Vec<String>) -> Self {
        AnswerPayload::Steps(steps)
    }
}

/// One question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub question: String,
    pub answer: AnswerPayload,
}

impl KnowledgeEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<AnswerPayload>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Case-insensitive comparison form of a knowledge-base key.
pub fn comparison_key(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Validated, ordered knowledge base.
///
/// Keys are unique under [`comparison_key`] and every entry has a non-blank
/// answer. Entry order is the order of the source JSON object, which the
/// resolver relies on for deterministic tie-breaking.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
    index: HashMap<String, usize>,
}

impl PartialEq for KnowledgeBase {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl KnowledgeBase {
    /// Build a knowledge base, rejecting blank or duplicate entries.
    pub fn new(entries: Vec<KnowledgeEntry>) -> Result<Self> {
        let mut kb = Self::default();
        for entry in entries {
            kb.push(entry)?;
        }
        Ok(kb)
    }

    /// Parse the on-disk JSON shape, dropping malformed entries.
    ///
    /// Returns the knowledge base and the questions that were skipped. Fails
    /// only when the top-level value is not a JSON object.
    pub fn from_json_value(value: &Value) -> Result<(Self, Vec<String>)> {
        let object = top_level_object(value)?;
        let mut kb = Self::default();
        let mut skipped = Vec::new();

        for (question, raw) in object {
            if let Err(e) = parse_entry(question, raw).and_then(|entry| kb.push(entry)) {
                warn!(question = %question, error = %e, "Skipping malformed knowledge entry");
                skipped.push(question.clone());
            }
        }

        Ok((kb, skipped))
    }

    /// Parse the on-disk JSON shape, failing on the first malformed entry.
    pub fn from_json_value_strict(value: &Value) -> Result<Self> {
        let object = top_level_object(value)?;
        let mut kb = Self::default();

        for (question, raw) in object {
            parse_entry(question, raw)
                .and_then(|entry| kb.push(entry))
                .map_err(|e| match e {
                    HelpdeskError::InvalidKnowledgeBase(_) => e,
                    other => HelpdeskError::InvalidKnowledgeBase(other.to_string()),
                })?;
        }

        Ok(kb)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.question.as_str())
    }

    /// Look up an entry by question, ignoring case and surrounding whitespace.
    pub fn get(&self, question: &str) -> Option<&KnowledgeEntry> {
        self.position(question).map(|i| &self.entries[i])
    }

    pub fn contains(&self, question: &str) -> bool {
        self.position(question).is_some()
    }

    pub fn position(&self, question: &str) -> Option<usize> {
        self.index.get(&comparison_key(question)).copied()
    }

    pub fn into_entries(self) -> Vec<KnowledgeEntry> {
        self.entries
    }

    fn push(&mut self, entry: KnowledgeEntry) -> Result<()> {
        if entry.question.trim().is_empty() {
            return Err(HelpdeskError::InvalidKnowledgeBase(
                "entry with an empty question".to_string(),
            ));
        }
        if entry.answer.is_blank() {
            return Err(HelpdeskError::InvalidKnowledgeBase(format!(
                "entry '{}' has an empty answer",
                entry.question
            )));
        }
        let key = comparison_key(&entry.question);
        if self.index.contains_key(&key) {
            return Err(HelpdeskError::DuplicateEntry(entry.question));
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }
}

/// Read access to the current knowledge base.
///
/// Implementors hand out immutable snapshots; a snapshot stays valid while
/// the administrative path swaps in a newer version.
pub trait KnowledgeSource: Send + Sync {
    fn snapshot(&self) -> Arc<KnowledgeBase>;
}

impl KnowledgeSource for Arc<KnowledgeBase> {
    fn snapshot(&self) -> Arc<KnowledgeBase> {
        Arc::clone(self)
    }
}

fn top_level_object(value: &Value) -> Result<&Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        HelpdeskError::InvalidKnowledgeBase("top-level value must be a JSON object".to_string())
    })
}

fn parse_entry(question: &str, raw: &Value) -> Result<KnowledgeEntry> {
    let answer = raw.get("answer").ok_or_else(|| {
        HelpdeskError::InvalidKnowledgeBase(format!("entry '{}' has no answer field", question))
    })?;
    let payload = AnswerPayload::from_json(answer).ok_or_else(|| {
        HelpdeskError::InvalidKnowledgeBase(format!(
            "entry '{}' has an empty or non-text answer",
            question
        ))
    })?;
    Ok(KnowledgeEntry::new(question, payload))
}

// =============================================================================
// Resolution
// =============================================================================

/// A knowledge-base key offered for disambiguation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub key: String,
    /// Similarity in `[0, 100]`.
    pub score: u8,
}

/// Outcome of resolving one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionResult {
    /// Confident match; `text` is the rendered answer payload.
    Answered { text: String },
    /// Candidates ordered by descending score.
    Ambiguous { candidates: Vec<Candidate> },
    Unknown,
}

impl ResolutionResult {
    pub fn is_answered(&self) -> bool {
        matches!(self, ResolutionResult::Answered { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ResolutionResult::Unknown)
    }
}

// =============================================================================
// Tickets
// =============================================================================

/// Timestamp format of the ticket CSV file.
pub const TICKET_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [
        TicketPriority::Low,
        TicketPriority::Medium,
        TicketPriority::High,
        TicketPriority::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TicketPriority::Low => "Low",
            TicketPriority::Medium => "Medium",
            TicketPriority::High => "High",
            TicketPriority::Critical => "Critical",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| HelpdeskError::Validation(format!("unknown ticket priority '{}'", s)))
    }
}

/// Ticket status. Labels other than open/closed are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TicketStatus {
    #[default]
    Open,
    Closed,
    Other(String),
}

impl TicketStatus {
    pub fn label(&self) -> &str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::Closed => "Closed",
            TicketStatus::Other(label) => label,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TicketStatus::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TicketStatus::Closed)
    }
}

impl From<String> for TicketStatus {
    fn from(label: String) -> Self {
        TicketStatus::from(label.as_str())
    }
}

impl From<&str> for TicketStatus {
    fn from(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() || label.eq_ignore_ascii_case("open") {
            TicketStatus::Open
        } else if label.eq_ignore_ascii_case("closed") {
            TicketStatus::Closed
        } else {
            TicketStatus::Other(label.to_string())
        }
    }
}

impl From<TicketStatus> for String {
    fn from(status: TicketStatus) -> Self {
        status.label().to_string()
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the ticket store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// `None` when the stored timestamp could not be parsed.
    pub timestamp: Option<NaiveDateTime>,
    pub name: String,
    pub issue: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
}
