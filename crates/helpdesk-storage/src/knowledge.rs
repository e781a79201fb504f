//! Knowledge-base store and editor.
//!
//! The knowledge base lives in a JSON file of `{"question": {"answer": ...}}`
//! entries. Readers take cheap [`Arc`] snapshots. Edits are applied to the
//! raw JSON document, so entries the loader skipped and fields other than
//! `answer` survive; the file is backed up, atomically replaced and the
//! shared snapshot swapped.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Local;
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::types::{
    comparison_key, AnswerPayload, KnowledgeBase, KnowledgeEntry, KnowledgeSource,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::atomic::replace_file;

/// File-backed knowledge base with copy-on-write edits.
pub struct KnowledgeStore {
    path: PathBuf,
    backup_on_write: bool,
    current: RwLock<Arc<KnowledgeBase>>,
    /// The document as last read or written. Holding the lock serializes
    /// edits so two writers never interleave read-modify-write.
    document: Mutex<Map<String, Value>>,
}

impl KnowledgeStore {
    /// Open the store at `path`. A missing file is an empty knowledge base;
    /// malformed entries are skipped with a warning.
    pub fn open(path: &Path, backup_on_write: bool) -> Result<Self> {
        let document = read_document(path)?;
        let (kb, _) = KnowledgeBase::from_json_value(&Value::Object(document.clone()))?;
        info!(path = %path.display(), entries = kb.len(), "Knowledge base loaded");
        Ok(Self {
            path: path.to_path_buf(),
            backup_on_write,
            current: RwLock::new(Arc::new(kb)),
            document: Mutex::new(document),
        })
    }

    pub fn from_config(config: &HelpdeskConfig) -> Result<Self> {
        Self::open(&config.knowledge_path(), config.knowledge.backup_on_write)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current knowledge base.
    pub fn snapshot(&self) -> Arc<KnowledgeBase> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Re-read the file, returning the questions that were skipped as
    /// malformed.
    pub fn reload(&self) -> Result<Vec<String>> {
        let mut document = self.lock_document()?;
        let fresh = read_document(&self.path)?;
        let (kb, skipped) = KnowledgeBase::from_json_value(&Value::Object(fresh.clone()))?;
        info!(entries = kb.len(), skipped = skipped.len(), "Knowledge base reloaded");
        *document = fresh;
        self.swap(kb)?;
        Ok(skipped)
    }

    /// Entries whose question contains `filter`, ignoring case. An empty
    /// filter returns every entry.
    pub fn search(&self, filter: &str) -> Vec<KnowledgeEntry> {
        let needle = filter.trim().to_lowercase();
        self.snapshot()
            .entries()
            .iter()
            .filter(|e| needle.is_empty() || e.question.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Append a new entry. A skipped entry stored under the same question is
    /// replaced in place.
    pub fn add(&self, question: &str, answer: AnswerPayload) -> Result<KnowledgeEntry> {
        let entry = validated_entry(question, answer)?;
        let mut document = self.lock_document()?;
        if self.snapshot().contains(&entry.question) {
            return Err(HelpdeskError::DuplicateEntry(entry.question));
        }

        let mut edited = document.clone();
        match raw_key(&edited, &entry.question) {
            Some(existing) => edited = rekey(edited, &existing, &entry)?,
            None => {
                edited.insert(entry.question.clone(), entry_value(None, &entry.answer)?);
            }
        }
        self.commit(&mut document, edited)?;
        info!(question = %entry.question, "Knowledge entry added");
        Ok(entry)
    }

    /// Replace the entry stored under `key`. Renaming keeps the entry's
    /// position and any extra fields it carries.
    pub fn update(
        &self,
        key: &str,
        question: &str,
        answer: AnswerPayload,
    ) -> Result<KnowledgeEntry> {
        let entry = validated_entry(question, answer)?;
        let mut document = self.lock_document()?;
        let current = self.snapshot();
        let position = current
            .position(key)
            .ok_or_else(|| HelpdeskError::EntryNotFound(key.to_string()))?;
        if let Some(other) = current.position(&entry.question) {
            if other != position {
                return Err(HelpdeskError::DuplicateEntry(entry.question));
            }
        }

        let mut edited = document.clone();
        // a skipped entry already holding the new name gives way to the rename
        if comparison_key(key) != comparison_key(&entry.question) {
            if let Some(shadowed) = raw_key(&edited, &entry.question) {
                edited = without(edited, &shadowed);
            }
        }
        let existing = raw_key(&edited, key)
            .ok_or_else(|| HelpdeskError::EntryNotFound(key.to_string()))?;
        let edited = rekey(edited, &existing, &entry)?;
        self.commit(&mut document, edited)?;
        info!(key = %key, question = %entry.question, "Knowledge entry updated");
        Ok(entry)
    }

    /// Remove the entry stored under `key` and return it.
    pub fn delete(&self, key: &str) -> Result<KnowledgeEntry> {
        let mut document = self.lock_document()?;
        let removed = self
            .snapshot()
            .get(key)
            .cloned()
            .ok_or_else(|| HelpdeskError::EntryNotFound(key.to_string()))?;
        let existing = raw_key(&document, key)
            .ok_or_else(|| HelpdeskError::EntryNotFound(key.to_string()))?;

        let edited = without(document.clone(), &existing);
        self.commit(&mut document, edited)?;
        info!(question = %removed.question, "Knowledge entry deleted");
        Ok(removed)
    }

    /// Copy the current file to `<stem>_backup_<YYYYmmdd_HHMMSS>.json`, adding
    /// a counter when that name is taken. Returns `None` when there is no file
    /// to back up.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut target = backup_path(&self.path, &stamp);
        let mut counter = 1;
        while target.exists() {
            target = backup_path(&self.path, &format!("{}_{}", stamp, counter));
            counter += 1;
        }
        std::fs::copy(&self.path, &target)?;
        info!(backup = %target.display(), "Knowledge base backed up");
        Ok(Some(target))
    }

    fn commit(&self, document: &mut Map<String, Value>, edited: Map<String, Value>) -> Result<()> {
        let value = Value::Object(edited);
        let (kb, _) = KnowledgeBase::from_json_value(&value)?;
        if self.backup_on_write {
            self.backup()?;
        }
        replace_file(&self.path, |w| Ok(serde_json::to_writer_pretty(w, &value)?))?;
        if let Value::Object(edited) = value {
            *document = edited;
        }
        self.swap(kb)
    }

    fn swap(&self, kb: KnowledgeBase) -> Result<()> {
        let mut current = self
            .current
            .write()
            .map_err(|e| HelpdeskError::Storage(format!("knowledge lock poisoned: {}", e)))?;
        *current = Arc::new(kb);
        Ok(())
    }

    fn lock_document(&self) -> Result<MutexGuard<'_, Map<String, Value>>> {
        self.document
            .lock()
            .map_err(|e| HelpdeskError::Storage(format!("knowledge write lock poisoned: {}", e)))
    }
}

impl KnowledgeSource for KnowledgeStore {
    fn snapshot(&self) -> Arc<KnowledgeBase> {
        KnowledgeStore::snapshot(self)
    }
}

fn read_document(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        warn!(path = %path.display(), "Knowledge base file not found, starting empty");
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| HelpdeskError::InvalidKnowledgeBase(format!("{}: {}", path.display(), e)))?;
    match value {
        Value::Object(document) => Ok(document),
        _ => Err(HelpdeskError::InvalidKnowledgeBase(format!(
            "{}: top-level value must be a JSON object",
            path.display()
        ))),
    }
}

/// The document key matching `question` case-insensitively.
fn raw_key(document: &Map<String, Value>, question: &str) -> Option<String> {
    let wanted = comparison_key(question);
    document
        .keys()
        .find(|k| comparison_key(k) == wanted)
        .cloned()
}

/// The stored value for an entry: `existing` with its `answer` replaced, or a
/// fresh `{"answer": ...}` object.
fn entry_value(existing: Option<&Value>, answer: &AnswerPayload) -> Result<Value> {
    let answer = serde_json::to_value(answer)?;
    let mut body = match existing {
        Some(Value::Object(fields)) => fields.clone(),
        _ => Map::new(),
    };
    body.insert("answer".to_string(), answer);
    Ok(Value::Object(body))
}

/// Rebuild `document` with the entry under `existing` renamed to and
/// answered by `entry`, keeping key order.
fn rekey(
    document: Map<String, Value>,
    existing: &str,
    entry: &KnowledgeEntry,
) -> Result<Map<String, Value>> {
    let mut rebuilt = Map::new();
    for (key, value) in document {
        if key == existing {
            let value = entry_value(Some(&value), &entry.answer)?;
            rebuilt.insert(entry.question.clone(), value);
        } else {
            rebuilt.insert(key, value);
        }
    }
    Ok(rebuilt)
}

/// `document` without `key`, keeping the order of the rest.
fn without(document: Map<String, Value>, key: &str) -> Map<String, Value> {
    document.into_iter().filter(|(k, _)| k != key).collect()
}

fn validated_entry(question: &str, answer: AnswerPayload) -> Result<KnowledgeEntry> {
    let question = question.trim();
    if question.is_empty() {
        return Err(HelpdeskError::Validation(
            "question must not be empty".to_string(),
        ));
    }
    if answer.is_blank() {
        return Err(HelpdeskError::Validation(format!(
            "answer for '{}' must not be empty",
            question
        )));
    }
    Ok(KnowledgeEntry::new(question, answer))
}

fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "knowledge".to_string());
    path.with_file_name(format!("{}_backup_{}.json", stem, stamp))
}
