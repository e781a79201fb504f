//! Keyword-based escalation detection.

use helpdesk_core::config::EscalationConfig;
use regex::Regex;

use crate::error::ChatError;

/// Spots messages that should be raised as high-priority tickets.
pub struct EscalationDetector {
    pattern: Option<Regex>,
}

impl EscalationDetector {
    pub fn new(config: &EscalationConfig) -> Result<Self, ChatError> {
        let keywords: Vec<String> = config
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        if !config.enabled || keywords.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", keywords.join("|")))
            .map_err(|e| ChatError::Config(format!("invalid escalation keyword: {}", e)))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// The first keyword found in `message`, lowercased.
    pub fn detect(&self, message: &str) -> Option<String> {
        self.pattern
            .as_ref()?
            .find(message)
            .map(|m| m.as_str().to_lowercase())
    }
}
