//! Query resolver: match a free-text query against the knowledge base and
//! decide between a direct answer, a list of choices, or no match.

use helpdesk_core::config::ResolverConfig;
use helpdesk_core::error::HelpdeskError;
use helpdesk_core::types::{Candidate, KnowledgeBase, ResolutionResult};
use serde_json::Value;
use tracing::debug;

use crate::context::augment_query;
use crate::error::ResolveError;
use crate::scorer;

/// Parameterized match-and-disambiguate resolver.
///
/// Resolution is pure: the same query, knowledge base and context always
/// produce the same result.
#[derive(Debug, Clone)]
pub struct QueryResolver {
    config: ResolverConfig,
}

impl QueryResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `query` against `kb`.
    ///
    /// `context` holds prior user turns, most recent last. The last
    /// `context_turns` of them are prepended to the query before scoring.
    pub fn resolve(&self, query: &str, kb: &KnowledgeBase, context: &[String]) -> ResolutionResult {
        if query.trim().is_empty() || kb.is_empty() {
            return ResolutionResult::Unknown;
        }

        let ranked = self.rank_indexed(query, kb, context);
        let Some(&(top_index, top_score)) = ranked.first() else {
            return ResolutionResult::Unknown;
        };

        if top_score > self.config.answer_threshold {
            let entry = &kb.entries()[top_index];
            debug!(key = %entry.question, score = top_score, "Query answered");
            return ResolutionResult::Answered {
                text: entry.answer.join(self.config.answer_join),
            };
        }

        let candidates = ranked
            .into_iter()
            .map(|(index, score)| Candidate {
                key: kb.entries()[index].question.clone(),
                score,
            })
            .collect::<Vec<_>>();
        debug!(count = candidates.len(), top = top_score, "Query ambiguous");
        ResolutionResult::Ambiguous { candidates }
    }

    /// Scored candidates that pass `min_score`, best first, at most
    /// `max_candidates` of them.
    pub fn rank(&self, query: &str, kb: &KnowledgeBase, context: &[String]) -> Vec<Candidate> {
        self.rank_indexed(query, kb, context)
            .into_iter()
            .map(|(index, score)| Candidate {
                key: kb.entries()[index].question.clone(),
                score,
            })
            .collect()
    }

    /// Resolve unvalidated JSON input.
    ///
    /// `query` must be a JSON string and `kb` an object of
    /// `{"question": {"answer": ...}}` entries; any malformed entry fails the
    /// whole call.
    pub fn resolve_value(
        &self,
        query: &Value,
        kb: &Value,
        context: &[String],
    ) -> Result<ResolutionResult, ResolveError> {
        let query = query.as_str().ok_or_else(|| {
            ResolveError::InvalidQuery(format!("expected a string, got {}", json_kind(query)))
        })?;
        let kb = KnowledgeBase::from_json_value_strict(kb).map_err(|e| match e {
            HelpdeskError::InvalidKnowledgeBase(msg) => ResolveError::InvalidKnowledgeBase(msg),
            other => ResolveError::InvalidKnowledgeBase(other.to_string()),
        })?;
        Ok(self.resolve(query, &kb, context))
    }

    fn rank_indexed(&self, query: &str, kb: &KnowledgeBase, context: &[String]) -> Vec<(usize, u8)> {
        let bare = scorer::normalize(query);
        let augmented = scorer::normalize(&augment_query(query, context, self.config.context_turns));

        // Context only ever raises a key's score: the query alone decides
        // whenever it names a key more closely than the conversation does.
        let mut scored: Vec<(usize, u8)> = kb
            .entries()
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let key = scorer::normalize(&entry.question);
                let mut score = scorer::weighted_ratio(&bare, &key);
                if augmented != bare {
                    score = score.max(scorer::weighted_ratio(&augmented, &key));
                }
                (i, score)
            })
            .filter(|&(_, score)| score >= self.config.min_score)
            .collect();

        // stable: equal scores stay in knowledge-base order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(self.config.max_candidates);
        scored
    }
}

impl Default for QueryResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
