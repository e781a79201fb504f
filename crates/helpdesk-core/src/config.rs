use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HelpdeskError, Result};
use crate::types::AnswerJoin;

/// Top-level configuration for the help desk.
///
/// Loaded from `~/.helpdesk/config.toml` by default. Every section falls back
/// to its defaults when missing, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub tickets: TicketConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl HelpdeskConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HelpdeskConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or is invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the resolver cannot work with.
    pub fn validate(&self) -> Result<()> {
        let r = &self.resolver;
        if r.max_candidates == 0 {
            return Err(HelpdeskError::Config(
                "resolver.max_candidates must be at least 1".to_string(),
            ));
        }
        if r.min_score > 100 || r.answer_threshold > 100 {
            return Err(HelpdeskError::Config(
                "resolver scores must be within 0..=100".to_string(),
            ));
        }
        if self.chat.max_message_length == 0 {
            return Err(HelpdeskError::Config(
                "chat.max_message_length must be at least 1".to_string(),
            ));
        }
        if self.api.token_ttl_minutes == 0 {
            return Err(HelpdeskError::Config(
                "api.token_ttl_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Data directory with a leading `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }

    /// Knowledge-base file, resolved against the data directory when relative.
    pub fn knowledge_path(&self) -> PathBuf {
        self.resolve_in_data_dir(&self.knowledge.path)
    }

    /// Ticket file, resolved against the data directory when relative.
    pub fn ticket_path(&self) -> PathBuf {
        self.resolve_in_data_dir(&self.tickets.path)
    }

    fn resolve_in_data_dir(&self, path: &str) -> PathBuf {
        let expanded = expand_home(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.data_dir().join(expanded)
        }
    }
}

/// Expand `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the knowledge base, tickets and backups.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.helpdesk/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Query resolver thresholds and formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum number of candidates offered for disambiguation.
    pub max_candidates: usize,
    /// Candidates scoring below this are discarded.
    pub min_score: u8,
    /// A top score strictly above this answers directly.
    pub answer_threshold: u8,
    /// Number of prior user turns prepended to a query. 0 disables context.
    pub context_turns: usize,
    /// Separator for list-valued answers.
    pub answer_join: AnswerJoin,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            min_score: 20,
            answer_threshold: 70,
            context_turns: 2,
            answer_join: AnswerJoin::Newline,
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub enabled: bool,
    /// Idle minutes after which a session (and its pending choices) expires.
    pub session_timeout_minutes: u32,
    /// Maximum message length in characters.
    pub max_message_length: usize,
    /// Messages kept per session history.
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_timeout_minutes: 30,
            max_message_length: 2000,
            history_limit: 200,
        }
    }
}

/// Keywords that suggest a high-priority ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub enabled: bool,
    pub keywords: Vec<String>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keywords: [
                "urgent",
                "asap",
                "emergency",
                "outage",
                "down",
                "breach",
                "hacked",
                "critical",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Knowledge-base file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// JSON file, relative to the data directory unless absolute.
    pub path: String,
    /// Copy the current file to a timestamped backup before every edit.
    pub backup_on_write: bool,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: "knowledge.json".to_string(),
            backup_on_write: true,
        }
    }
}

/// Ticket file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketConfig {
    /// CSV file, relative to the data directory unless absolute.
    pub path: String,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            path: "tickets.csv".to_string(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
    /// User names granted knowledge-base editing rights at login.
    pub admin_users: Vec<String>,
    /// Requests per second accepted on the ask/chat routes.
    pub rate_limit_per_sec: u64,
    /// Minutes a login token stays valid after it is issued.
    pub token_ttl_minutes: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            admin_users: vec!["admin".to_string()],
            rate_limit_per_sec: 100,
            token_ttl_minutes: 480,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = HelpdeskConfig::default();
        assert_eq!(config.general.data_dir, "~/.helpdesk/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.resolver.max_candidates, 3);
        assert_eq!(config.resolver.min_score, 20);
        assert_eq!(config.resolver.answer_threshold, 70);
        assert_eq!(config.resolver.context_turns, 2);
        assert_eq!(config.resolver.answer_join, AnswerJoin::Newline);
        assert!(config.chat.enabled);
        assert_eq!(config.chat.session_timeout_minutes, 30);
        assert!(config.escalation.keywords.contains(&"urgent".to_string()));
        assert_eq!(config.knowledge.path, "knowledge.json");
        assert!(config.knowledge.backup_on_write);
        assert_eq!(config.tickets.path, "tickets.csv");
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.api.admin_users, vec!["admin"]);
        assert_eq!(config.api.token_ttl_minutes, 480);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[resolver]
answer_threshold = 60
answer_join = "space"

[api]
admin_users = ["neonuy"]
"#;
        let file = create_temp_config(content);
        let config = HelpdeskConfig::load(file.path()).unwrap();
        assert_eq!(config.resolver.answer_threshold, 60);
        assert_eq!(config.resolver.answer_join, AnswerJoin::Space);
        assert_eq!(config.resolver.min_score, 20);
        assert_eq!(config.api.admin_users, vec!["neonuy"]);
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.chat.max_message_length, 2000);
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = HelpdeskConfig::load(file.path()).unwrap();
        assert_eq!(config.resolver, ResolverConfig::default());
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = HelpdeskConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.helpdesk/data");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(HelpdeskConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let file = create_temp_config("[resolver]\nmax_candidates = 0\n");
        let err = HelpdeskConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, HelpdeskError::Config(_)));

        let file = create_temp_config("[resolver]\nmin_score = 101\n");
        assert!(HelpdeskConfig::load(file.path()).is_err());

        let file = create_temp_config("[api]\ntoken_ttl_minutes = 0\n");
        assert!(HelpdeskConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_unknown_answer_join_is_rejected() {
        let file = create_temp_config("[resolver]\nanswer_join = \"comma\"\n");
        assert!(HelpdeskConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = HelpdeskConfig::default();
        config.resolver.min_score = 35;
        config.save(&path).unwrap();

        let reloaded = HelpdeskConfig::load(&path).unwrap();
        assert_eq!(reloaded.resolver.min_score, 35);
        assert_eq!(reloaded.api.port, config.api.port);
    }

    #[test]
    fn test_paths_resolve_against_data_dir() {
        let mut config = HelpdeskConfig::default();
        config.general.data_dir = "/srv/helpdesk".to_string();
        assert_eq!(
            config.knowledge_path(),
            PathBuf::from("/srv/helpdesk/knowledge.json")
        );
        assert_eq!(config.ticket_path(), PathBuf::from("/srv/helpdesk/tickets.csv"));

        config.tickets.path = "/var/tickets.csv".to_string();
        assert_eq!(config.ticket_path(), PathBuf::from("/var/tickets.csv"));
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("data"), PathBuf::from("data"));
        assert!(!expand_home("~/data").starts_with("~"));
    }
}
