//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use helpdesk_chat::ChatOrchestrator;
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::types::KnowledgeSource;
use helpdesk_storage::{KnowledgeStore, TicketStore};

use crate::auth::LoginRegistry;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HelpdeskConfig>,
    /// Knowledge base with its editor.
    pub knowledge: Arc<KnowledgeStore>,
    pub tickets: Arc<TicketStore>,
    /// Chat sessions, reading the knowledge base through `knowledge`.
    pub chat: Arc<ChatOrchestrator>,
    pub logins: Arc<LoginRegistry>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Open the knowledge and ticket stores named by `config`.
    pub fn new(config: HelpdeskConfig) -> Result<Self> {
        let knowledge = KnowledgeStore::from_config(&config)?;
        let tickets = TicketStore::from_config(&config);
        Self::with_stores(config, knowledge, tickets)
    }

    pub fn with_stores(
        config: HelpdeskConfig,
        knowledge: KnowledgeStore,
        tickets: TicketStore,
    ) -> Result<Self> {
        let knowledge = Arc::new(knowledge);
        let source: Arc<dyn KnowledgeSource> = knowledge.clone();
        let chat = ChatOrchestrator::new(&config, source)
            .map_err(|e| HelpdeskError::Config(e.to_string()))?;
        let token_ttl = Duration::from_secs(u64::from(config.api.token_ttl_minutes) * 60);

        Ok(Self {
            config: Arc::new(config),
            knowledge,
            tickets: Arc::new(tickets),
            chat: Arc::new(chat),
            logins: Arc::new(LoginRegistry::new(token_ttl)),
            start_time: Instant::now(),
        })
    }
}
