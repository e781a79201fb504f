//! Help desk binary - composition root.
//!
//! 1. Parse the command line and load configuration from TOML
//! 2. Open the knowledge base and ticket stores
//! 3. Run the requested command: the HTTP API, a one-shot question, the
//!    terminal chat or the ticket report

mod cli;
mod repl;

use std::io;
use std::sync::Arc;

use clap::Parser;
use helpdesk_api::routes;
use helpdesk_api::state::AppState;
use helpdesk_chat::{ChatOrchestrator, QueryResolver, ResponseComposer};
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::types::KnowledgeSource;
use helpdesk_storage::{KnowledgeStore, TicketAnalytics, TicketStore};

use cli::{CliArgs, Command};
use repl::ChatRepl;

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = HelpdeskConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.api.port = args.resolve_port(config.api.port);

    // Logs go to stderr so they never interleave with chat output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    tracing::debug!(path = %config_file.display(), "Configuration resolved");

    match args.command() {
        Command::Serve => serve(config).await,
        Command::Ask { query, context } => ask(&config, &query, &context),
        Command::Chat => chat(&config),
        Command::Analytics => analytics(&config),
    }
}

async fn serve(config: HelpdeskConfig) -> AppResult<()> {
    tracing::info!("Starting help desk v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = config.data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let state = AppState::new(config.clone())?;
    routes::start_server(&config, state).await?;
    Ok(())
}

fn ask(config: &HelpdeskConfig, query: &str, context: &[String]) -> AppResult<()> {
    let store = KnowledgeStore::from_config(config)?;
    let resolver = QueryResolver::new(config.resolver.clone());
    let result = resolver.resolve(query, &store.snapshot(), context);
    let reply = ResponseComposer.compose(result, None);
    println!("{}", ResponseComposer::render_terminal(&reply));
    Ok(())
}

fn analytics(config: &HelpdeskConfig) -> AppResult<()> {
    let tickets = TicketStore::from_config(config);
    print!("{}", TicketAnalytics::load(&tickets)?.render_text());
    Ok(())
}

fn chat(config: &HelpdeskConfig) -> AppResult<()> {
    let knowledge: Arc<dyn KnowledgeSource> = Arc::new(KnowledgeStore::from_config(config)?);
    let tickets = TicketStore::from_config(config);
    let orchestrator = ChatOrchestrator::new(config, knowledge)?;

    ChatRepl::new(orchestrator, tickets).run(io::stdin().lock(), &mut io::stdout())?;
    Ok(())
}
