//! Marcom service binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `marcom-config.yaml` plus environment overrides
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `SQLite` and run migrations
//! 4. Build the text-generation backend, prompt templates, and retry gate
//! 5. Build the web search provider for research
//! 6. Serve HTTP until `Ctrl-C`, then close the store

use std::sync::Arc;

use marcom_core::{EngineContext, LogFormat, MarcomConfig, Researcher};
use marcom_core::config::LoggingConfig;
use marcom_db::{SqliteConfig, SqliteDb, SqliteStore};
use marcom_llm::{PromptEngine, RetryGate, create_backend};
use marcom_server::{AppState, create_search, start_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the server fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration (needed first: it selects the log format).
    let config = MarcomConfig::load()?;

    // 2. Logging.
    init_logging(&config.logging);
    info!(
        host = config.server.host,
        port = config.server.port,
        database = config.database.url,
        model = config.llm.backend.model,
        "marcom-server starting"
    );

    // 3. Durable store.
    let db_config = SqliteConfig::new(&config.database.url)
        .with_max_connections(config.database.max_connections);
    let db = SqliteDb::connect(&db_config).await?;
    db.run_migrations().await?;
    let store = Arc::new(SqliteStore::new(db.clone()));

    // 4. Text generation.
    let backend = create_backend(&config.llm.backend);
    info!(backend = backend.name(), api_url = config.llm.backend.api_url, "LLM backend configured");
    let prompts = Arc::new(match &config.llm.templates_dir {
        Some(dir) => {
            info!(templates_dir = dir, "loading prompt templates");
            PromptEngine::from_dir(dir)?
        }
        None => PromptEngine::builtin()?,
    });
    let gate = RetryGate::new(Arc::new(backend), config.llm.retry_policy());

    // 5. Research.
    let search = create_search(config.research.provider, &config.research.api_key);
    info!(provider = search.name(), "search provider configured");
    let researcher = Researcher::new(
        gate.clone(),
        Arc::clone(&prompts),
        search,
        config.research.max_results,
    );

    // 6. Serve.
    let ctx = EngineContext {
        gate,
        prompts,
        store,
        memory_window: config.engine.memory_window,
    };
    let state = Arc::new(AppState::new(
        ctx,
        researcher,
        config.engine.default_total_cycles,
    ));
    start_server(&config.server, state).await?;

    db.close().await;
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
