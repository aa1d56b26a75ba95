mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod identity;
pub mod logging;
pub mod message;
pub mod router;
pub mod session;
pub mod store;

use clap::Parser;
use cli::Args;
use config::{Config, Overrides};
use identity::InMemoryDirectory;
use router::HttpRouter;
use session::ChatSession;
use std::sync::Arc;
use store::{KeyValueStore, MemoryStore, SqliteStore};

pub use error::{ConfigurationError, IdentityError, LogError, TurnError};
pub use message::{Message, MessageLog, Mode, Role};
pub use router::{Backend, RouterResult};

// ============ App Initialization ============

/// Open the on-disk store, falling back to memory so chatting still works.
fn open_store(config: &Config) -> Arc<dyn KeyValueStore> {
    match SqliteStore::open(&config.database_path()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            logging::log_error(
                None,
                &format!(
                    "Could not open {}: {}; history will not persist",
                    config.database_path().display(),
                    e
                ),
            );
            Arc::new(MemoryStore::new())
        }
    }
}

fn build_session(config: &Config) -> ChatSession {
    let backend = Arc::new(HttpRouter::new(config));
    let mut session = ChatSession::new(backend, open_store(config), Arc::new(InMemoryDirectory::new()));

    if config.api_url.is_none() {
        logging::log_error(None, "No backend address configured; replies will report a connection error");
    }
    if let Some(identity) = session.restore() {
        logging::log_session(Some(&identity.account_id), "Resumed previous session");
    }
    session
}

// ============ Run ============

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load(Overrides {
        api_url: args.api_url.clone(),
        data_dir: args.data_dir.clone(),
    })?;

    let log_dir = config.log_dir();
    if let Err(e) = logging::init_logging(&log_dir) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    let _ = logging::cleanup_old_logs(&log_dir);

    // One thread: UI events and network completions are serialized.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let mut session = build_session(&config);
        if let Some(mode) = args.mode {
            session.set_mode(mode);
        }
        cli::repl(session).await
    })?;

    Ok(())
}
