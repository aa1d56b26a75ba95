//! Structured logging for FAQ Chat
//!
//! Writes daily log files to `<data dir>/logs/` with categories:
//! - SESSION: Turn lifecycle (send, placeholder, commit)
//! - ROUTING: Backend dispatch and outcomes
//! - HISTORY: History loads, saves and clears
//! - IDENTITY: Sign-in, sign-up, logout
//! - ERROR: Errors that were folded into the conversation

use chrono::Utc;
use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "faqchat";
const LOG_RETENTION_DAYS: i64 = 7;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy)]
pub enum LogCategory {
    Session,
    Routing,
    History,
    Identity,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Session => "SESSION",
            LogCategory::Routing => "ROUTING",
            LogCategory::History => "HISTORY",
            LogCategory::Identity => "IDENTITY",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Keeps the file writer flushing for the life of the process
static FILE_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

/// Install the console + daily file subscriber. Safe to call more than once.
pub fn init_logging(log_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut guard = FILE_GUARD.lock().unwrap_or_else(|p| p.into_inner());
    if guard.is_some() {
        return Ok(());
    }

    fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, worker_guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()?;

    *guard = Some(worker_guard);
    drop(guard);

    log(LogCategory::Session, None, "FAQ Chat logging initialized");
    Ok(())
}

/// Log a message with category and optional account context
pub fn log(category: LogCategory, account_id: Option<&str>, message: &str) {
    let account = account_context(account_id);
    match category {
        LogCategory::Error => {
            tracing::warn!(category = category.as_str(), "{}{}", account, message)
        }
        _ => tracing::info!(category = category.as_str(), "{}{}", account, message),
    }
}

fn account_context(account_id: Option<&str>) -> String {
    account_id
        .map(|id| format!("account={} | ", id.chars().take(16).collect::<String>()))
        .unwrap_or_default()
}

pub fn log_session(account_id: Option<&str>, message: &str) {
    log(LogCategory::Session, account_id, message);
}

pub fn log_routing(account_id: Option<&str>, message: &str) {
    log(LogCategory::Routing, account_id, message);
}

pub fn log_history(account_id: Option<&str>, message: &str) {
    log(LogCategory::History, account_id, message);
}

pub fn log_identity(account_id: Option<&str>, message: &str) {
    log(LogCategory::Identity, account_id, message);
}

pub fn log_error(account_id: Option<&str>, message: &str) {
    log(LogCategory::Error, account_id, message);
}

/// Clean up old log files (keep last 7 days)
pub fn cleanup_old_logs(log_dir: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(LOG_RETENTION_DAYS);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX));
        if !is_ours {
            continue;
        }

        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            let modified_time: chrono::DateTime<Utc> = modified.into();
            if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                deleted += 1;
            }
        }
    }

    Ok(deleted)
}
