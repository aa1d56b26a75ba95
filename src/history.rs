//! Per-account conversation history on top of the key-value port.
//!
//! One record per account, overwritten wholesale on every save. Unreadable
//! records are treated as absent history.

use crate::error::StoreError;
use crate::logging;
use crate::message::{Message, MessageLog};
use crate::store::KeyValueStore;
use std::sync::Arc;

const HISTORY_KEY_PREFIX: &str = "chat_history_";

pub fn history_key(account_id: &str) -> String {
    format!("{}{}", HISTORY_KEY_PREFIX, account_id)
}

#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Saved snapshot for the account, or `None` when absent or unreadable.
    pub fn load(&self, account_id: &str) -> Option<MessageLog> {
        let raw = match self.store.get(&history_key(account_id)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                logging::log_error(Some(account_id), &format!("History read failed: {}", e));
                return None;
            }
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => {
                let log = MessageLog::from_snapshot(messages);
                if let Some(log) = &log {
                    logging::log_history(
                        Some(account_id),
                        &format!("Loaded {} messages", log.len()),
                    );
                }
                log
            }
            Err(e) => {
                logging::log_error(
                    Some(account_id),
                    &format!("Ignoring corrupt history record: {}", e),
                );
                None
            }
        }
    }

    pub fn save(&self, account_id: &str, log: &MessageLog) -> Result<(), StoreError> {
        let raw = serde_json::to_string(log.messages())?;
        self.store.set(&history_key(account_id), &raw)?;
        logging::log_history(Some(account_id), &format!("Saved {} messages", log.len()));
        Ok(())
    }

    pub fn clear(&self, account_id: &str) -> Result<(), StoreError> {
        self.store.delete(&history_key(account_id))?;
        logging::log_history(Some(account_id), "Cleared history");
        Ok(())
    }
}
