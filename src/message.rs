//! Conversation messages and the snapshot-based message log.
//!
//! Every mutation returns a fresh `MessageLog`; earlier snapshots held by the
//! UI stay untouched so old and new can be compared cheaply.

use crate::error::LogError;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const GREETING: &str = "👋 Hi! Ask me anything about the college.";
pub const NO_MATCH_REPLY: &str = "❌ No match found in FAQ. Try switching to GPT mode.";
pub const CONNECTION_ERROR_REPLY: &str = "⚠️ Error connecting to GPT backend.";
pub const THINKING_LABEL: &str = "💭 Thinking...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Bot => "Bot",
        }
    }
}

/// Which backend answers the next turn. Not persisted with messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    FaqKeyword,
    Generative,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::FaqKeyword => "FAQ",
            Mode::Generative => "GPT",
        }
    }

    pub fn from_str(s: &str) -> Option<Mode> {
        match s.trim().to_lowercase().as_str() {
            "faq" | "keyword" => Some(Mode::FaqKeyword),
            "gpt" | "generative" => Some(Mode::Generative),
            _ => None,
        }
    }

    pub fn other(&self) -> Mode {
        match self {
            Mode::FaqKeyword => Mode::Generative,
            Mode::Generative => Mode::FaqKeyword,
        }
    }
}

/// A single log entry. The stored field names (`type`, `content`,
/// millisecond `timestamp`) match the history blobs written by the web client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(rename = "content")]
    pub text: String,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl Message {
    fn new(role: Role, text: impl Into<String>, pending: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            // Millisecond precision so a persisted copy compares equal.
            created_at: Utc::now().trunc_subsecs(3),
            pending,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text, false)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Role::Bot, text, false)
    }

    /// In-flight bot reply marker; always empty.
    pub fn placeholder() -> Self {
        Self::new(Role::Bot, "", true)
    }

    pub fn greeting() -> Self {
        Self::bot(GREETING)
    }

    /// Text to show for this message; pending entries render as the thinking label.
    pub fn display_text(&self) -> &str {
        if self.pending {
            THINKING_LABEL
        } else {
            &self.text
        }
    }
}

/// Ordered, immutable conversation snapshot.
///
/// Invariant: at most one pending message, and only as the last element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLog {
    messages: Arc<Vec<Message>>,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::seeded()
    }
}

impl MessageLog {
    /// Fresh log holding only the bot greeting.
    pub fn seeded() -> Self {
        Self::single(Message::greeting())
    }

    fn single(seed: Message) -> Self {
        Self {
            messages: Arc::new(vec![seed]),
        }
    }

    /// Rebuild a log from persisted messages.
    ///
    /// Pending entries are dropped: a stored placeholder can never be
    /// completed. Returns `None` when nothing committed remains.
    pub fn from_snapshot(messages: Vec<Message>) -> Option<Self> {
        let committed: Vec<Message> = messages.into_iter().filter(|m| !m.pending).collect();
        if committed.is_empty() {
            return None;
        }
        Some(Self {
            messages: Arc::new(committed),
        })
    }

    pub fn append(&self, message: Message) -> Result<Self, LogError> {
        if self.pending().is_some() {
            return Err(LogError::InvariantViolation(
                "cannot append behind a pending message",
            ));
        }
        let mut messages = self.messages.as_ref().clone();
        messages.push(clamp_after(self.messages.last(), message));
        Ok(Self {
            messages: Arc::new(messages),
        })
    }

    /// Swap the trailing pending placeholder for a committed message.
    pub fn replace_last(&self, message: Message) -> Result<Self, LogError> {
        if message.pending {
            return Err(LogError::InvariantViolation(
                "replacement for a placeholder must be committed",
            ));
        }
        let mut messages = self.messages.as_ref().clone();
        match messages.last() {
            None => return Err(LogError::InvariantViolation("replace_last on an empty log")),
            Some(last) if !last.pending => {
                return Err(LogError::InvariantViolation(
                    "replace_last requires a pending tail",
                ))
            }
            Some(_) => {}
        }
        messages.pop();
        let message = clamp_after(messages.last(), message);
        messages.push(message);
        Ok(Self {
            messages: Arc::new(messages),
        })
    }

    /// Drop the trailing pending placeholder without a replacement.
    pub fn retract_last(&self) -> Result<Self, LogError> {
        if self.pending().is_none() {
            return Err(LogError::InvariantViolation(
                "retract_last requires a pending tail",
            ));
        }
        let mut messages = self.messages.as_ref().clone();
        messages.pop();
        Ok(Self {
            messages: Arc::new(messages),
        })
    }

    pub fn reset(&self, seed: Message) -> Self {
        Self::single(seed)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn pending(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.pending)
    }

    pub fn committed(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.pending)
    }

    /// True once anything beyond the seed greeting has been said.
    pub fn has_conversation(&self) -> bool {
        self.messages.len() > 1
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.created_at)
    }
}

// Insertion order doubles as chronological order.
fn clamp_after(previous: Option<&Message>, mut message: Message) -> Message {
    if let Some(previous) = previous {
        if message.created_at < previous.created_at {
            message.created_at = previous.created_at;
        }
    }
    message
}
