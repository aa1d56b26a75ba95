use std::path::PathBuf;
use thiserror::Error;

/// Missing or unusable configuration. Fatal for the turn that hits it.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("API URL is not defined. Set FAQCHAT_API_URL or api_url in the config file.")]
    MissingBaseUrl,
    #[error("API URL is not a valid http(s) address: {0}")]
    InvalidBaseUrl(String),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Misuse of the message log contract. Never expected in correct usage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("message log invariant violated: {0}")]
    InvariantViolation(&'static str),
}

/// Why a turn could not start or complete.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("message is empty")]
    EmptyInput,
    #[error("still waiting for the previous reply")]
    Busy,
    #[error(transparent)]
    Invariant(#[from] LogError),
}

/// A single failed credential-form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Rejected identity operations, surfaced to the authentication form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("User already exists. Please sign in instead.")]
    AlreadyExists,
    #[error("User not found. Please sign up first.")]
    NotRegistered,
    #[error("Invalid password. Please try again.")]
    WrongCredential,
    #[error("{}", format_field_errors(.0))]
    Invalid(Vec<FieldError>),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write transcript {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
