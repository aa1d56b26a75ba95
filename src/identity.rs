//! Identities, the pluggable identity directory and credential-form rules.
//!
//! The bundled directory is an in-memory registry with plain-text secrets.
//! It scopes history per account; it is not an authentication system.

use crate::error::{FieldError, IdentityError, StoreError};
use crate::store::KeyValueStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

pub const ACTIVE_IDENTITY_KEY: &str = "user";
const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").unwrap());

/// The signed-in principal. Field names match the stored `user` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "email")]
    pub account_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

impl Identity {
    /// Blank display names fall back to the local part of the account id.
    pub fn new(account_id: &str, display_name: &str) -> Self {
        let account_id = account_id.trim().to_string();
        let display_name = match display_name.trim() {
            "" => account_id
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
            name => name.to_string(),
        };
        Self {
            account_id,
            display_name,
        }
    }
}

// ============ Directory ============

pub trait IdentityDirectory: Send + Sync {
    fn find(&self, account_id: &str) -> Option<Identity>;
    fn register(&self, identity: Identity, secret: &str) -> Result<(), IdentityError>;
    fn verify(&self, account_id: &str, secret: &str) -> Result<Identity, IdentityError>;
}

#[derive(Default)]
pub struct InMemoryDirectory {
    accounts: Mutex<HashMap<String, (Identity, String)>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityDirectory for InMemoryDirectory {
    fn find(&self, account_id: &str) -> Option<Identity> {
        let accounts = self.accounts.lock().unwrap_or_else(|p| p.into_inner());
        accounts.get(account_id).map(|(identity, _)| identity.clone())
    }

    fn register(&self, identity: Identity, secret: &str) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.lock().unwrap_or_else(|p| p.into_inner());
        if accounts.contains_key(&identity.account_id) {
            return Err(IdentityError::AlreadyExists);
        }
        accounts.insert(identity.account_id.clone(), (identity, secret.to_string()));
        Ok(())
    }

    fn verify(&self, account_id: &str, secret: &str) -> Result<Identity, IdentityError> {
        let accounts = self.accounts.lock().unwrap_or_else(|p| p.into_inner());
        let (identity, stored) = accounts.get(account_id).ok_or(IdentityError::NotRegistered)?;
        if stored != secret {
            return Err(IdentityError::WrongCredential);
        }
        Ok(identity.clone())
    }
}

// ============ Credential forms ============

fn check_email_and_password(email: &str, password: &str, errors: &mut Vec<FieldError>) {
    if email.trim().is_empty() {
        errors.push(FieldError { field: "email", message: "Email is required" });
    } else if !EMAIL_RE.is_match(email) {
        errors.push(FieldError { field: "email", message: "Email is invalid" });
    }

    if password.is_empty() {
        errors.push(FieldError { field: "password", message: "Password is required" });
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError {
            field: "password",
            message: "Password must be at least 6 characters",
        });
    }
}

pub fn validate_sign_in(email: &str, password: &str) -> Result<(), IdentityError> {
    let mut errors = Vec::new();
    check_email_and_password(email, password, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(IdentityError::Invalid(errors))
    }
}

pub fn validate_sign_up(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), IdentityError> {
    let mut errors = Vec::new();
    check_email_and_password(email, password, &mut errors);
    if name.trim().is_empty() {
        errors.push(FieldError { field: "name", message: "Name is required" });
    }
    if password != confirm_password {
        errors.push(FieldError {
            field: "confirmPassword",
            message: "Passwords do not match",
        });
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(IdentityError::Invalid(errors))
    }
}

// ============ Active identity record ============

/// Identity persisted from the previous run. A malformed record is removed.
pub fn load_active_identity(store: &dyn KeyValueStore) -> Option<Identity> {
    let raw = store.get(ACTIVE_IDENTITY_KEY).ok().flatten()?;
    match serde_json::from_str::<Identity>(&raw) {
        Ok(identity) => Some(identity),
        Err(_) => {
            let _ = store.delete(ACTIVE_IDENTITY_KEY);
            None
        }
    }
}

pub fn save_active_identity(store: &dyn KeyValueStore, identity: &Identity) -> Result<(), StoreError> {
    store.set(ACTIVE_IDENTITY_KEY, &serde_json::to_string(identity)?)
}

pub fn clear_active_identity(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    store.delete(ACTIVE_IDENTITY_KEY)
}
