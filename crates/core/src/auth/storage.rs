//! Named-key layout for persisted credentials and the in-memory backend.
//!
//! Every backend stores the same fixed set of keys so that a credential
//! written by one build can be read by another.

use std::collections::BTreeMap;

use authwire_domain::constants::{
    STORAGE_KEY_ACCESS_TOKEN, STORAGE_KEY_EXPIRES_AT, STORAGE_KEY_ISSUED_AT,
    STORAGE_KEY_REFRESH_TOKEN, STORAGE_KEY_TOKEN_TYPE,
};
use authwire_domain::Credential;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::ports::{CredentialStorage, StorageError};

/// Flatten a credential into its storage keys.
pub fn to_entries(credential: &Credential) -> BTreeMap<String, String> {
    BTreeMap::from([
        (STORAGE_KEY_ACCESS_TOKEN.to_string(), credential.access_token.clone()),
        (STORAGE_KEY_REFRESH_TOKEN.to_string(), credential.refresh_token.clone()),
        (STORAGE_KEY_TOKEN_TYPE.to_string(), credential.token_type.clone()),
        (STORAGE_KEY_ISSUED_AT.to_string(), credential.issued_at.to_rfc3339()),
        (STORAGE_KEY_EXPIRES_AT.to_string(), credential.expires_at.to_rfc3339()),
    ])
}

/// Rebuild a credential from storage keys.
///
/// A missing or empty access token means nothing is stored.
///
/// # Errors
/// Returns `StorageError::Corrupt` when the access token is present but the
/// remaining keys are missing or malformed.
pub fn from_entries(entries: &BTreeMap<String, String>) -> Result<Option<Credential>, StorageError> {
    let access_token = match entries.get(STORAGE_KEY_ACCESS_TOKEN) {
        Some(token) if !token.is_empty() => token.clone(),
        _ => return Ok(None),
    };

    let field = |key: &str| {
        entries.get(key).cloned().ok_or_else(|| StorageError::Corrupt(format!("missing {key}")))
    };
    let timestamp = |key: &str| -> Result<DateTime<Utc>, StorageError> {
        let raw = field(key)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StorageError::Corrupt(format!("{key}: {e}")))
    };

    let credential = Credential::new(
        access_token,
        field(STORAGE_KEY_REFRESH_TOKEN)?,
        field(STORAGE_KEY_TOKEN_TYPE)?,
        timestamp(STORAGE_KEY_ISSUED_AT)?,
        timestamp(STORAGE_KEY_EXPIRES_AT)?,
    )
    .map_err(|e| StorageError::Corrupt(e.to_string()))?;

    Ok(Some(credential))
}

/// Process-local backend. Used as the ephemeral tier and in tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryCredentialStorage {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw view of the stored keys.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.entries.lock().clone()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CredentialStorage for MemoryCredentialStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        from_entries(&self.entries.lock())
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        *self.entries.lock() = to_entries(credential);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries.lock().clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
