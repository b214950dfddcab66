//! Authentication Module
//!
//! Owns the access/refresh token pair and its lifecycle. Every read goes to
//! persistent storage; nothing is cached between operations.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::storage::{KeyValueStore, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Snapshot of the stored credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    /// A non-empty access token means the caller is considered logged in
    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Single writer of the session state
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
    /// Access token whose rejection has already been handled; cleared on login.
    expired_token: Mutex<Option<String>>,
}

impl SessionStore {
    /// Create a session store over persistent storage
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
            expired_token: Mutex::new(None),
        }
    }

    /// Get the access token if one is stored
    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    /// Get the refresh token if one is stored
    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Read both tokens at once
    pub fn snapshot(&self) -> Session {
        Session {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
        }
    }

    /// Check if currently authenticated
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some_and(|t| !t.is_empty())
    }

    /// Persist a freshly issued token pair
    pub fn set_session(&self, access: &str, refresh: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;

        let written = self
            .storage
            .set(ACCESS_TOKEN_KEY, access)
            .and_then(|_| self.storage.set(REFRESH_TOKEN_KEY, refresh));

        if let Err(e) = written {
            warn!("Failed to persist session, rolling back: {}", e);
            for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
                if let Err(rollback) = self.storage.remove(key) {
                    warn!("Failed to roll back {}: {}", key, rollback);
                }
            }
            return Err(e);
        }

        *self.expired_token() = None;
        info!("Session set");
        Ok(())
    }

    /// Replace the access token after a refresh, keeping the refresh token
    pub fn set_access_token(&self, access: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        self.storage.set(ACCESS_TOKEN_KEY, access)?;
        info!("Access token replaced");
        Ok(())
    }

    /// Remove both tokens. Safe to call when already logged out.
    pub fn clear_session(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;

        let access = self.storage.remove(ACCESS_TOKEN_KEY);
        let refresh = self.storage.remove(REFRESH_TOKEN_KEY);
        access?;
        refresh?;

        info!("Session cleared");
        Ok(())
    }

    /// Claim the session-expired side effects for a rejected call that carried
    /// `credential`. Calls sharing one rejected token claim it exactly once; a
    /// call that carried no token is always its own failure.
    pub fn mark_expired(&self, credential: Option<&str>) -> bool {
        let Some(token) = credential.filter(|t| !t.is_empty()) else {
            return true;
        };

        let mut expired = self.expired_token();
        if expired.as_deref() == Some(token) {
            return false;
        }
        *expired = Some(token.to_string());
        true
    }

    fn expired_token(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.expired_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read {} from storage: {}", key, e);
                None
            }
        }
    }
}
