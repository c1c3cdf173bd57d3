//! Bearer token persistence.
//!
//! One credential exists process-wide. It is created when pairing completes,
//! and invalidated either reactively (the API client observed a 401) or
//! explicitly (user-initiated unpair). There is no expiry timer.
//!
//! The token value is opaque and must never appear in logs in cleartext.

use tracing::debug;

use crate::Result;
use crate::storage::{KEY_API_KEY, Storage};

/// Durable store for the pairing credential.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    storage: Storage,
}

impl CredentialStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Returns the stored token, if any.
    ///
    /// An empty stored string reads as absent, same as a missing key.
    pub fn get(&self) -> Result<Option<String>> {
        let token: Option<String> = self.storage.get(KEY_API_KEY)?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    /// Stores or clears the token.
    pub fn set(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) if !token.is_empty() => {
                debug!("storing pairing credential");
                self.storage.set(KEY_API_KEY, &token)
            }
            _ => self.clear(),
        }
    }

    /// Removes the token from storage.
    pub fn clear(&self) -> Result<()> {
        debug!("clearing pairing credential");
        self.storage.remove(KEY_API_KEY)
    }
}
