use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::store::{TokenKind, TokenStore};

const SERVICE_NAME: &str = "clinic-client";

/// Token store backed by the OS keychain.
///
/// Each token is a separate keychain entry under [`SERVICE_NAME`], keyed by
/// [`TokenKind::key`].
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom keychain service name, e.g. one per backend environment
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, kind: TokenKind) -> Result<Entry> {
        Entry::new(&self.service, kind.key()).context("Failed to create keyring entry")
    }

    fn set(&self, kind: TokenKind, value: &str) -> Result<()> {
        self.entry(kind)?
            .set_password(value)
            .context("Failed to store token in keychain")
    }

    fn read(&self, kind: TokenKind) -> Result<Option<String>> {
        match self.entry(kind)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read token from keychain"),
        }
    }

    fn delete(&self, kind: TokenKind) -> Result<()> {
        match self.entry(kind)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn store(&self, kind: TokenKind, value: &str) {
        if let Err(e) = self.set(kind, value) {
            warn!(error = %e, token = %kind, "Failed to persist token");
        }
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        self.read(kind).unwrap_or_else(|e| {
            warn!(error = %e, token = %kind, "Failed to read token");
            None
        })
    }

    fn clear(&self) {
        for kind in TokenKind::ALL {
            if let Err(e) = self.delete(kind) {
                warn!(error = %e, token = %kind, "Failed to clear token");
            }
        }
    }
}
