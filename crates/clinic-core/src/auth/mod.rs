//! Token storage for the authenticated API client.
//!
//! This module provides:
//! - `TokenStore`: the access/refresh token key-value contract
//! - `MemoryTokenStore`: in-process storage, used in tests
//! - `FileTokenStore`: JSON token file in the cache directory
//! - `KeyringTokenStore`: OS-level storage via keyring
//!
//! No expiry is tracked here; an expired access token is only discovered
//! when the backend rejects it.

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::KeyringTokenStore;
pub use session::{FileTokenStore, StoredTokens};
pub use store::{MemoryTokenStore, TokenKind, TokenStore};

/// A session is authenticated iff an access token is present.
pub fn is_authenticated(store: &dyn TokenStore) -> bool {
    store.get(TokenKind::Access).is_some()
}
