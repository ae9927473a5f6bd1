use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// The two bearer credentials kept by a [`TokenStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::Access, TokenKind::Refresh];

    /// Persistence key for this token
    pub fn key(&self) -> &'static str {
        match self {
            TokenKind::Access => "accessToken",
            TokenKind::Refresh => "refreshToken",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Synchronous key-value storage for the access and refresh tokens.
///
/// Implementations never surface errors: a backend that cannot be read
/// reports the token as absent, and failed writes are logged.
pub trait TokenStore: Send + Sync {
    /// Overwrite the value stored for `kind`
    fn store(&self, kind: TokenKind, value: &str);

    /// Current value for `kind`, or `None` if never set or cleared
    fn get(&self, kind: TokenKind) -> Option<String>;

    /// Remove both tokens
    fn clear(&self);
}

/// In-process token store. Tokens live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<TokenKind, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with both tokens
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let store = Self::new();
        store.store(TokenKind::Access, access);
        store.store(TokenKind::Refresh, refresh);
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn store(&self, kind: TokenKind, value: &str) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(kind, value.to_string());
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.get(&kind).cloned()
    }

    fn clear(&self) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.clear();
    }
}
