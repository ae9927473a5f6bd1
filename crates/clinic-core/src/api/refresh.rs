//! One-shot refresh-token exchange run after a 401.

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{TokenKind, TokenStore};

/// Path of the token-refresh endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "auth/jwt/refresh/";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    // Only present when the backend rotates refresh tokens
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
    Succeeded,
    Failed,
}

/// Why a refresh ended in [`RefreshState::Failed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    MissingRefreshToken,
    Rejected(u16),
    Transport(String),
    InvalidResponse(String),
}

/// A single refresh attempt. Create one per 401; it is not reusable once
/// it has reached a terminal state.
pub struct RefreshProtocol<'a> {
    client: &'a Client,
    base_url: &'a Url,
    store: &'a dyn TokenStore,
    state: RefreshState,
}

impl<'a> RefreshProtocol<'a> {
    pub fn new(client: &'a Client, base_url: &'a Url, store: &'a dyn TokenStore) -> Self {
        Self {
            client,
            base_url,
            store,
            state: RefreshState::Idle,
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On success the new access token (and a rotated refresh token, if the
    /// backend returned one) has been written to the store. The store is
    /// never modified on failure; terminating the session is the caller's job.
    pub async fn attempt(&mut self) -> Result<(), RefreshFailure> {
        if self.state != RefreshState::Idle {
            warn!(state = ?self.state, "Refresh protocol reused after completion");
            return Err(self.fail(RefreshFailure::InvalidResponse(
                "refresh already attempted".to_string(),
            )));
        }
        self.state = RefreshState::Refreshing;

        let Some(refresh_token) = self.store.get(TokenKind::Refresh) else {
            debug!("No refresh token stored");
            return Err(self.fail(RefreshFailure::MissingRefreshToken));
        };

        let url = self
            .base_url
            .join(REFRESH_PATH)
            .map_err(|e| self.fail(RefreshFailure::InvalidResponse(e.to_string())))?;

        debug!(url = %url, "Refreshing access token");
        let response = match self
            .client
            .post(url)
            .json(&RefreshRequest {
                refresh: &refresh_token,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.fail(RefreshFailure::Transport(e.to_string()))),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(self.fail(RefreshFailure::Rejected(status.as_u16())));
        }

        let tokens: RefreshResponse = match response.json().await {
            Ok(tokens) => tokens,
            Err(e) => return Err(self.fail(RefreshFailure::InvalidResponse(e.to_string()))),
        };

        self.store.store(TokenKind::Access, &tokens.access);
        if let Some(rotated) = tokens.refresh {
            self.store.store(TokenKind::Refresh, &rotated);
        }

        self.state = RefreshState::Succeeded;
        debug!("Access token refreshed");
        Ok(())
    }

    fn fail(&mut self, failure: RefreshFailure) -> RefreshFailure {
        warn!(reason = ?failure, "Token refresh failed");
        self.state = RefreshState::Failed;
        failure
    }
}
