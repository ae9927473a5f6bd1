//! API client for the clinic-management REST backend.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests. A 401 triggers one refresh-token exchange and one replay of the
//! original request; anything else is returned to the caller as-is.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{self, TokenKind, TokenStore};
use crate::config::Config;
use crate::models::{Appointment, Doctor, Notification, Patient, Specialty};

use super::error::ErrorBody;
use super::refresh::RefreshProtocol;
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path of the login endpoint, relative to the API base URL
const LOGIN_PATH: &str = "auth/jwt/create/";

/// Path of the logout endpoint, relative to the API base URL
const LOGOUT_PATH: &str = "auth/logout/";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Route the application sends the user to when the session ends
const DEFAULT_LOGIN_ROUTE: &str = "/";

/// Called once per terminated session with the login route.
pub type SessionExpiredHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

#[derive(Debug, Serialize)]
struct LogoutRequest<'a> {
    refresh: &'a str,
}

/// Outcome of a single HTTP exchange with the backend.
#[derive(Debug)]
enum Attempt {
    Ok(Value),
    AuthExpired,
    Domain { status: StatusCode, body: ErrorBody },
    Transport(reqwest::Error),
    InvalidBody(String),
}

/// Authenticated client for the clinic API.
/// Clone is cheap - the HTTP client, token store and refresh guard are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    store: Arc<dyn TokenStore>,
    login_route: String,
    on_session_expired: SessionExpiredHandler,
    // Serializes refresh attempts across clones of this client
    refresh_guard: Arc<Mutex<()>>,
}

impl ApiClient {
    /// Create a new API client against `base_url`, reading tokens from `store`
    pub fn new(base_url: &str, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, store, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        base_url: &str,
        store: Arc<dyn TokenStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: Self::normalize_base_url(base_url)?,
            store,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            on_session_expired: Arc::new(|_: &str| {}),
            refresh_guard: Arc::new(Mutex::new(())),
        })
    }

    /// Build a client from the application config
    pub fn from_config(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let client = Self::with_timeout(
            &config.api_base_url,
            store,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(client.with_login_route(&config.login_route))
    }

    /// Register the callback fired when the session cannot be renewed
    pub fn on_session_expired<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_session_expired = Arc::new(handler);
        self
    }

    pub fn with_login_route(mut self, route: &str) -> Self {
        self.login_route = route.to_string();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Session is authenticated iff an access token is stored
    pub fn is_authenticated(&self) -> bool {
        auth::is_authenticated(self.store.as_ref())
    }

    /// Ensure the base URL ends with `/` so relative paths join under it
    fn normalize_base_url(base_url: &str) -> Result<Url, ApiError> {
        let mut raw = base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid base URL {}: {}", base_url, e)))
    }

    /// Resolve `path` under the base URL.
    ///
    /// Absolute URLs and `..` segments that leave the base origin or path
    /// prefix are rejected, so the bearer token is only sent to this backend.
    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("invalid path {}: {}", path, e)))?;

        if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path()) {
            warn!(path = path, "Rejected path outside the API base URL");
            return Err(ApiError::InvalidRequest(format!(
                "path {} resolves outside {}",
                path, self.base_url
            )));
        }
        Ok(url)
    }

    fn auth_headers(token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("access token is not a valid header".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    // ===== Session =====

    /// Exchange username and password for a token pair and store both tokens
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let url = self.url(LOGIN_PATH)?;

        let response = self
            .client
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Login rejected");
            return Err(ApiError::from_status(status, &body));
        }

        let tokens: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("login response: {}", e)))?;

        self.store.store(TokenKind::Access, &tokens.access);
        self.store.store(TokenKind::Refresh, &tokens.refresh);
        info!(username = username, "Logged in");
        Ok(())
    }

    /// Revoke the refresh token on the backend and clear local tokens.
    ///
    /// Tokens are cleared even if the backend call fails. The session-expired
    /// callback is not fired for a user-initiated logout.
    pub async fn logout(&self) {
        if let Some(refresh) = self.store.get(TokenKind::Refresh) {
            if let Err(e) = self.revoke(&refresh).await {
                warn!(error = %e, "Logout request failed; clearing local session anyway");
            }
        }
        self.store.clear();
        info!("Logged out");
    }

    async fn revoke(&self, refresh: &str) -> Result<(), ApiError> {
        let url = self.url(LOGOUT_PATH)?;
        let access = self.store.get(TokenKind::Access);

        let response = self
            .client
            .post(url)
            .headers(Self::auth_headers(access.as_deref())?)
            .json(&LogoutRequest { refresh })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    // ===== Authenticated Requests =====

    /// Issue an authenticated request and return the parsed JSON body.
    ///
    /// An empty success body (e.g. 204) is returned as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = self.url(path)?;
        let sent_token = self.store.get(TokenKind::Access);

        match self.send(&method, &url, body, sent_token.as_deref()).await? {
            Attempt::Ok(value) => return Ok(value),
            Attempt::Domain { status, body } => return Err(ApiError::Domain { status, body }),
            Attempt::Transport(e) => return Err(ApiError::Network(e)),
            Attempt::InvalidBody(msg) => return Err(ApiError::InvalidResponse(msg)),
            Attempt::AuthExpired => {
                debug!(method = %method, url = %url, "Access token rejected");
            }
        }

        self.renew_session(sent_token.as_deref()).await?;

        // Replay exactly once with whatever token the refresh installed
        let renewed = self.store.get(TokenKind::Access);
        match self.send(&method, &url, body, renewed.as_deref()).await? {
            Attempt::Ok(value) => Ok(value),
            Attempt::Domain { status, body } => Err(ApiError::Domain { status, body }),
            Attempt::Transport(e) => Err(ApiError::Network(e)),
            Attempt::InvalidBody(msg) => Err(ApiError::InvalidResponse(msg)),
            Attempt::AuthExpired => {
                warn!(method = %method, url = %url, "Renewed access token rejected");
                Err(ApiError::Unauthorized)
            }
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Attempt, ApiError> {
        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(Self::auth_headers(token)?);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Ok(Attempt::Transport(e)),
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::AuthExpired);
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Ok(Attempt::Transport(e)),
        };

        if !status.is_success() {
            debug!(status = %status, url = %url, "Request failed");
            return Ok(Attempt::Domain {
                status,
                body: ErrorBody::parse(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Attempt::Ok(Value::Null));
        }
        Ok(match serde_json::from_str(&text) {
            Ok(value) => Attempt::Ok(value),
            Err(e) => Attempt::InvalidBody(format!("{} from {}", e, url)),
        })
    }

    /// Run the refresh protocol after a 401, or terminate the session.
    ///
    /// Refreshes are serialized. If another request already installed a new
    /// access token while this one waited, that token is reused instead of
    /// spending the refresh token a second time. If the session was already
    /// terminated while this one waited, it fails without firing the
    /// session-expired callback again.
    async fn renew_session(&self, rejected_token: Option<&str>) -> Result<(), ApiError> {
        let _guard = self.refresh_guard.lock().await;

        let current = self.store.get(TokenKind::Access);
        if current.is_some() && current.as_deref() != rejected_token {
            debug!("Access token already renewed by a concurrent request");
            return Ok(());
        }
        if current.is_none() && rejected_token.is_some() && self.store.get(TokenKind::Refresh).is_none() {
            debug!("Session already terminated by a concurrent request");
            return Err(ApiError::SessionExpired);
        }

        let mut protocol = RefreshProtocol::new(&self.client, &self.base_url, self.store.as_ref());
        match protocol.attempt().await {
            Ok(()) => Ok(()),
            Err(_) => {
                self.terminate_session();
                Err(ApiError::SessionExpired)
            }
        }
    }

    fn terminate_session(&self) {
        self.store.clear();
        info!(login_route = %self.login_route, "Session expired, tokens cleared");
        (self.on_session_expired)(&self.login_route);
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let value = self.request(method, path, body).await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
    }

    fn to_body<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_as(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let body = Self::to_body(body)?;
        self.request_as(Method::POST, path, Some(&body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let body = Self::to_body(body)?;
        self.request_as(Method::PUT, path, Some(&body)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let body = Self::to_body(body)?;
        self.request_as(Method::PATCH, path, Some(&body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request(Method::DELETE, path, None).await?;
        Ok(())
    }

    // ===== Data Fetching Methods =====

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let response: ListResponse<T> = self.get(path).await?;
        let items = response.into_items();
        debug!(path = path, count = items.len(), "Fetched list");
        Ok(items)
    }

    pub async fn fetch_patients(&self) -> Result<Vec<Patient>, ApiError> {
        self.fetch_list("patients/").await
    }

    pub async fn fetch_patient(&self, id: i64) -> Result<Patient, ApiError> {
        self.get(&format!("patients/{}/", id)).await
    }

    pub async fn fetch_appointments(&self) -> Result<Vec<Appointment>, ApiError> {
        self.fetch_list("appointments/").await
    }

    pub async fn fetch_doctors(&self) -> Result<Vec<Doctor>, ApiError> {
        self.fetch_list("doctors/").await
    }

    pub async fn fetch_specialties(&self) -> Result<Vec<Specialty>, ApiError> {
        self.fetch_list("specialties/").await
    }

    pub async fn fetch_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.fetch_list("notifications/").await
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<Notification, ApiError> {
        self.patch(&format!("notifications/{}/", id), &serde_json::json!({ "read": true }))
            .await
    }
}

// Internal API response types for parsing

/// List endpoints return either a bare array or a paginated envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Bare(Vec<T>),
    Page { results: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Page { results } => results,
            ListResponse::Bare(items) => items,
        }
    }
}
