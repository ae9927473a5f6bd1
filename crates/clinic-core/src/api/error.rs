use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-401 error status from the backend. The body is kept so callers can
    /// surface field-level validation messages.
    #[error("Request failed with status {status}: {body}")]
    Domain { status: StatusCode, body: ErrorBody },

    #[error("Unauthorized - credentials rejected after token renewal")]
    Unauthorized,

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Response body of a failed request, parsed as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Json(serde_json::Value),
    Text(String),
}

impl ErrorBody {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => ErrorBody::Json(value),
            Err(_) => ErrorBody::Text(raw.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ErrorBody::Json(value) => Some(value),
            ErrorBody::Text(_) => None,
        }
    }

    /// Look up a top-level field of a JSON error body, e.g. `detail` or a form field name.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.as_json().and_then(|v| v.get(name))
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBody::Json(value) => write!(f, "{}", Self::truncate(&value.to_string())),
            ErrorBody::Text(text) => write!(f, "{}", Self::truncate(text)),
        }
    }
}

impl ApiError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::Domain {
            status,
            body: ErrorBody::parse(body),
        }
    }

    /// Status code carried by a domain error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Domain { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// True when the session was terminated and the user must log in again
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}
