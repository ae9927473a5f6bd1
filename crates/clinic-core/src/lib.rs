//! Client library for the clinic-management backend.
//!
//! `ApiClient` attaches the stored access token to every request. On a 401 it
//! runs one refresh-token exchange and replays the request once; if renewal is
//! impossible it clears the token store and fires the session-expired callback.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{TokenKind, TokenStore};
pub use config::Config;
