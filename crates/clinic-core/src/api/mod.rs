//! REST API client module for the clinic-management backend.
//!
//! This module provides the `ApiClient` for patients, appointments, doctors,
//! specialties and notifications.
//!
//! The API uses JWT bearer token authentication. Access tokens are renewed
//! through the refresh endpoint when the backend answers 401, and the original
//! request is replayed once.

pub mod client;
pub mod error;
pub mod refresh;

pub use client::{ApiClient, SessionExpiredHandler};
pub use error::{ApiError, ErrorBody};
pub use refresh::{RefreshFailure, RefreshProtocol, RefreshState};
