//! # Wikiflow Gateway
//!
//! Axum server exposing the engine to trusted callers:
//! `/trigger-workflow`, `/send-notification`, and the admin endpoints for
//! workflows, tasks, notifications, preferences, and users.

pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, build_router, start};
