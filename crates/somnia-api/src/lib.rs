//! Somnia API crate - axum HTTP server and route handlers.
//!
//! Exposes the chat turn, conversation history, and analytics queries as a
//! JSON REST API under `/api/v1`, with per-client rate limiting.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
