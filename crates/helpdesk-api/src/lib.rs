//! Help desk API crate - axum HTTP server and route handlers.
//!
//! Exposes stateless question answering, conversational chat with
//! disambiguation, login, ticket submission and management, ticket
//! analytics and the knowledge-base editor.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
