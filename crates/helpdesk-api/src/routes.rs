//! Router setup with all API routes and middleware.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::error::HelpdeskError;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// How often idle chat sessions and lapsed login tokens are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let port = state.config.api.port;
    let origins: Vec<HeaderValue> = ["127.0.0.1", "localhost"]
        .iter()
        .flat_map(|host| {
            [port, port.saturating_add(1)]
                .into_iter()
                .map(move |p| format!("http://{}:{}", host, p))
        })
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/login", post(handlers::login));

    let limiter = RateLimiter::new(state.config.api.rate_limit_per_sec);

    // Resolution routes are open to anonymous callers but rate limited.
    let resolve_routes = Router::new()
        .route("/ask", post(handlers::ask))
        .route("/chat", post(handlers::chat))
        .route("/chat/{id}", axum::routing::delete(handlers::chat_delete))
        .route("/chat/{id}/select", post(handlers::chat_select))
        .route("/chat/{id}/reject", post(handlers::chat_reject))
        .route("/chat/{id}/history", get(handlers::chat_history))
        .layer(axum::middleware::from_fn(
            crate::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::Extension(limiter));

    // Role checks happen per handler; the layer only requires a login.
    let protected_routes = Router::new()
        .route("/logout", post(handlers::logout))
        .route(
            "/tickets",
            get(handlers::list_tickets).post(handlers::create_ticket),
        )
        .route("/tickets/{index}/status", put(handlers::update_ticket_status))
        .route("/analytics", get(handlers::analytics))
        .route("/kb", get(handlers::kb_list).post(handlers::kb_create))
        .route(
            "/kb/{key}",
            put(handlers::kb_update).delete(handlers::kb_delete),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_login,
        ));

    public_routes
        .merge(resolve_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB global limit
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured port.
///
/// Binds to 127.0.0.1 (localhost only) and sweeps expired chat sessions and
/// login tokens in the background while serving.
pub async fn start_server(config: &HelpdeskConfig, state: AppState) -> Result<(), HelpdeskError> {
    let addr = format!("127.0.0.1:{}", config.api.port);

    let chat = state.chat.clone();
    let logins = state.logins.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match chat.purge_expired() {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, "Purged expired chat sessions"),
                Err(e) => tracing::warn!(error = %e, "Chat session sweep failed"),
            }
            match logins.purge_expired() {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, "Purged expired login tokens"),
                Err(e) => tracing::warn!(error = ?e, "Login token sweep failed"),
            }
        }
    });

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HelpdeskError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| HelpdeskError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
