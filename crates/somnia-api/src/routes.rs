//! Router setup with all API routes and middleware.

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use somnia_core::config::SomniaConfig;
use somnia_core::error::SomniaError;

use crate::handlers;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let port = state.config.general.port;
    let origins: Vec<HeaderValue> = ["127.0.0.1", "localhost"]
        .iter()
        .filter_map(|host| format!("http://{}:{}", host, port).parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let api = Router::new()
        .route("/chat", post(handlers::chat))
        .route(
            "/chat/conversation/{id}",
            get(handlers::conversation_history),
        )
        .route("/chat/topics", get(handlers::topics))
        .route("/analytics/overview", get(handlers::analytics_overview))
        .route("/analytics/topics", get(handlers::analytics_topics))
        .route("/analytics/users/{user_id}", get(handlers::analytics_user))
        .route(
            "/analytics/conversations/{id}",
            get(handlers::analytics_conversation),
        )
        .route("/analytics/trends", get(handlers::analytics_trends))
        .route("/analytics/export", get(handlers::analytics_export));

    let api = if state.config.rate_limit.enabled {
        let limiter = RateLimiter::from_config(&state.config.rate_limit);
        api.layer(axum::middleware::from_fn(
            crate::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::Extension(limiter))
    } else {
        api
    };

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and serve until the process exits.
pub async fn start_server(config: &SomniaConfig, state: AppState) -> Result<(), SomniaError> {
    let addr = format!("{}:{}", config.general.host, config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SomniaError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
