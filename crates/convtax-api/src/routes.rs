//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use convtax_core::config::ConvTaxConfig;
use convtax_core::error::ConvTaxError;

use crate::handlers;
use crate::state::AppState;

/// Upper bound for an uploaded recording.
const AUDIO_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let lang_routes = Router::new()
        .route("/lang/text", post(handlers::text_intent))
        .route(
            "/lang/audio_upload",
            post(handlers::audio_upload).layer(DefaultBodyLimit::max(AUDIO_BODY_LIMIT)),
        )
        .route("/lang/history", get(handlers::history))
        .route(
            "/lang/notifications",
            get(handlers::list_notifications).post(handlers::create_notification),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .merge(lang_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind to `general.host:general.port` and serve until the process exits.
pub async fn start_server(config: &ConvTaxConfig, state: AppState) -> Result<(), ConvTaxError> {
    let addr = format!("{}:{}", config.general.host, config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ConvTaxError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| ConvTaxError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
