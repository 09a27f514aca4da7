//! REST API server module
//!
//! Provides the HTTP surface for the acquisition pipeline: a download
//! endpoint that streams audio artifacts, a health check, and OpenAPI
//! documentation.

use crate::{AcquisitionPipeline, Config, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `POST /download` - Fetch audio from a media URL and stream it back
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(pipeline: Arc<AcquisitionPipeline>, config: Arc<Config>) -> Router {
    let state = AppState::new(pipeline, config.clone());

    let router = Router::new()
        .route("/download", post(routes::download_audio))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state)
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// Allows the specified origins (or any origin for "*"), all methods, and
/// all headers for cross-origin requests.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Binds a TCP listener and serves the router until a termination signal
/// arrives, then signals the pipeline so in-flight executions terminate
/// promptly and their workspaces are reclaimed.
pub async fn start_api_server(pipeline: Arc<AcquisitionPipeline>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    let app = create_router(pipeline.clone(), config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            crate::wait_for_signal().await;
            pipeline.shutdown();
        })
        .await
        .map_err(|e| crate::Error::ApiServer(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
