//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the audio-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the audio-dl REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "audio-dl REST API",
        version = "0.1.0",
        description = "Fetches audio from media URLs via an external downloader and streams the result",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        crate::api::routes::download_audio,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(
        schemas(
            crate::api::routes::DownloadRequest,
            crate::error::ApiError,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "download", description = "Audio acquisition"),
        (name = "system", description = "Health and documentation")
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_includes_all_routes() {
        let spec = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = spec["paths"].as_object().unwrap();

        assert!(paths.contains_key("/download"));
        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/openapi.json"));
    }

    #[test]
    fn test_openapi_spec_includes_error_schema() {
        let spec = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schemas = spec["components"]["schemas"].as_object().unwrap();

        assert!(schemas.contains_key("ApiError"));
        assert!(schemas.contains_key("DownloadRequest"));
    }
}
