//! Download handler: one URL in, one audio stream out.

use crate::api::AppState;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response headers attached to a streamed artifact
type ArtifactHeaders = [(header::HeaderName, String); 3];

/// Request body for the download endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Media URL to fetch audio from
    #[schema(example = "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    pub url: String,
}

/// POST /download - Fetch audio from a media URL
///
/// Runs the full acquisition pipeline and streams the resulting audio
/// artifact back. The artifact's workspace is removed once the response body
/// has been fully sent (or the client disconnects), never before.
#[utoipa::path(
    post,
    path = "/download",
    tag = "download",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Audio artifact stream", content_type = "audio/*"),
        (status = 408, description = "Download exceeded the deadline", body = crate::ApiError),
        (status = 422, description = "Malformed or unsupported URL", body = crate::ApiError),
        (status = 502, description = "External tool reported failure", body = crate::ApiError),
        (status = 503, description = "Too many concurrent downloads", body = crate::ApiError),
        (status = 500, description = "Internal server error", body = crate::ApiError)
    )
)]
pub async fn download_audio(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Response {
    let stream = match state.pipeline.acquire(&request.url).await {
        Ok(stream) => stream,
        Err(e) => return e.into_response(),
    };

    let artifact = stream.artifact().clone();

    let headers: ArtifactHeaders = [
        (header::CONTENT_TYPE, artifact.media_type.to_string()),
        (header::CONTENT_LENGTH, artifact.len.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        ),
    ];

    (StatusCode::OK, headers, Body::from_stream(stream)).into_response()
}
