//! HTTP API for rendering narrated slideshows.

pub mod form;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::fetch::{AssetFetcher, AssetSource};
use crate::fingerprint::random_profile;
use crate::slideshow::{Orchestrator, SlideshowError};

/// Render endpoint path
pub const RENDER_PATH: &str = "/create-full-video-with-subtitles/";

/// Upper bound on a whole multipart request (the subtitle upload dominates)
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared handler state.
pub struct AppState<S> {
    orchestrator: Arc<Orchestrator<S>>,
}

impl<S> AppState<S> {
    /// Creates new API state.
    pub fn new(orchestrator: Arc<Orchestrator<S>>) -> Self {
        Self { orchestrator }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}

/// Creates the service router.
pub fn create_router<S: AssetSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(RENDER_PATH, post(create_video::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// Render a video and stream it back; the workspace goes away with the body.
async fn create_video<S: AssetSource + 'static>(
    State(state): State<AppState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart.map_err(|e| SlideshowError::MalformedForm(e.to_string()))?;
    let assets = form::read_assets(multipart).await?;

    let video = state.orchestrator.render(assets).await?;
    let disposition = content_disposition(video.filename());
    let stream = video.into_stream().await.map_err(SlideshowError::from)?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "video/mp4".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `attachment; filename="..."` restricted to header-safe ASCII
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .filter(|c| *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{ascii}\"")
}

/// Error translated once at the HTTP boundary
#[derive(Debug)]
pub struct ApiError(SlideshowError);

impl From<SlideshowError> for ApiError {
    fn from(err: SlideshowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, detail) = if err.is_client_error() {
            warn!("Rejected request: {err}");
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        } else {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An internal server error occurred: {err}"),
            )
        };

        (status, Json(json!({"detail": detail, "code": err.code()}))).into_response()
    }
}

/// Run the HTTP service until Ctrl-C.
pub async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    let fetcher = AssetFetcher::with_config(&config.download, &random_profile())
        .context("failed to build download client")?;
    let orchestrator = Arc::new(Orchestrator::new(
        config.scratch_root.clone(),
        config.render.clone(),
        fetcher,
    ));
    orchestrator
        .prepare_scratch_root()
        .await
        .with_context(|| format!("failed to create {}", config.scratch_root.display()))?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(
        "Listening on {} (scratch root {})",
        listener.local_addr()?,
        config.scratch_root.display()
    );

    axum::serve(listener, create_router(AppState::new(orchestrator)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_quotes_plain_names() {
        assert_eq!(
            content_disposition("final_video.mp4"),
            "attachment; filename=\"final_video.mp4\""
        );
    }

    #[test]
    fn disposition_replaces_non_ascii() {
        assert_eq!(
            content_disposition("vídeo final.mp4"),
            "attachment; filename=\"v_deo final.mp4\""
        );
    }

    #[test]
    fn malformed_forms_map_to_422() {
        let response = ApiError(SlideshowError::MalformedForm("missing".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn bad_field_values_map_to_500() {
        let response =
            ApiError(SlideshowError::InvalidRequest("bad url".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn pipeline_errors_map_to_500() {
        let response = ApiError(SlideshowError::InsufficientInput { count: 1 }).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
