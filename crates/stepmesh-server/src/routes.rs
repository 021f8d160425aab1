//! HTTP routes and the per-request conversion flow.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use stepmesh_kernel::{MeshFormat, TessellationParams};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::cors::create_cors_layer;
use crate::delivery::{deliver, stream_file, DeliveryMode};
use crate::engine::{run_conversion, MeshConverter};
use crate::error::ServiceError;
use crate::store::ArtifactStore;
use crate::validator::{self, ValidationError};

/// Multipart field carrying the upload.
const FILE_FIELD: &str = "file";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ArtifactStore>,
    pub converter: Arc<dyn MeshConverter>,
    pub params: TessellationParams,
    pub conversion_timeout: Duration,
    pub max_upload_bytes: usize,
}

/// Where a request is in its lifecycle, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validated,
    Persisted,
    Converted,
    Delivered,
    Failed,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestState::Received => "received",
            RequestState::Validated => "validated",
            RequestState::Persisted => "persisted",
            RequestState::Converted => "converted",
            RequestState::Delivered => "delivered",
            RequestState::Failed => "failed",
        })
    }
}

/// Query string of the conversion endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertQuery {
    pub format: Option<String>,
}

impl ConvertQuery {
    fn mesh_format(&self) -> Result<MeshFormat, ServiceError> {
        match self.format.as_deref() {
            None | Some("") => Ok(MeshFormat::default()),
            Some(f) => f.parse().map_err(|_| {
                ServiceError::Validation(format!(
                    "Invalid format '{f}'. Supported formats: stl, glb"
                ))
            }),
        }
    }
}

/// Build the service router.
pub fn router(state: AppState, config: &ServiceConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer(&config.cors));

    Router::new()
        .route("/health", get(health_check))
        .route("/convert", post(convert_inline))
        .route("/convert-url", post(convert_deferred))
        .route("/download/:filename", get(download))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(middleware)
        .with_state(state)
}

/// Liveness probe
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "message": "STP to STL conversion server is running"
        })),
    )
}

async fn convert_inline(
    State(state): State<AppState>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServiceError> {
    handle_conversion(state, query, multipart, DeliveryMode::Inline).await
}

async fn convert_deferred(
    State(state): State<AppState>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServiceError> {
    handle_conversion(state, query, multipart, DeliveryMode::Deferred).await
}

/// Fetch a deferred mesh. The first fetch claims it; later ones get 404.
async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ServiceError> {
    let format = filename
        .rsplit_once('.')
        .and_then(|(_, ext)| MeshFormat::from_extension(ext))
        .ok_or(ServiceError::NotFound)?;
    let guard = state.store.claim(&filename).await.map_err(|e| {
        debug!(filename = %filename, error = %e, "Download not available");
        ServiceError::from(e)
    })?;
    info!(filename = %filename, "Serving deferred download");
    stream_file(guard, &filename, format).await
}

async fn handle_conversion(
    state: AppState,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
    mode: DeliveryMode,
) -> Result<Response, ServiceError> {
    let request_id = Uuid::new_v4();
    debug!(request_id = %request_id, state = %RequestState::Received, mode = ?mode, "Conversion request");

    let result = process(&state, request_id, query, multipart, mode).await;
    match &result {
        Ok(_) => info!(request_id = %request_id, state = %RequestState::Delivered, mode = ?mode, "Request complete"),
        Err(e) => warn!(request_id = %request_id, state = %RequestState::Failed, error = %e, "Request failed"),
    }
    result
}

async fn process(
    state: &AppState,
    request_id: Uuid,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
    mode: DeliveryMode,
) -> Result<Response, ServiceError> {
    let Query(query) = query.map_err(|e| ServiceError::Validation(e.body_text()))?;
    let format = query.mesh_format()?;
    let multipart = multipart.map_err(|_| ValidationError::MissingFile)?;

    let (filename, data) = read_upload(multipart, state.max_upload_bytes).await?;
    debug!(
        request_id = %request_id,
        state = %RequestState::Validated,
        filename = %filename,
        bytes = data.len(),
        "Upload accepted"
    );

    let paths = state.store.allocate_paths(request_id, &filename, format);
    let input = state.store.persist(&data, &paths.input).await?;
    drop(data);
    debug!(request_id = %request_id, state = %RequestState::Persisted, path = %paths.input.display(), "Upload stored");

    let output = state.store.guard(&paths.output);
    let (summary, (input, output)) = run_conversion(
        Arc::clone(&state.converter),
        &paths.input,
        &paths.output,
        state.params,
        format,
        state.conversion_timeout,
        (input, output),
    )
    .await?;
    drop(input);
    info!(
        request_id = %request_id,
        state = %RequestState::Converted,
        filename = %paths.download_name,
        solids = summary.solids,
        triangles = summary.triangles,
        bytes = summary.bytes,
        "Conversion finished"
    );

    deliver(mode, output, &paths.download_name, format).await
}

/// Read the `file` field: its declared filename and contents.
async fn read_upload(
    mut multipart: Multipart,
    limit: usize,
) -> Result<(String, Bytes), ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = match field.file_name() {
            Some(name) => name.to_string(),
            None => return Err(ValidationError::MissingFile.into()),
        };
        // Reject before buffering the body.
        validator::validate(Some(filename.as_str()))?;
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        return Ok((filename, data));
    }
    Err(ValidationError::MissingFile.into())
}

fn multipart_error(err: MultipartError, limit: usize) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge { limit }
    } else {
        ServiceError::Validation(format!("Invalid upload: {}", err.body_text()))
    }
}
