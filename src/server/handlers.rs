//! HTTP request handlers for API endpoints

use super::ServerState;
use super::types::{HealthResponse, VersionResponse};
use crate::error::Error;
use crate::{codec, graph};
use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Version endpoint
pub async fn version() -> impl IntoResponse {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Run the uploaded graph over the uploaded image and return the result as PNG.
pub async fn run_pipeline(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    info!(
        image_bytes = upload.file.len(),
        graph_bytes = upload.graph.len(),
        "pipeline request"
    );

    let executor = Arc::clone(&state.executor);
    let png = tokio::task::spawn_blocking(move || -> crate::Result<Vec<u8>> {
        let nodes = graph::parse_graph(&upload.graph)?;
        let frame = codec::decode_image(&upload.file)?;
        let output = executor.execute(frame, &nodes)?;
        codec::encode_png(&output)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("pipeline task failed: {e}")))??;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

struct PipelineUpload {
    file: Bytes,
    graph: Bytes,
}

async fn read_upload(multipart: &mut Multipart) -> Result<PipelineUpload, ApiError> {
    let mut file = None;
    let mut graph = None;

    while let Some(field) = multipart.next_field().await? {
        let slot = match field.name() {
            Some("file") => &mut file,
            Some("graph") | Some("pipeline") => &mut graph,
            other => {
                warn!(field = ?other, "ignoring unexpected multipart field");
                continue;
            }
        };
        *slot = Some(field.bytes().await?);
    }

    match (file, graph) {
        (Some(file), Some(graph)) => Ok(PipelineUpload { file, graph }),
        _ => Err(ApiError::MissingParts),
    }
}

/// Error returned by the pipeline endpoints.
#[derive(Debug)]
pub enum ApiError {
    /// The `file` or `graph` part is absent.
    MissingParts,
    /// The multipart body could not be read.
    Multipart(MultipartError),
    /// The pipeline failed.
    Pipeline(Error),
    /// The server failed outside the pipeline.
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParts => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::MissingParts => "Missing file or graph".to_string(),
            ApiError::Multipart(e) => format!("Error: {}", e.body_text()),
            ApiError::Pipeline(e) => format!("Error: {e}"),
            ApiError::Internal(message) => format!("Error: {message}"),
        };

        if status.is_server_error() {
            error!(%status, error = %body, "pipeline request failed");
        } else {
            warn!(%status, error = %body, "pipeline request rejected");
        }
        (status, body).into_response()
    }
}
