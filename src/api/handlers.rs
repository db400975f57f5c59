//! Request handlers and their wire types.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::sandbox::{ensure_input_dir, resolve_subdir};
use super::{ApiError, AppState};
use crate::batch::collect_images;
use crate::job::{BatchReport, BatchRequest, JobSnapshot, UploadOptions};

/// Body of `POST /clean` and `POST /clean/start`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CleanRequest {
    /// Input directory relative to the storage root.
    pub input_subdir: Option<String>,
    /// Output directory relative to the storage root.
    pub output_subdir: Option<String>,
    /// Remove each original once it has been cleaned.
    pub delete_originals: bool,
    /// Upload every cleaned file after the clean phase.
    pub upload_enabled: bool,
    /// Upload endpoint; required when `upload_enabled` is set.
    pub upload_url: Option<String>,
    /// Remove each cleaned file once it has been uploaded.
    pub delete_cleaned: bool,
}

/// Response of `POST /clean`.
#[derive(Debug, Serialize)]
pub struct CleanResponse {
    /// Resolved output directory.
    pub output_dir: String,
    /// Batch counters and uploaded URLs.
    #[serde(flatten)]
    pub report: BatchReport,
}

/// Response of `POST /clean/start`.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    /// Identifier to poll with `GET /clean/status`.
    pub job_id: String,
}

/// Query of `GET /clean/status`.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Job to look up.
    pub job_id: String,
}

/// Body of `POST /upload-test`.
#[derive(Debug, Deserialize)]
pub struct UploadTestRequest {
    /// Upload endpoint to try.
    #[serde(default)]
    pub upload_url: String,
}

/// Response of `POST /upload-test`.
#[derive(Debug, Serialize)]
pub struct UploadTestResponse {
    /// Always `true`; failures are reported as errors.
    pub ok: bool,
    /// Public URL of the uploaded test image.
    pub url: String,
}

/// Response of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `true` while the service is up.
    pub ok: bool,
}

/// Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Run a batch and wait for its report.
pub async fn clean(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CleanRequest>,
) -> Result<Json<CleanResponse>, ApiError> {
    let batch = prepare_batch(&state, request)?;
    let output_dir = batch.output_dir.display().to_string();

    let report = state
        .orchestrator()
        .run(batch)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(CleanResponse { output_dir, report }))
}

/// Start a background job.
pub async fn clean_start(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CleanRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let batch = prepare_batch(&state, request)?;
    let job_id = state.orchestrator().start(batch);
    Ok(Json(StartResponse { job_id }))
}

/// Latest snapshot of a background job.
pub async fn clean_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<JobSnapshot>, ApiError> {
    state
        .orchestrator()
        .status(&query.job_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("job not found".to_string()))
}

/// Upload the bundled test image to check an endpoint.
pub async fn upload_test(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadTestRequest>,
) -> Result<Json<UploadTestResponse>, ApiError> {
    let upload_url = request.upload_url.trim();
    if upload_url.is_empty() {
        return Err(ApiError::BadRequest("upload_url is required".to_string()));
    }

    let test_image = state.config().assets.test_image_path();
    if !test_image.is_file() {
        return Err(ApiError::Internal(format!(
            "test image missing: {}",
            test_image.display()
        )));
    }

    match state
        .orchestrator()
        .uploader()
        .upload(upload_url, &test_image)
        .await
    {
        Ok(url) => {
            info!(url = %url, "upload test ok");
            Ok(Json(UploadTestResponse { ok: true, url }))
        }
        Err(e) => {
            warn!(upload_url, error = %e, "upload test failed");
            Err(ApiError::BadRequest(format!("upload failed: {e}")))
        }
    }
}

/// Validate a clean request and turn it into a batch.
///
/// Nothing is started if this fails.
fn prepare_batch(state: &AppState, request: CleanRequest) -> Result<BatchRequest, ApiError> {
    let upload = if request.upload_enabled {
        let url = request
            .upload_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ApiError::BadRequest("upload_url is required when upload is enabled".to_string())
            })?;
        Some(UploadOptions {
            url: url.to_string(),
            delete_after: request.delete_cleaned,
        })
    } else {
        None
    };

    let storage = &state.config().storage;
    let input_dir = resolve_subdir(
        &storage.base_dir,
        subdir_or(request.input_subdir.as_deref(), &storage.default_input),
    )?;
    let output_dir = resolve_subdir(
        &storage.base_dir,
        subdir_or(request.output_subdir.as_deref(), &storage.default_output),
    )?;

    ensure_input_dir(&input_dir)?;
    let images: Vec<PathBuf> =
        collect_images(&input_dir).map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        images = images.len(),
        upload = upload.is_some(),
        "clean request accepted"
    );

    Ok(BatchRequest {
        images,
        output_dir,
        delete_originals: request.delete_originals,
        upload,
    })
}

fn subdir_or<'a>(requested: Option<&'a str>, default: &'a str) -> &'a str {
    requested.filter(|s| !s.is_empty()).unwrap_or(default)
}
