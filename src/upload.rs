//! Pushing cleaned files to a remote image host.
//!
//! The host accepts a multipart POST with a single `file` part and answers
//! with either a bare list of records or an object wrapping that list under
//! `data`. The first record's `src` is the uploaded file's location, which may
//! be relative to the host.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{multipart, Client, Url};
use serde::Deserialize;
use tracing::{info, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of extra attempts after a failed upload.
pub const DEFAULT_RETRIES: u32 = 1;

/// Errors that can occur while uploading a single file.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The local file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The request did not complete within the configured timeout.
    #[error("upload timed out")]
    Timeout,

    /// The request failed at the transport level.
    #[error("request failed: {0}")]
    Request(String),

    /// The host answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The response body was not in either accepted shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The response did not name the uploaded file.
    #[error("missing src")]
    MissingSource,

    /// The upload URL could not be parsed.
    #[error("invalid upload url: {0}")]
    InvalidUrl(String),
}

impl UploadError {
    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// One record in the host's response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UploadRecord {
    /// Location of the stored file, absolute or relative to the host.
    #[serde(default)]
    pub src: Option<String>,
}

/// The two response shapes the host is known to produce.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum UploadResponse {
    /// `[{"src": ...}, ...]`
    Records(Vec<UploadRecord>),
    /// `{"data": [{"src": ...}, ...]}`
    Wrapped {
        /// Records wrapped by the host.
        #[serde(default)]
        data: Vec<UploadRecord>,
    },
}

impl UploadResponse {
    /// The first record's `src`, if present and non-empty.
    #[must_use]
    pub fn first_source(&self) -> Option<&str> {
        let records = match self {
            Self::Records(records) | Self::Wrapped { data: records } => records,
        };
        records
            .first()
            .and_then(|r| r.src.as_deref())
            .filter(|src| !src.is_empty())
    }
}

/// Resolve a `src` returned by the host against the upload URL.
///
/// Absolute `http(s)` sources are returned verbatim; anything else is joined to
/// the scheme, host and port of `upload_url`.
///
/// # Errors
///
/// Returns [`UploadError::InvalidUrl`] if `upload_url` has no host.
pub fn build_full_url(upload_url: &str, src: &str) -> Result<String, UploadError> {
    if src.starts_with("http://") || src.starts_with("https://") {
        return Ok(src.to_string());
    }

    let parsed = Url::parse(upload_url).map_err(|e| UploadError::InvalidUrl(e.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| UploadError::InvalidUrl(upload_url.to_string()))?;

    let mut url = format!("{}://{host}", parsed.scheme());
    if let Some(port) = parsed.port() {
        url.push_str(&format!(":{port}"));
    }
    if !src.starts_with('/') {
        url.push('/');
    }
    url.push_str(src);
    Ok(url)
}

/// Uploads one local file and returns its public URL.
#[async_trait]
pub trait FileUploader: Send + Sync {
    /// Upload `path` to `upload_url`.
    ///
    /// # Errors
    ///
    /// Returns an [`UploadError`] once the retry budget is exhausted.
    async fn upload(&self, upload_url: &str, path: &Path) -> Result<String, UploadError>;
}

/// [`FileUploader`] backed by a multipart HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    retries: u32,
}

impl HttpUploader {
    /// Create an uploader with a per-request timeout and retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Request`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, retries: u32) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Request(e.to_string()))?;

        Ok(Self { client, retries })
    }

    async fn attempt(
        &self,
        upload_url: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<String, UploadError> {
        let part = multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("image/png")
            .map_err(|e| UploadError::Request(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::MalformedResponse(e.to_string()))?;
        let src = body.first_source().ok_or(UploadError::MissingSource)?;

        build_full_url(upload_url, src)
    }
}

#[async_trait]
impl FileUploader for HttpUploader {
    async fn upload(&self, upload_url: &str, path: &Path) -> Result<String, UploadError> {
        let data = tokio::fs::read(path).await.map_err(|e| UploadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let size = data.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let start = Instant::now();
            let result = self.attempt(upload_url, &file_name, data.clone()).await;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(url) => {
                    info!(attempt, duration_ms, size, file = %file_name, "upload ok");
                    return Ok(url);
                }
                Err(e) => {
                    info!(attempt, duration_ms, size, file = %file_name, error = %e, "upload attempt failed");
                    if attempt > self.retries {
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Outcome of uploading one cleaned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Local file that was uploaded.
    pub path: PathBuf,
    /// Remote URL on success, failure reason otherwise.
    pub outcome: Result<String, String>,
    /// Whether the local file was removed after a successful upload.
    pub deleted: bool,
}

impl UploadResult {
    /// Whether the upload succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Upload a single file, optionally deleting it afterwards.
///
/// A failed deletion is logged and reported through `deleted`; it never turns
/// a successful upload into a failure.
pub async fn upload_one(
    uploader: &dyn FileUploader,
    upload_url: &str,
    path: &Path,
    delete_after: bool,
) -> UploadResult {
    let outcome = uploader
        .upload(upload_url, path)
        .await
        .map_err(|e| e.to_string());

    let mut deleted = false;
    if outcome.is_ok() && delete_after {
        match tokio::fs::remove_file(path).await {
            Ok(()) => deleted = true,
            Err(e) => warn!(file = %path.display(), error = %e, "failed to delete uploaded file"),
        }
    }

    UploadResult {
        path: path.to_path_buf(),
        outcome,
        deleted,
    }
}

/// Upload every path in order, one at a time.
///
/// `on_item` is invoked after each upload completes, before the next starts.
/// Once `cancel` is set no further upload is started; only the attempted
/// paths have results.
pub async fn run_uploads<F>(
    uploader: &dyn FileUploader,
    upload_url: &str,
    paths: &[PathBuf],
    delete_after: bool,
    cancel: &AtomicBool,
    mut on_item: F,
) -> Vec<UploadResult>
where
    F: FnMut(&UploadResult),
{
    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        if cancel.load(Ordering::Relaxed) {
            info!(remaining = paths.len() - results.len(), "uploads cancelled");
            break;
        }
        let result = upload_one(uploader, upload_url, path, delete_after).await;
        if let Err(e) = &result.outcome {
            warn!(file = %path.display(), error = %e, "upload failed");
        }
        on_item(&result);
        results.push(result);
    }
    results
}
