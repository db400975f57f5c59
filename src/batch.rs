//! Sequential batch cleaning.
//!
//! Every image in a batch is processed in input order, one at a time. A
//! failure on one image is recorded and the runner moves on to the next.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::engine::{clean_output_path, ImageCleaner};
use crate::error::{Error, Result};

/// Outcome of cleaning a single source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanResult {
    /// Source image path.
    pub source: PathBuf,
    /// Output path on success, failure reason otherwise.
    pub outcome: std::result::Result<PathBuf, String>,
}

impl CleanResult {
    /// Whether the image was cleaned and written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Output path of a successful clean.
    #[must_use]
    pub fn output(&self) -> Option<&Path> {
        self.outcome.as_ref().ok().map(PathBuf::as_path)
    }
}

/// Clean every image in `images`, writing `<stem>_clean.png` into `output_dir`.
///
/// `on_item` is invoked after each image with its result, before the next
/// image is started. Results are returned in input order.
///
/// When `delete_source` is set, each successfully cleaned source is removed;
/// a failed deletion is logged and does not affect the result.
///
/// # Errors
///
/// Only a failure to create `output_dir` aborts the run, since no image could
/// be written. Per-image failures are reported through [`CleanResult`].
pub fn run_batch<F>(
    cleaner: &dyn ImageCleaner,
    images: &[PathBuf],
    output_dir: &Path,
    delete_source: bool,
    on_item: F,
) -> Result<Vec<CleanResult>>
where
    F: FnMut(&CleanResult),
{
    let never = AtomicBool::new(false);
    run_batch_until(cleaner, images, output_dir, delete_source, &never, on_item)
}

/// [`run_batch`] that stops before the next image once `cancel` is set.
///
/// The image in progress when `cancel` is raised is finished and reported;
/// nothing after it is touched. Only the processed images have results.
///
/// # Errors
///
/// Same as [`run_batch`].
pub fn run_batch_until<F>(
    cleaner: &dyn ImageCleaner,
    images: &[PathBuf],
    output_dir: &Path,
    delete_source: bool,
    cancel: &AtomicBool,
    mut on_item: F,
) -> Result<Vec<CleanResult>>
where
    F: FnMut(&CleanResult),
{
    let mut results = Vec::with_capacity(images.len());
    let mut output_ready = false;

    for source in images {
        if cancel.load(Ordering::Relaxed) {
            info!(remaining = images.len() - results.len(), "batch cancelled");
            break;
        }
        if !output_ready {
            std::fs::create_dir_all(output_dir).map_err(|e| Error::OutputDir {
                path: output_dir.to_path_buf(),
                source: e,
            })?;
            output_ready = true;
        }

        let output = clean_output_path(source, output_dir);
        let outcome = match cleaner.clean_file(source, &output) {
            Ok(()) => {
                info!(source = %source.display(), output = %output.display(), "cleaned");
                if delete_source {
                    if let Err(e) = std::fs::remove_file(source) {
                        warn!(source = %source.display(), error = %e, "failed to delete original");
                    }
                }
                Ok(output)
            }
            Err(e) => {
                warn!(source = %source.display(), error = %e, "clean failed");
                Err(e.to_string())
            }
        };

        let result = CleanResult {
            source: source.clone(),
            outcome,
        };
        on_item(&result);
        results.push(result);
    }

    Ok(results)
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp"
        ),
        None => false,
    }
}

/// List the supported images directly inside `dir`, sorted by path.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be read.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| is_supported_image(p))
        .collect();
    images.sort();
    Ok(images)
}
