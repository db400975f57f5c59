//! Remove the visible Gemini watermark via reverse alpha blending.
//!
//! Gemini overlays a semi-transparent sparkle logo near the bottom-right
//! corner of generated images. This crate reverses the alpha-blending
//! equation to recover the original pixels, using 48x48 and 96x96 alpha masks
//! derived from reference captures of the logo on a black background.
//!
//! On top of the engine sit a sequential batch runner, an uploader that pushes
//! cleaned files to a remote host, and a job orchestrator that runs the two
//! phases in the background and reports progress.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use gemini_clean::{ImageCleaner, WatermarkEngine};
//!
//! let engine = WatermarkEngine::load(
//!     Path::new("assets/bg_48.png"),
//!     Path::new("assets/bg_96.png"),
//! )?;
//! engine.clean_file(Path::new("photo.jpg"), Path::new("photo_clean.png"))?;
//! # Ok::<(), gemini_clean::Error>(())
//! ```
//!
//! # Batches
//!
//! ```no_run
//! use std::path::Path;
//! use gemini_clean::{collect_images, run_batch, WatermarkEngine};
//!
//! let engine = WatermarkEngine::load(
//!     Path::new("assets/bg_48.png"),
//!     Path::new("assets/bg_96.png"),
//! )?;
//! let images = collect_images(Path::new("originals"))?;
//! let results = run_batch(&engine, &images, Path::new("clean"), false, |r| {
//!     println!("{}: {}", r.source.display(), r.is_success());
//! })?;
//! println!("{} of {} cleaned", results.iter().filter(|r| r.is_success()).count(), results.len());
//! # Ok::<(), gemini_clean::Error>(())
//! ```

#![deny(missing_docs)]

pub mod batch;
pub mod blending;
pub mod config;
mod engine;
pub mod error;
pub mod job;
pub mod upload;

#[cfg(feature = "server")]
pub mod api;

pub use batch::{collect_images, is_supported_image, run_batch, run_batch_until, CleanResult};
pub use config::{load_config, validate_config, Config, ConfigError};
pub use engine::{
    clean_output_path, save_png, ImageCleaner, Placement, WatermarkEngine, WatermarkSize,
};
pub use error::{Error, Result};
pub use job::{BatchReport, BatchRequest, JobOrchestrator, JobSnapshot, UploadOptions};
pub use upload::{FileUploader, HttpUploader, UploadError};
