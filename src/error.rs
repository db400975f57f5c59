//! Error types for the gemini-clean crate.

use std::path::PathBuf;

/// Errors that can occur while loading masks and cleaning images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A reference mask image could not be read or decoded.
    #[error("failed to load alpha mask {}: {source}", path.display())]
    MaskLoad {
        /// Path of the reference image.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: image::ImageError,
    },

    /// A reference mask image does not have the expected footprint.
    #[error("alpha mask must be {expected}x{expected}, got {width}x{height}")]
    MaskDimensions {
        /// Expected square side in pixels.
        expected: u32,
        /// Actual width.
        width: u32,
        /// Actual height.
        height: u32,
    },

    /// The source image could not be opened or decoded.
    #[error("open failed: {source}")]
    Decode {
        /// Path of the source image.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: image::ImageError,
    },

    /// The image is too small to contain a watermark at the expected position.
    #[error("image too small ({width}x{height}) for {wm_size}x{wm_size} watermark")]
    ImageTooSmall {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Expected watermark size in pixels.
        wm_size: u32,
    },

    /// The cleaned image could not be written.
    #[error("save failed: {source}")]
    Save {
        /// Output path that was being written.
        path: PathBuf,
        /// Underlying encode or I/O error.
        #[source]
        source: image::ImageError,
    },

    /// The output directory could not be created.
    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The job was cancelled before all of its work was done.
    #[error("job cancelled")]
    Cancelled,

    /// A background task died before producing a result.
    #[error("background task failed: {0}")]
    Task(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let too_small = Error::ImageTooSmall {
            width: 10,
            height: 20,
            wm_size: 48,
        };
        let msg = too_small.to_string();
        assert!(msg.contains("10x20"));
        assert!(msg.contains("48x48"));

        let dims = Error::MaskDimensions {
            expected: 96,
            width: 48,
            height: 48,
        };
        assert_eq!(dims.to_string(), "alpha mask must be 96x96, got 48x48");
    }

    #[test]
    fn output_dir_error_names_the_directory() {
        let err = Error::OutputDir {
            path: PathBuf::from("/tmp/out"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/out"));
        assert!(msg.contains("denied"));
    }
}
