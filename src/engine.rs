//! Core watermark removal engine.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};

use crate::blending::{self, AlphaMask, LOGO_VALUE};
use crate::error::{Error, Result};

/// Watermark size classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkSize {
    /// 48x48 watermark, 32px margin (images where either dimension <= 1024).
    Small,
    /// 96x96 watermark, 64px margin (images where both dimensions > 1024).
    Large,
}

impl WatermarkSize {
    /// Determine watermark size based on image dimensions.
    ///
    /// - **Large** (96x96, 64px margin): both width AND height > 1024
    /// - **Small** (48x48, 32px margin): otherwise (including 1024x1024)
    #[must_use]
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        if width > 1024 && height > 1024 {
            Self::Large
        } else {
            Self::Small
        }
    }

    /// Side length of the square footprint in pixels.
    #[must_use]
    pub fn side(self) -> u32 {
        match self {
            Self::Small => 48,
            Self::Large => 96,
        }
    }

    /// Inset from the right and bottom image edges in pixels.
    #[must_use]
    pub fn margin(self) -> u32 {
        match self {
            Self::Small => 32,
            Self::Large => 64,
        }
    }
}

/// Where the watermark footprint sits inside a particular image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Footprint size class.
    pub size: WatermarkSize,
    /// X coordinate of the footprint's top-left corner.
    pub x: u32,
    /// Y coordinate of the footprint's top-left corner.
    pub y: u32,
}

impl Placement {
    /// Compute the footprint position for an image of the given dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageTooSmall`] when the footprint plus its inset does
    /// not fit on either axis.
    pub fn for_dimensions(width: u32, height: u32) -> Result<Self> {
        let size = WatermarkSize::for_dimensions(width, height);
        let reach = size.side() + size.margin();

        match (width.checked_sub(reach), height.checked_sub(reach)) {
            (Some(x), Some(y)) => Ok(Self { size, x, y }),
            _ => Err(Error::ImageTooSmall {
                width,
                height,
                wm_size: size.side(),
            }),
        }
    }
}

/// Something that can turn one watermarked file into a cleaned output file.
///
/// [`WatermarkEngine`] is the production implementation; the seam lets the
/// batch and job layers be exercised without real images.
pub trait ImageCleaner: Send + Sync {
    /// Clean `input` and write the result to `output`.
    ///
    /// The source file is never modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be decoded, is too small for the
    /// footprint, or the output cannot be written.
    fn clean_file(&self, input: &Path, output: &Path) -> Result<()>;
}

/// The watermark engine holding pre-computed alpha masks.
///
/// Create once at startup and share across every batch and job.
#[derive(Debug)]
pub struct WatermarkEngine {
    mask_small: AlphaMask,
    mask_large: AlphaMask,
    logo_value: f32,
}

impl WatermarkEngine {
    /// Create an engine from the 48x48 and 96x96 masks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaskDimensions`] if either mask has the wrong size.
    pub fn new(mask_small: AlphaMask, mask_large: AlphaMask) -> Result<Self> {
        check_dimensions(&mask_small, WatermarkSize::Small)?;
        check_dimensions(&mask_large, WatermarkSize::Large)?;

        Ok(Self {
            mask_small,
            mask_large,
            logo_value: LOGO_VALUE,
        })
    }

    /// Load both masks from their reference captures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaskLoad`] if a reference cannot be decoded, or
    /// [`Error::MaskDimensions`] if it has the wrong size.
    pub fn load(small_reference: &Path, large_reference: &Path) -> Result<Self> {
        let mask_small = AlphaMask::load(small_reference)?;
        let mask_large = AlphaMask::load(large_reference)?;
        Self::new(mask_small, mask_large)
    }

    /// The mask used for a given size class.
    #[must_use]
    pub fn mask(&self, size: WatermarkSize) -> &AlphaMask {
        match size {
            WatermarkSize::Small => &self.mask_small,
            WatermarkSize::Large => &self.mask_large,
        }
    }

    /// Remove the watermark from an image in-place.
    ///
    /// Returns the placement that was used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageTooSmall`] without touching any pixel when the
    /// footprint does not fit.
    pub fn remove(&self, image: &mut RgbaImage) -> Result<Placement> {
        let placement = Placement::for_dimensions(image.width(), image.height())?;

        blending::remove_watermark_alpha_blend(
            image,
            self.mask(placement.size),
            placement.x,
            placement.y,
            self.logo_value,
        );

        Ok(placement)
    }
}

impl ImageCleaner for WatermarkEngine {
    fn clean_file(&self, input: &Path, output: &Path) -> Result<()> {
        let mut img = image::open(input)
            .map_err(|source| Error::Decode {
                path: input.to_path_buf(),
                source,
            })?
            .to_rgba8();

        self.remove(&mut img)?;
        save_png(&img, output)
    }
}

fn check_dimensions(mask: &AlphaMask, size: WatermarkSize) -> Result<()> {
    let expected = size.side();
    if mask.width() == expected && mask.height() == expected {
        Ok(())
    } else {
        Err(Error::MaskDimensions {
            expected,
            width: mask.width(),
            height: mask.height(),
        })
    }
}

/// Save an RGBA image as PNG regardless of the path's extension.
///
/// # Errors
///
/// Returns [`Error::Save`] if encoding or writing fails.
pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|source| Error::Save {
            path: path.to_path_buf(),
            source,
        })
}

/// Output path for a cleaned image.
///
/// Example: `"photo.jpg"` becomes `"<output_dir>/photo_clean.png"`.
#[must_use]
pub fn clean_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    output_dir.join(format!("{stem}_clean.png"))
}
