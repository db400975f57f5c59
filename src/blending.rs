//! Alpha blending math for watermark removal.
//!
//! Gemini applies watermarks via forward alpha blending:
//! `watermarked = alpha * logo + (1 - alpha) * original`
//!
//! This module holds the per-pixel alpha mask and the reverse operation that
//! recovers original pixels from it.

use std::path::Path;

use image::{RgbImage, RgbaImage};

use crate::error::{Error, Result};

/// Alpha threshold: ignore pixels with negligible watermark effect (noise).
pub const ALPHA_THRESHOLD: f32 = 0.002;

/// Maximum alpha: clamp to avoid division by near-zero in reverse blending.
pub const MAX_ALPHA: f32 = 0.99;

/// Logo color value for every channel (the logo is solid white).
pub const LOGO_VALUE: f32 = 255.0;

/// Per-pixel watermark opacity for one footprint size.
///
/// Built once from a reference capture and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl AlphaMask {
    /// Derive a mask from a reference capture of the logo.
    ///
    /// The reference is the watermark rendered as pure white over pure black,
    /// so the alpha at each pixel is `max(R, G, B) / 255`. This recovers the
    /// coverage of anti-aliased edges as well as the solid interior.
    #[must_use]
    pub fn from_reference(reference: &RgbImage) -> Self {
        let values = reference
            .pixels()
            .map(|px| {
                let max_val = px[0].max(px[1]).max(px[2]);
                f32::from(max_val) / 255.0
            })
            .collect();

        Self {
            values,
            width: reference.width(),
            height: reference.height(),
        }
    }

    /// Load a reference capture from disk and derive its mask.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaskLoad`] if the file cannot be read or decoded.
    pub fn load(path: &Path) -> Result<Self> {
        let reference = image::open(path)
            .map_err(|source| Error::MaskLoad {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        Ok(Self::from_reference(&reference))
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Opacity at `(col, row)` of the footprint.
    #[must_use]
    pub fn alpha(&self, col: u32, row: u32) -> f32 {
        self.values[(row * self.width + col) as usize]
    }
}

/// Recover one channel value from its watermarked observation.
///
/// `alpha` must already be clamped to [`MAX_ALPHA`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unblend_channel(observed: u8, alpha: f32, logo_value: f32) -> u8 {
    let original = (f32::from(observed) - alpha * logo_value) / (1.0 - alpha);
    original.round().clamp(0.0, 255.0) as u8
}

/// Remove watermark from an image using reverse alpha blending.
///
/// Applies the formula: `original = (watermarked - alpha * logo_value) / (1 - alpha)`
/// to the R, G and B channels; the alpha channel is never touched.
///
/// Operates in-place on the image with the mask's top-left corner at
/// `(pos_x, pos_y)`. The footprint is clipped at the image edges. Pixels with
/// alpha below [`ALPHA_THRESHOLD`] are left unchanged and alpha is clamped to
/// [`MAX_ALPHA`].
pub fn remove_watermark_alpha_blend(
    image: &mut RgbaImage,
    mask: &AlphaMask,
    pos_x: u32,
    pos_y: u32,
    logo_value: f32,
) {
    let img_w = image.width();
    let img_h = image.height();

    // Clip to image bounds
    let x2 = pos_x.saturating_add(mask.width()).min(img_w);
    let y2 = pos_y.saturating_add(mask.height()).min(img_h);

    if pos_x >= x2 || pos_y >= y2 {
        return;
    }

    for row in 0..(y2 - pos_y) {
        for col in 0..(x2 - pos_x) {
            let alpha = mask.alpha(col, row);
            if alpha < ALPHA_THRESHOLD {
                continue;
            }
            let alpha = alpha.min(MAX_ALPHA);

            let px = image.get_pixel_mut(pos_x + col, pos_y + row);
            for ch in 0..3 {
                px[ch] = unblend_channel(px[ch], alpha, logo_value);
            }
        }
    }
}
