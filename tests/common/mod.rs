//! Fixtures shared by the integration suites.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gemini_clean::{Error, FileUploader, ImageCleaner, UploadError, WatermarkEngine};
use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Reference capture whose brightness ramps from 0 to about 150 across the
/// diagonal, so the derived alpha stays well below the clamp.
pub fn mask_reference(side: u32) -> RgbImage {
    RgbImage::from_fn(side, side, |x, y| {
        let v = u8::try_from((x + y) * 150 / (2 * side)).unwrap();
        Rgb([v, v / 2, v])
    })
}

/// Write `bg_48.png` and `bg_96.png` into `dir`.
pub fn write_mask_assets(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    mask_reference(48).save(dir.join("bg_48.png")).unwrap();
    mask_reference(96).save(dir.join("bg_96.png")).unwrap();
}

/// Engine loaded from freshly written mask assets.
pub fn engine(assets_dir: &Path) -> WatermarkEngine {
    write_mask_assets(assets_dir);
    WatermarkEngine::load(&assets_dir.join("bg_48.png"), &assets_dir.join("bg_96.png")).unwrap()
}

/// Deterministic, non-uniform original image.
pub fn original(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            u8::try_from((x * 7 + y) % 200).unwrap(),
            u8::try_from((y * 3) % 180).unwrap(),
            90,
            255,
        ])
    })
}

/// Apply the watermark forward: `obs = a * 255 + (1 - a) * orig`.
pub fn apply_watermark(img: &mut RgbaImage, reference: &RgbImage, pos_x: u32, pos_y: u32) {
    for (col, row, px) in reference.enumerate_pixels() {
        let alpha = f32::from(px.0.into_iter().max().unwrap()) / 255.0;
        let target = img.get_pixel_mut(pos_x + col, pos_y + row);
        for c in 0..3 {
            let blended = alpha * 255.0 + (1.0 - alpha) * f32::from(target.0[c]);
            target.0[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Write `count` placeholder images named `img_<n>.png` into `dir`.
pub fn touch_images(dir: &Path, count: usize) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    (0..count)
        .map(|n| {
            let path = dir.join(format!("img_{n}.png"));
            std::fs::write(&path, b"img").unwrap();
            path
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

/// What a fake collaborator was asked to do, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Clean(String),
    Upload(String),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Copies the input to the output. Files named `bad*` fail and files named
/// `panic*` panic.
pub struct RecordingCleaner {
    pub events: EventLog,
    pub delay: Duration,
}

impl RecordingCleaner {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl ImageCleaner for RecordingCleaner {
    fn clean_file(&self, input: &Path, output: &Path) -> gemini_clean::Result<()> {
        let name = file_name(input);
        self.events.lock().unwrap().push(Event::Clean(name.clone()));
        std::thread::sleep(self.delay);

        if name.starts_with("panic") {
            panic!("cleaner blew up on {name}");
        }
        if name.starts_with("bad") {
            return Err(Error::ImageTooSmall {
                width: 10,
                height: 10,
                wm_size: 48,
            });
        }
        std::fs::copy(input, output)?;
        Ok(())
    }
}

/// Answers `https://img.test/file/<name>`. Files whose name contains
/// `reject` fail.
pub struct RecordingUploader {
    pub events: EventLog,
    pub delay: Duration,
}

impl RecordingUploader {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl FileUploader for RecordingUploader {
    async fn upload(&self, _upload_url: &str, path: &Path) -> Result<String, UploadError> {
        let name = file_name(path);
        self.events.lock().unwrap().push(Event::Upload(name.clone()));
        tokio::time::sleep(self.delay).await;

        if name.contains("reject") {
            return Err(UploadError::Status(500));
        }
        Ok(format!("https://img.test/file/{name}"))
    }
}
