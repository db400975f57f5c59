mod common;

use gemini_clean::blending::AlphaMask;
use gemini_clean::{
    collect_images, run_batch, Error, ImageCleaner, Placement, WatermarkEngine, WatermarkSize,
};
use image::{GenericImageView, Rgba, RgbaImage};

use common::{apply_watermark, engine, mask_reference, original};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

fn max_channel_diff(a: &Rgba<u8>, b: &Rgba<u8>) -> u8 {
    (0..4).map(|c| a.0[c].abs_diff(b.0[c])).max().unwrap()
}

#[test]
fn masks_load_from_reference_captures() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let small = engine.mask(WatermarkSize::Small);
    assert_eq!((small.width(), small.height()), (48, 48));
    assert_eq!(small.alpha(0, 0), 0.0);
    let expected = f32::from(mask_reference(48).get_pixel(47, 47).0[0]) / 255.0;
    assert!((small.alpha(47, 47) - expected).abs() < 1e-6);
}

#[test]
fn masks_with_wrong_size_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    common::write_mask_assets(dir.path());
    mask_reference(50).save(dir.path().join("bg_48.png")).unwrap();

    let err = WatermarkEngine::load(&dir.path().join("bg_48.png"), &dir.path().join("bg_96.png"))
        .unwrap_err();

    assert_eq!(err.to_string(), "alpha mask must be 48x48, got 50x50");
}

#[test]
fn missing_mask_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AlphaMask::load(&dir.path().join("bg_48.png")).unwrap_err();
    assert!(matches!(err, Error::MaskLoad { .. }));
}

fn assert_recovers(width: u32, height: u32, size: WatermarkSize) {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir.path().join("assets"));
    let placement = Placement::for_dimensions(width, height).unwrap();
    assert_eq!(placement.size, size);

    let clean = original(width, height);
    let mut marked = clean.clone();
    apply_watermark(&mut marked, &mask_reference(size.side()), placement.x, placement.y);

    let input = dir.path().join("marked.png");
    let output = dir.path().join("out").join("marked_clean.png");
    marked.save(&input).unwrap();
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();

    engine.clean_file(&input, &output).unwrap();

    let restored = image::open(&output).unwrap().to_rgba8();
    assert_eq!(restored.dimensions(), (width, height));
    for (x, y, px) in restored.enumerate_pixels() {
        let inside = x >= placement.x
            && x < placement.x + size.side()
            && y >= placement.y
            && y < placement.y + size.side();
        if inside {
            assert!(
                max_channel_diff(px, clean.get_pixel(x, y)) <= 2,
                "pixel ({x}, {y}) not recovered: {px:?} vs {:?}",
                clean.get_pixel(x, y)
            );
        } else {
            assert_eq!(px, marked.get_pixel(x, y), "pixel ({x}, {y}) changed");
        }
    }
}

#[test]
fn recovers_small_watermark() {
    assert_recovers(800, 600, WatermarkSize::Small);
}

#[test]
fn recovers_large_watermark() {
    assert_recovers(1200, 1100, WatermarkSize::Large);
}

#[test]
fn jpeg_input_is_written_as_png() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir.path().join("assets"));
    let input = dir.path().join("photo.jpg");
    image::DynamicImage::ImageRgba8(original(300, 200))
        .to_rgb8()
        .save(&input)
        .unwrap();

    let results = run_batch(&engine, &[input], &dir.path().join("out"), false, |_| {}).unwrap();

    let output = results[0].output().unwrap();
    assert_eq!(output.file_name().unwrap(), "photo_clean.png");
    let bytes = std::fs::read(output).unwrap();
    assert!(bytes.starts_with(PNG_SIGNATURE));
    assert_eq!(image::open(output).unwrap().dimensions(), (300, 200));
}

#[test]
fn transparent_pixels_keep_their_alpha() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir.path().join("assets"));
    let input = dir.path().join("translucent.png");
    RgbaImage::from_pixel(100, 100, Rgba([180, 180, 180, 77]))
        .save(&input)
        .unwrap();
    let output = dir.path().join("translucent_clean.png");

    engine.clean_file(&input, &output).unwrap();

    let restored = image::open(&output).unwrap().to_rgba8();
    assert!(restored.pixels().all(|p| p.0[3] == 77));
}

#[test]
fn too_small_image_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir.path().join("assets"));
    let input = dir.path().join("tiny.png");
    original(60, 60).save(&input).unwrap();
    let before = std::fs::read(&input).unwrap();
    let out = dir.path().join("out");

    let results = run_batch(&engine, &[input.clone()], &out, true, |_| {}).unwrap();

    assert_eq!(
        results[0].outcome.as_ref().unwrap_err(),
        "image too small (60x60) for 48x48 watermark"
    );
    assert!(!out.join("tiny_clean.png").exists());
    assert_eq!(std::fs::read(&input).unwrap(), before);
}

#[test]
fn undecodable_file_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir.path().join("assets"));
    let input_dir = dir.path().join("in");
    std::fs::create_dir_all(&input_dir).unwrap();
    original(200, 200).save(input_dir.join("a.png")).unwrap();
    std::fs::write(input_dir.join("b.png"), b"definitely not a png").unwrap();
    original(200, 200).save(input_dir.join("c.png")).unwrap();
    std::fs::write(input_dir.join("readme.txt"), b"skip me").unwrap();

    let images = collect_images(&input_dir).unwrap();
    let mut seen = Vec::new();
    let results = run_batch(&engine, &images, &dir.path().join("out"), false, |r| {
        seen.push(r.source.file_name().unwrap().to_string_lossy().into_owned());
    })
    .unwrap();

    assert_eq!(seen, vec!["a.png", "b.png", "c.png"]);
    let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].outcome.as_ref().unwrap_err().starts_with("open failed"));
    assert_eq!(results.iter().filter(|r| r.is_success()).count(), 2);
}

#[test]
fn write_failure_is_isolated_and_leaves_the_source_alone() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir.path().join("assets"));
    let input_dir = dir.path().join("in");
    std::fs::create_dir_all(&input_dir).unwrap();
    for name in ["a.png", "b.png", "c.png"] {
        original(200, 200).save(input_dir.join(name)).unwrap();
    }
    let out = dir.path().join("out");
    std::fs::create_dir_all(out.join("b_clean.png")).unwrap();
    let source = input_dir.join("b.png");
    let before = std::fs::read(&source).unwrap();

    let images = collect_images(&input_dir).unwrap();
    let results = run_batch(&engine, &images, &out, true, |_| {}).unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[1]
        .outcome
        .as_ref()
        .unwrap_err()
        .starts_with("save failed"));
    assert!(results[0].is_success());
    assert!(results[2].is_success());
    assert!(out.join("c_clean.png").is_file());
    assert_eq!(std::fs::read(&source).unwrap(), before);
    assert!(!input_dir.join("a.png").exists());
}
