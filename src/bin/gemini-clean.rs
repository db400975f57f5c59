use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use gemini_clean::config::AssetsConfig;
use gemini_clean::{collect_images, run_batch, CleanResult, WatermarkEngine};

#[derive(Parser)]
#[command(
    name = "gemini-clean",
    about = "Remove the visible Gemini watermark from every image in a directory",
    version,
    after_help = "Cleaned images are written as <name>_clean.png.\n\n\
                  NOTE: This tool only removes the VISIBLE Gemini watermark (sparkle logo).\n\
                  It cannot remove SynthID (invisible watermark)."
)]
struct Cli {
    /// Directory of watermarked images
    #[arg(short, long)]
    input: PathBuf,

    /// Directory to write cleaned images to
    #[arg(short, long)]
    output: PathBuf,

    /// Directory holding bg_48.png and bg_96.png
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Delete each original after it has been cleaned
    #[arg(long)]
    delete_originals: bool,
}

fn main() {
    let cli = Cli::parse();

    if !cli.input.is_dir() {
        eprintln!("Error: Input directory does not exist: {}", cli.input.display());
        process::exit(1);
    }

    let assets = AssetsConfig {
        dir: cli.assets.clone(),
        ..AssetsConfig::default()
    };
    let engine = match WatermarkEngine::load(&assets.mask_small_path(), &assets.mask_large_path())
    {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Fatal: Failed to load alpha masks: {e}");
            process::exit(1);
        }
    };

    let images = match collect_images(&cli.input) {
        Ok(images) => images,
        Err(e) => {
            eprintln!("Error: Cannot read {}: {e}", cli.input.display());
            process::exit(1);
        }
    };

    let results = match run_batch(
        &engine,
        &images,
        &cli.output,
        cli.delete_originals,
        print_result,
    ) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let success_count = results.iter().filter(|r| r.is_success()).count();
    let fail_count = results.len() - success_count;
    println!(
        "Done. total={} success={success_count} failed={fail_count}",
        results.len()
    );

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &CleanResult) {
    let filename = display_name(&result.source);
    match &result.outcome {
        Ok(output) => eprintln!("[OK] {filename} -> {}", output.display()),
        Err(message) => eprintln!("[FAIL] {filename}: {message}"),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}
