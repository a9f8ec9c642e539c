//! Check that the encoding engine can run.

use clipweave_common::config::{config_file_path, AppConfig};
use clipweave_render_engine::FfmpegEngine;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Clipweave System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[--] Config: defaults ({} not found)", config_path.display());
    }

    let binary = &config.engine.ffmpeg_path;
    let available = FfmpegEngine::is_available(binary).await;
    if available {
        println!("[OK] ffmpeg: {}", binary.display());
    } else {
        println!("[FAIL] ffmpeg: {} could not be run", binary.display());
    }

    match &config.engine.scratch_dir {
        Some(dir) if dir.is_dir() => println!("[OK] Scratch directory: {}", dir.display()),
        Some(dir) => println!("[FAIL] Scratch directory: {} does not exist", dir.display()),
        None => println!("[OK] Scratch directory: system temp"),
    }

    println!();
    if available {
        println!("ffmpeg is available. Clipweave is ready.");
    } else {
        println!("Install ffmpeg or set engine.ffmpeg_path in the config file.");
    }

    Ok(())
}
