//! Write an example timeline manifest.

use std::path::PathBuf;

use clipweave_timeline_model::{LoadedTimeline, TimelineManifest};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let manifest = TimelineManifest::example();
    let written = LoadedTimeline::save_manifest(&path, &manifest)
        .map_err(|e| anyhow::anyhow!("Failed to write manifest: {e}"))?;

    println!("Timeline manifest written to {}", written.display());
    println!(
        "  Duration: {} ms, {}x{} @ {}fps",
        manifest.total_duration_ms(),
        manifest.width,
        manifest.height,
        manifest.framerate
    );
    println!();
    println!("Segments reference these media files (relative to the manifest):");
    for segment in &manifest.segments {
        if let Some(media) = &segment.path {
            println!(
                "  {:<6} {:>5}-{:<5} ms  {}",
                segment.kind.as_str(), segment.start_ms, segment.end_ms, media
            );
        }
    }
    println!();
    println!("Add those files, then run: clipweave compose {}", written.display());

    Ok(())
}
