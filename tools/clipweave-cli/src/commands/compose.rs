//! Compose a timeline into its video and audio tracks.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clipweave_common::config::AppConfig;
use clipweave_common::ClipweaveResult;
use clipweave_render_engine::compose::{DEFAULT_AUDIO_FILENAME, DEFAULT_VIDEO_FILENAME};
use clipweave_render_engine::{
    CompositionProgress, CompositionRequest, Compositor, EncodingEngine, EnginePool,
    ScriptedEngine, SessionKind,
};
use clipweave_timeline_model::LoadedTimeline;

pub struct ComposeArgs {
    pub manifest: PathBuf,
    pub video_out: Option<PathBuf>,
    pub audio_out: Option<PathBuf>,
    pub exclude_empty: bool,
    pub framerate: Option<u32>,
    pub dry_run: bool,
}

pub async fn run(config: &AppConfig, args: ComposeArgs) -> anyhow::Result<()> {
    println!("Composing timeline: {}", args.manifest.display());

    let timeline = LoadedTimeline::load(&args.manifest)
        .map_err(|e| anyhow::anyhow!("Failed to load timeline: {e}"))?;
    for issue in timeline.manifest.validate() {
        println!("  Skipped: {issue}");
    }

    let mut defaults = config.composition.clone();
    defaults.exclude_empty |= args.exclude_empty;
    let mut request = CompositionRequest::from_timeline(&timeline, &defaults);
    if let Some(framerate) = args.framerate {
        request.framerate = framerate;
    }

    let video_out = args
        .video_out
        .unwrap_or_else(|| timeline.root.join(DEFAULT_VIDEO_FILENAME));
    let audio_out = args
        .audio_out
        .unwrap_or_else(|| timeline.root.join(DEFAULT_AUDIO_FILENAME));

    println!(
        "  Duration: {} ms, {}x{} @ {}fps",
        request.total_ms, request.width, request.height, request.framerate
    );
    println!("  Segments: {}", request.assets.len());

    tracing::debug!(
        video = %video_out.display(),
        audio = %audio_out.display(),
        dry_run = args.dry_run,
        "Resolved output paths"
    );

    let dry_run = if args.dry_run {
        Some(DryRun::new())
    } else {
        None
    };
    let pool = match &dry_run {
        Some(dry) => dry.pool(),
        None => EnginePool::ffmpeg(config.engine.clone()),
    };
    let compositor = Compositor::new(Arc::new(pool), &defaults);

    let result = compositor.compose(request, print_progress).await;
    println!();
    let result = result.map_err(|e| anyhow::anyhow!("Composition failed: {e}"))?;

    if let Some(dry) = dry_run {
        dry.print_requests();
        println!("\nDry run: nothing written.");
        return Ok(());
    }

    let video_bytes = result.video.save_to(&video_out).await?;
    let audio_bytes = result.audio.save_to(&audio_out).await?;
    println!("Composition complete ({})", result.finished_at.to_rfc3339());
    println!("  Video: {} ({video_bytes} bytes)", video_out.display());
    println!("  Audio: {} ({audio_bytes} bytes)", audio_out.display());

    Ok(())
}

fn print_progress(progress: CompositionProgress) {
    print!(
        "\r  Progress: {:5.1}% [{}] {:<32}",
        progress.percent,
        progress.track.as_str(),
        progress.message
    );
    let _ = std::io::stdout().flush();
}

/// Scripted sessions whose requests are printed after the run.
struct DryRun {
    video: Arc<ScriptedEngine>,
    audio: Arc<ScriptedEngine>,
}

impl DryRun {
    fn new() -> Self {
        let video = Arc::new(ScriptedEngine::new("video"));
        let audio = Arc::new(ScriptedEngine::new("audio"));
        video.simulate_progress(true);
        audio.simulate_progress(true);
        Self { video, audio }
    }

    fn pool(&self) -> EnginePool {
        let video = Arc::clone(&self.video);
        let audio = Arc::clone(&self.audio);
        EnginePool::new(move |kind: SessionKind| -> ClipweaveResult<Arc<dyn EncodingEngine>> {
            Ok(match kind {
                SessionKind::Video => Arc::clone(&video) as Arc<dyn EncodingEngine>,
                SessionKind::Audio => Arc::clone(&audio) as Arc<dyn EncodingEngine>,
            })
        })
    }

    fn print_requests(&self) {
        for engine in [&self.video, &self.audio] {
            let requests = engine.requests();
            println!("\n{} session ({} requests):", engine.label(), requests.len());
            for request in requests {
                println!("  ffmpeg {}", request.join(" "));
            }
        }
    }
}
