//! Visual track compositor.
//!
//! Renders the normalized covering of the image and video lanes into one
//! continuous video. Every entry becomes a sub-clip of its exact duration,
//! then a single concat request joins them in timeline order.
//!
//! Progress layout on the 0-100 scale:
//!
//! ```text
//! 0 ─────────────── sub-clips ─────────────── 70 ── concat ── 100
//!   │ entry 0 │    entry 1    │  entry 2  │
//!   (width of each entry proportional to its duration)
//! ```

use std::sync::Arc;

use clipweave_common::error::{ClipweaveError, ClipweaveResult};
use clipweave_processing_core::normalize;
use clipweave_processing_core::progress::{ProgressReporter, Stage};
use clipweave_timeline_model::{ImageInput, TimeRange, VideoInput, VisualSegment};

use crate::capture::{run_request, run_tracked, Tracked};
use crate::commands::{self, EncodeSettings};
use crate::engine::{validate_scratch_name, EncodingEngine};
use crate::scratch::ScratchFiles;

const CLIPS_STAGE: Stage = Stage {
    start: 0.0,
    target: 70.0,
};
const CONCAT_STAGE: Stage = Stage {
    start: 70.0,
    target: 100.0,
};

const PREPARING: &str = "Preparing videos...";
const CONCATENATING: &str = "Concatenating videos...";
const MERGING: &str = "Merging audio and video...";

/// Everything needed to render the silent video track.
#[derive(Debug, Clone)]
pub struct SilentVideoRequest {
    pub images: Vec<ImageInput>,
    pub videos: Vec<VideoInput>,
    /// Output name inside the engine session.
    pub filename: String,
    pub total_ms: u64,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// Skip gaps instead of filling them with solid-color clips.
    pub exclude_empty: bool,
}

/// Render `request` into `request.filename` on `engine`.
///
/// Any failed request aborts the call with [`ClipweaveError::Encoding`]
/// naming the failed step; the concat request is never issued after a
/// sub-clip failed. Scratch files are removed on every path, including a
/// call dropped mid-flight.
pub async fn compose_silent_video(
    engine: Arc<dyn EncodingEngine>,
    request: &SilentVideoRequest,
    encode: &EncodeSettings,
    reporter: &Arc<ProgressReporter>,
) -> ClipweaveResult<()> {
    validate_scratch_name(&request.filename)?;

    let covering = normalize(&request.images, &request.videos, request.total_ms);
    tracing::info!(
        session = engine.label(),
        entries = covering.len(),
        total_ms = request.total_ms,
        exclude_empty = request.exclude_empty,
        "Composing silent video"
    );
    tracing::debug!(covering = %covering.describe(), "Normalized visual lane");

    let rendered = covering
        .iter()
        .filter(|segment| !is_skipped(segment, request.exclude_empty))
        .count();
    if rendered == 0 {
        return Err(ClipweaveError::unsupported(
            "the timeline has no visual content to render",
        ));
    }

    let mut scratch = ScratchFiles::new(Arc::clone(&engine));
    let result = render(
        engine.as_ref(),
        &mut scratch,
        request,
        encode,
        reporter,
        covering.entries(),
    )
    .await;
    scratch.release_all().await;

    if let Err(err) = &result {
        tracing::warn!(session = engine.label(), error = %err, "Silent video failed");
    }
    result
}

fn is_skipped(segment: &VisualSegment, exclude_empty: bool) -> bool {
    exclude_empty && matches!(segment, VisualSegment::Empty(_))
}

async fn render(
    engine: &dyn EncodingEngine,
    scratch: &mut ScratchFiles,
    request: &SilentVideoRequest,
    encode: &EncodeSettings,
    reporter: &Arc<ProgressReporter>,
    entries: &[VisualSegment],
) -> ClipweaveResult<()> {
    // Stages are sized against the full timeline; skipped entries leave
    // their share unused rather than stretching their neighbours.
    let weights: Vec<f64> = entries
        .iter()
        .map(|segment| segment.range().duration_ms() as f64)
        .collect();
    let stages = CLIPS_STAGE.partition(&weights);

    let mut clips = Vec::with_capacity(entries.len());
    for (segment, stage) in entries.iter().zip(stages) {
        if is_skipped(segment, request.exclude_empty) {
            tracing::debug!(range = %segment.range(), "Skipping empty entry");
            continue;
        }
        let clip = match segment {
            VisualSegment::Empty(range) => {
                empty_clip(engine, scratch, request, encode, reporter, *range, stage).await?
            }
            VisualSegment::Image(image) => {
                image_clip(engine, scratch, request, encode, reporter, image, stage).await?
            }
            VisualSegment::Video(video) => {
                let name = scratch.write("video", "mp4", &video.data).await?;
                reporter.report(stage.target, PREPARING);
                name
            }
        };
        tracing::debug!(kind = %segment.kind(), range = %segment.range(), clip = %clip, "Sub-clip ready");
        clips.push(clip);
    }

    reporter.report(CONCAT_STAGE.start, CONCATENATING);
    let list = scratch
        .write("filelist", "txt", commands::concat_list(&clips).as_bytes())
        .await?;
    let args = commands::concat_clips(&list, request.total_ms, request.framerate, &request.filename);
    run_tracked(
        engine,
        &args,
        "concatenation",
        Tracked {
            reporter,
            stage: CONCAT_STAGE,
            total_ms: request.total_ms,
            message: MERGING,
        },
    )
    .await?;

    tracing::info!(session = engine.label(), clips = clips.len(), output = %request.filename, "Silent video ready");
    Ok(())
}

/// Solid-color clip with a silent audio stream, so it concatenates with
/// clips that carry audio.
async fn empty_clip(
    engine: &dyn EncodingEngine,
    scratch: &mut ScratchFiles,
    request: &SilentVideoRequest,
    encode: &EncodeSettings,
    reporter: &Arc<ProgressReporter>,
    range: TimeRange,
    stage: Stage,
) -> ClipweaveResult<String> {
    let duration_ms = range.duration_ms();

    let base = scratch.reserve("empty_base", "mp4");
    let args = commands::color_clip(encode, duration_ms, request.width, request.height, &base);
    run_tracked(
        engine,
        &args,
        "empty clip",
        Tracked {
            reporter,
            stage: stage.sub(0.0, 50.0),
            total_ms: duration_ms,
            message: PREPARING,
        },
    )
    .await?;

    let clip = scratch.reserve("empty", "mp4");
    let args = commands::attach_silent_audio(encode, &base, duration_ms, &clip);
    run_tracked(
        engine,
        &args,
        "empty clip audio",
        Tracked {
            reporter,
            stage: stage.sub(50.0, 100.0),
            total_ms: duration_ms,
            message: PREPARING,
        },
    )
    .await?;

    scratch.release(&base).await;
    Ok(clip)
}

/// Still held for the entry's duration, rescaled first when its native
/// size differs from the output frame.
async fn image_clip(
    engine: &dyn EncodingEngine,
    scratch: &mut ScratchFiles,
    request: &SilentVideoRequest,
    encode: &EncodeSettings,
    reporter: &Arc<ProgressReporter>,
    image: &ImageInput,
    stage: Stage,
) -> ClipweaveResult<String> {
    let duration_ms = image.range.duration_ms();
    let still = scratch.write("base_image", "jpg", &image.data).await?;

    let source = if image.needs_scaling(request.width, request.height) {
        let scaled = scratch.reserve("scaled_image", "jpg");
        let args = commands::scale_still(&still, request.width, request.height, &scaled);
        run_request(engine, &args, "image scale").await?;
        Some(scaled)
    } else {
        None
    };

    let clip = scratch.reserve("slideshow", "mp4");
    let input = source.as_deref().unwrap_or(&still);
    let args = commands::slideshow_clip(encode, input, duration_ms, request.framerate, &clip);
    run_tracked(
        engine,
        &args,
        "slideshow",
        Tracked {
            reporter,
            stage,
            total_ms: duration_ms,
            message: PREPARING,
        },
    )
    .await?;

    scratch.release(&still).await;
    if let Some(scaled) = source {
        scratch.release(&scaled).await;
    }
    Ok(clip)
}
