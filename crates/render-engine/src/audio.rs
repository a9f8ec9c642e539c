//! Audio track compositor.
//!
//! Lays every playable clip over a silent base track of the full timeline
//! length, each delayed to its start and trimmed to its length, and mixes
//! them in one request.

use std::sync::Arc;

use clipweave_common::error::ClipweaveResult;
use clipweave_processing_core::progress::{ProgressReporter, Stage};
use clipweave_timeline_model::AudioInput;

use crate::capture::{run_tracked, Tracked};
use crate::commands;
use crate::engine::{validate_scratch_name, EncodingEngine};
use crate::scratch::ScratchFiles;

const BASE_STAGE: Stage = Stage {
    start: 0.0,
    target: 25.0,
};
const CLIPS_STAGE: Stage = Stage {
    start: 25.0,
    target: 50.0,
};
const MIX_STAGE: Stage = Stage {
    start: 50.0,
    target: 100.0,
};

const PREPARING: &str = "Preparing audios...";
const PREPARED: &str = "Prepared audios...";
const MIXING: &str = "Mixing audios...";

/// Everything needed to render the mixed audio track.
#[derive(Debug, Clone)]
pub struct FullAudioRequest {
    pub clips: Vec<AudioInput>,
    /// Output name inside the engine session.
    pub filename: String,
    pub total_ms: u64,
}

/// Render `request` into `request.filename` on `engine`.
///
/// Clips without content are ignored. With nothing left to mix, the silent
/// base track is the output and no mix request is issued.
pub async fn compose_full_audio(
    engine: Arc<dyn EncodingEngine>,
    request: &FullAudioRequest,
    reporter: &Arc<ProgressReporter>,
) -> ClipweaveResult<()> {
    validate_scratch_name(&request.filename)?;

    let playable: Vec<&AudioInput> = request
        .clips
        .iter()
        .filter(|clip| clip.data.as_ref().is_some_and(|data| !data.is_empty()))
        .collect();
    tracing::info!(
        session = engine.label(),
        clips = request.clips.len(),
        playable = playable.len(),
        total_ms = request.total_ms,
        "Composing full audio"
    );

    if playable.is_empty() {
        let args = commands::silent_track(request.total_ms, &request.filename);
        run_tracked(engine.as_ref(), &args, "base audio", base_tracked(reporter, request.total_ms)).await?;
        reporter.report(100.0, PREPARED);
        tracing::info!(session = engine.label(), output = %request.filename, "No playable clips, audio is silent");
        return Ok(());
    }

    let mut scratch = ScratchFiles::new(Arc::clone(&engine));
    let result = mix(engine.as_ref(), &mut scratch, request, &playable, reporter).await;
    scratch.release_all().await;

    if let Err(err) = &result {
        tracing::warn!(session = engine.label(), error = %err, "Full audio failed");
    }
    result
}

fn base_tracked(reporter: &Arc<ProgressReporter>, total_ms: u64) -> Tracked<'_> {
    Tracked {
        reporter,
        stage: BASE_STAGE,
        total_ms,
        message: PREPARING,
    }
}

async fn mix(
    engine: &dyn EncodingEngine,
    scratch: &mut ScratchFiles,
    request: &FullAudioRequest,
    playable: &[&AudioInput],
    reporter: &Arc<ProgressReporter>,
) -> ClipweaveResult<()> {
    let extension = request
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("mp3");
    let base = scratch.reserve("base_audio", extension);
    let args = commands::silent_track(request.total_ms, &base);
    run_tracked(engine, &args, "base audio", base_tracked(reporter, request.total_ms)).await?;

    let weights: Vec<f64> = playable
        .iter()
        .map(|clip| clip.range.duration_ms() as f64)
        .collect();
    let stages = CLIPS_STAGE.partition(&weights);

    let mut inputs = vec![base];
    let mut fragments = Vec::with_capacity(playable.len() + 1);
    for (index, (clip, stage)) in playable.iter().zip(stages).enumerate() {
        let data = clip.data.as_deref().unwrap_or_default();
        let name = scratch.write("audio", "mp3", data).await?;
        // Input 0 is the base track.
        fragments.push(commands::delay_trim_fragment(
            index + 1,
            clip.trim_ms(),
            clip.delay_ms(),
            index,
        ));
        inputs.push(name);
        reporter.report(stage.target, PREPARING);
    }
    fragments.push(commands::mix_fragment(playable.len()));

    let filter = fragments.join("; ");
    tracing::debug!(filter = %filter, "Audio mix graph");
    let args = commands::mix_tracks(&inputs, &filter, request.total_ms, &request.filename);
    run_tracked(
        engine,
        &args,
        "audio mix",
        Tracked {
            reporter,
            stage: MIX_STAGE,
            total_ms: request.total_ms,
            message: MIXING,
        },
    )
    .await?;

    tracing::info!(session = engine.label(), clips = playable.len(), output = %request.filename, "Full audio ready");
    Ok(())
}
