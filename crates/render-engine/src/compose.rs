//! Composition facade: both tracks from one timeline.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use clipweave_common::config::CompositionDefaults;
use clipweave_common::error::{ClipweaveError, ClipweaveResult};
use clipweave_processing_core::progress::{LaneProgress, ProgressReporter};
use clipweave_timeline_model::{split_lanes, AssetInput, LoadedTimeline};

use crate::audio::{compose_full_audio, FullAudioRequest};
use crate::commands::EncodeSettings;
use crate::engine::{validate_scratch_name, EncodingEngine};
use crate::session::EnginePool;
use crate::visual::{compose_silent_video, SilentVideoRequest};

pub const DEFAULT_VIDEO_FILENAME: &str = "video.mp4";
pub const DEFAULT_AUDIO_FILENAME: &str = "audio.mp3";

/// A timeline to render into one video and one audio track.
#[derive(Debug, Clone)]
pub struct CompositionRequest {
    pub assets: Vec<AssetInput>,
    pub total_ms: u64,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub exclude_empty: bool,
    pub video_filename: String,
    pub audio_filename: String,
}

impl CompositionRequest {
    /// Request for a loaded timeline with default output names.
    pub fn from_timeline(timeline: &LoadedTimeline, defaults: &CompositionDefaults) -> Self {
        let framerate = if timeline.manifest.framerate > 0 {
            timeline.manifest.framerate
        } else {
            defaults.framerate
        };
        Self {
            assets: timeline.assets.clone(),
            total_ms: timeline.total_duration_ms(),
            width: timeline.manifest.width,
            height: timeline.manifest.height,
            framerate,
            exclude_empty: defaults.exclude_empty,
            video_filename: DEFAULT_VIDEO_FILENAME.to_string(),
            audio_filename: DEFAULT_AUDIO_FILENAME.to_string(),
        }
    }

    /// Reject requests no engine call could satisfy.
    pub fn validate(&self) -> ClipweaveResult<()> {
        if self.total_ms == 0 {
            return Err(ClipweaveError::malformed("timeline duration must be positive"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ClipweaveError::malformed(format!(
                "invalid output size {}x{}",
                self.width, self.height
            )));
        }
        if self.framerate == 0 {
            return Err(ClipweaveError::malformed("framerate must be positive"));
        }
        validate_scratch_name(&self.video_filename)?;
        validate_scratch_name(&self.audio_filename)?;
        Ok(())
    }
}

/// Which track a progress report comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Video,
    Audio,
}

impl Track {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    fn lane(self) -> usize {
        match self {
            Self::Video => 0,
            Self::Audio => 1,
        }
    }
}

/// Combined progress of a composition call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionProgress {
    /// Overall percentage [0, 100], never decreasing within one call.
    pub percent: f64,
    pub message: String,
    /// Track whose report produced this update.
    pub track: Track,
}

/// A finished track held by the session that produced it.
#[derive(Clone)]
pub struct MediaArtifact {
    filename: String,
    session: Arc<dyn EncodingEngine>,
}

impl MediaArtifact {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub async fn read(&self) -> ClipweaveResult<Vec<u8>> {
        self.session.read_file(&self.filename).await
    }

    /// Copy the artifact out of the session to `path`.
    pub async fn save_to(&self, path: impl AsRef<Path>) -> ClipweaveResult<u64> {
        let path = path.as_ref();
        let data = self.read().await?;
        tokio::fs::write(path, &data).await?;
        tracing::info!(artifact = %self.filename, path = %path.display(), bytes = data.len(), "Saved artifact");
        Ok(data.len() as u64)
    }
}

impl std::fmt::Debug for MediaArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaArtifact")
            .field("filename", &self.filename)
            .field("session", &self.session.label())
            .finish()
    }
}

/// Both tracks of a completed composition.
#[derive(Debug, Clone)]
pub struct CompositionResult {
    pub video: MediaArtifact,
    pub audio: MediaArtifact,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

type ProgressSink = dyn Fn(CompositionProgress) + Send + Sync;

/// Folds both track reporters into one monotonic caller callback.
struct CombinedProgress {
    lanes: LaneProgress,
    last: Mutex<f64>,
    callback: Box<ProgressSink>,
}

impl CombinedProgress {
    fn report(&self, track: Track, percent: f64, message: &str) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let combined = self.lanes.update(track.lane(), percent);
        let value = combined.clamp(0.0, 100.0).max(*last);
        *last = value;
        (self.callback)(CompositionProgress {
            percent: value,
            message: message.to_string(),
            track,
        });
    }

    /// Report 100 once both tracks are done, regardless of float rounding
    /// in the weighted sum. Credited to the video track.
    fn complete(&self, message: &str) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *last = 100.0;
        (self.callback)(CompositionProgress {
            percent: 100.0,
            message: message.to_string(),
            track: Track::Video,
        });
    }
}

/// Renders timelines on the sessions of a shared pool.
#[derive(Debug, Clone)]
pub struct Compositor {
    pool: Arc<EnginePool>,
    encode: EncodeSettings,
    video_weight: f64,
}

impl Compositor {
    pub fn new(pool: Arc<EnginePool>, defaults: &CompositionDefaults) -> Self {
        Self {
            pool,
            encode: EncodeSettings::from(defaults),
            video_weight: defaults.video_weight.clamp(0.0, 1.0),
        }
    }

    pub fn pool(&self) -> &Arc<EnginePool> {
        &self.pool
    }

    /// Render the video track on the video session and the audio track on
    /// the audio session concurrently.
    ///
    /// The first track to fail aborts the call; a result is returned only
    /// when both tracks are complete.
    pub async fn compose(
        &self,
        request: CompositionRequest,
        on_progress: impl Fn(CompositionProgress) + Send + Sync + 'static,
    ) -> ClipweaveResult<CompositionResult> {
        request.validate()?;
        let started = std::time::Instant::now();

        let combined = Arc::new(CombinedProgress {
            lanes: LaneProgress::new(&[self.video_weight, 1.0 - self.video_weight]),
            last: Mutex::new(0.0),
            callback: Box::new(on_progress),
        });
        let video_reporter = Arc::new(track_reporter(&combined, Track::Video));
        let audio_reporter = Arc::new(track_reporter(&combined, Track::Audio));

        let CompositionRequest {
            assets,
            total_ms,
            width,
            height,
            framerate,
            exclude_empty,
            video_filename,
            audio_filename,
        } = request;
        let (images, videos, clips) = split_lanes(assets);
        tracing::info!(
            images = images.len(),
            videos = videos.len(),
            audio_clips = clips.len(),
            total_ms,
            "Starting composition"
        );

        let video_request = SilentVideoRequest {
            images,
            videos,
            filename: video_filename,
            total_ms,
            width,
            height,
            framerate,
            exclude_empty,
        };
        let audio_request = FullAudioRequest {
            clips,
            filename: audio_filename,
            total_ms,
        };

        let video_session = self.pool.video_session().await?;
        let audio_session = self.pool.audio_session().await?;

        tokio::try_join!(
            compose_silent_video(
                Arc::clone(&video_session),
                &video_request,
                &self.encode,
                &video_reporter
            ),
            compose_full_audio(Arc::clone(&audio_session), &audio_request, &audio_reporter),
        )?;

        combined.complete("Composition complete");
        tracing::info!(
            total_ms,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Composition finished"
        );

        Ok(CompositionResult {
            video: MediaArtifact {
                filename: video_request.filename,
                session: video_session,
            },
            audio: MediaArtifact {
                filename: audio_request.filename,
                session: audio_session,
            },
            duration_ms: total_ms,
            finished_at: Utc::now(),
        })
    }
}

fn track_reporter(combined: &Arc<CombinedProgress>, track: Track) -> ProgressReporter {
    let combined = Arc::clone(combined);
    ProgressReporter::new(move |percent, message| combined.report(track, percent, message))
}
