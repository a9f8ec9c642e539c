//! Clipweave Render Engine
//!
//! Drives an encoding engine (ffmpeg) to turn a timeline into one silent
//! video track and one mixed audio track.
//!
//! # Pipeline Architecture
//!
//! ```text
//! images ──┐
//!          ├── normalize ── covering ──┬── empty  → color clip + silent audio
//! videos ──┘                           ├── image  → (scale) → slideshow clip
//!                                      └── video  → passthrough
//!                                                    │
//!                                                    ▼
//!                                              concat → video.mp4
//!
//! audio clips ── silent base ── delay/trim each clip ── amix → audio.mp3
//! ```
//!
//! Both tracks run concurrently on separate engine sessions from an
//! [`EnginePool`]; [`Compositor`] folds their progress into one figure.

pub mod audio;
pub mod capture;
pub mod commands;
pub mod compose;
pub mod engine;
pub mod scratch;
pub mod session;
pub mod visual;

pub use audio::{compose_full_audio, FullAudioRequest};
pub use commands::EncodeSettings;
pub use compose::{
    CompositionProgress, CompositionRequest, CompositionResult, Compositor, MediaArtifact, Track,
};
pub use engine::{EncodingEngine, FfmpegEngine, ListenerId, LogHandler, ScriptedEngine};
pub use session::{EngineFactory, EnginePool, FfmpegFactory, SessionKind};
pub use visual::{compose_silent_video, SilentVideoRequest};
