//! Clipweave Processing Core
//!
//! Pure timeline computations used by the compositors:
//! - **Normalization:** Resolve gaps and overlaps into a gapless covering
//! - **Progress:** Parse engine status lines and combine weighted stages
//!
//! Pure computation: no I/O and no engine access.

pub mod normalize;
pub mod progress;

pub use normalize::normalize;
pub use progress::{
    derive_progress, derive_progress_ms, scale_progress, LaneProgress, ProgressReporter, Stage,
};
