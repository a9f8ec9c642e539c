//! Clipweave Timeline Model
//!
//! Defines the data contracts shared by the compositors:
//! - **Ranges:** Half-open millisecond intervals on the timeline
//! - **Assets:** Video, image, audio, and empty segments as a tagged variant
//! - **Covering:** The gapless, ordered visual sequence spanning a timeline
//! - **Manifest:** The JSON form of a timeline as handed over by an editor
//!
//! All times are absolute timeline positions in milliseconds.

pub mod asset;
pub mod covering;
pub mod manifest;
pub mod range;

pub use asset::*;
pub use covering::*;
pub use manifest::*;
pub use range::*;
