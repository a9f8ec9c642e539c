//! Timed media segments handed to the compositors.
//!
//! Each variant carries exactly the fields it needs, so an image always has
//! dimensions and a video always has a frame rate. Encoded bytes are shared
//! (`Bytes`), which keeps the derived copies made during normalization cheap.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::range::TimeRange;

/// Segment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Image,
    Audio,
    Empty,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Empty => "empty",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encoded video clip placed on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInput {
    pub data: Bytes,
    pub range: TimeRange,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

/// An encoded still image held on screen for its range.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInput {
    pub data: Bytes,
    pub range: TimeRange,
    pub width: u32,
    pub height: u32,
}

impl ImageInput {
    /// Whether the still must be rescaled before it fits a `width x height` frame.
    pub fn needs_scaling(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }
}

/// An audio clip. `data` is `None` while the clip has no rendered content.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInput {
    pub data: Option<Bytes>,
    pub range: TimeRange,
}

impl AudioInput {
    /// Length of the trim window: the clip's own length.
    pub fn trim_ms(&self) -> u64 {
        self.range.duration_ms()
    }

    /// Offset at which the clip starts playing, in milliseconds.
    pub fn delay_ms(&self) -> u64 {
        self.range.start_ms
    }
}

/// Any segment supplied by the timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetInput {
    Video(VideoInput),
    Image(ImageInput),
    Audio(AudioInput),
    Empty(TimeRange),
}

impl AssetInput {
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Video(_) => AssetKind::Video,
            Self::Image(_) => AssetKind::Image,
            Self::Audio(_) => AssetKind::Audio,
            Self::Empty(_) => AssetKind::Empty,
        }
    }

    pub fn range(&self) -> TimeRange {
        match self {
            Self::Video(v) => v.range,
            Self::Image(i) => i.range,
            Self::Audio(a) => a.range,
            Self::Empty(r) => *r,
        }
    }
}

/// Split a mixed asset list into its image, video, and audio lanes.
///
/// `Empty` assets carry no content and are left for the normalizer to
/// recreate from the gaps.
pub fn split_lanes(assets: Vec<AssetInput>) -> (Vec<ImageInput>, Vec<VideoInput>, Vec<AudioInput>) {
    let mut images = Vec::new();
    let mut videos = Vec::new();
    let mut audios = Vec::new();
    for asset in assets {
        match asset {
            AssetInput::Image(image) => images.push(image),
            AssetInput::Video(video) => videos.push(video),
            AssetInput::Audio(audio) => audios.push(audio),
            AssetInput::Empty(_) => {}
        }
    }
    (images, videos, audios)
}

/// One entry of a visual covering.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualSegment {
    Image(ImageInput),
    Video(VideoInput),
    Empty(TimeRange),
}

impl VisualSegment {
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Image(_) => AssetKind::Image,
            Self::Video(_) => AssetKind::Video,
            Self::Empty(_) => AssetKind::Empty,
        }
    }

    pub fn range(&self) -> TimeRange {
        match self {
            Self::Image(i) => i.range,
            Self::Video(v) => v.range,
            Self::Empty(r) => *r,
        }
    }

    pub fn range_mut(&mut self) -> &mut TimeRange {
        match self {
            Self::Image(i) => &mut i.range,
            Self::Video(v) => &mut v.range,
            Self::Empty(r) => r,
        }
    }
}

impl From<ImageInput> for VisualSegment {
    fn from(image: ImageInput) -> Self {
        Self::Image(image)
    }
}

impl From<VideoInput> for VisualSegment {
    fn from(video: VideoInput) -> Self {
        Self::Video(video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> TimeRange {
        TimeRange::new(start, end).unwrap()
    }

    #[test]
    fn test_split_lanes_drops_empty_assets() {
        let assets = vec![
            AssetInput::Empty(range(0, 1000)),
            AssetInput::Image(ImageInput {
                data: Bytes::from_static(b"jpg"),
                range: range(0, 1000),
                width: 640,
                height: 480,
            }),
            AssetInput::Audio(AudioInput {
                data: None,
                range: range(0, 500),
            }),
            AssetInput::Video(VideoInput {
                data: Bytes::from_static(b"mp4"),
                range: range(1000, 2000),
                width: 640,
                height: 480,
                framerate: 25,
            }),
        ];

        let (images, videos, audios) = split_lanes(assets);
        assert_eq!(images.len(), 1);
        assert_eq!(videos.len(), 1);
        assert_eq!(audios.len(), 1);
    }

    #[test]
    fn test_audio_trim_window_is_clip_length() {
        let clip = AudioInput {
            data: None,
            range: range(2000, 5500),
        };
        assert_eq!(clip.trim_ms(), 3500);
        assert_eq!(clip.delay_ms(), 2000);
    }

    #[test]
    fn test_image_scaling_check() {
        let image = ImageInput {
            data: Bytes::new(),
            range: range(0, 1000),
            width: 800,
            height: 600,
        };
        assert!(image.needs_scaling(1024, 576));
        assert!(!image.needs_scaling(800, 600));
    }
}
