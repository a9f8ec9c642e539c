//! Timeline manifests (`timeline.json`).
//!
//! A manifest is the serialized hand-off from an editor: output geometry plus
//! the list of timed segments, each pointing at a media file relative to the
//! manifest's directory.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::asset::{AssetInput, AssetKind, AudioInput, ImageInput, VideoInput};
use crate::range::TimeRange;

/// Top-level manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineManifest {
    /// Total timeline length. Defaults to the latest segment end.
    #[serde(default)]
    pub duration_ms: Option<u64>,

    /// Output frame size.
    pub width: u32,
    pub height: u32,

    /// Output frame rate.
    #[serde(default = "default_framerate")]
    pub framerate: u32,

    /// Timed segments in any order.
    #[serde(default)]
    pub segments: Vec<SegmentRef>,
}

/// One segment entry of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRef {
    pub kind: AssetKind,

    /// Media file relative to the manifest directory. Audio segments may
    /// omit it while their content is still being produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    pub start_ms: u64,
    pub end_ms: u64,

    /// Native frame size of images and videos. Defaults to the output size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Native frame rate of videos. Defaults to the output frame rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framerate: Option<u32>,
}

fn default_framerate() -> u32 {
    25
}

impl TimelineManifest {
    /// Resolved timeline length.
    pub fn total_duration_ms(&self) -> u64 {
        self.duration_ms.unwrap_or_else(|| {
            self.segments
                .iter()
                .map(|s| s.end_ms)
                .max()
                .unwrap_or(0)
        })
    }

    /// Small manifest used by `clipweave init`.
    pub fn example() -> Self {
        Self {
            duration_ms: Some(5000),
            width: 1024,
            height: 576,
            framerate: 25,
            segments: vec![
                SegmentRef {
                    kind: AssetKind::Image,
                    path: Some("media/still.jpg".to_string()),
                    start_ms: 0,
                    end_ms: 1200,
                    width: Some(800),
                    height: Some(600),
                    framerate: None,
                },
                SegmentRef {
                    kind: AssetKind::Video,
                    path: Some("media/clip.mp4".to_string()),
                    start_ms: 1000,
                    end_ms: 3000,
                    width: None,
                    height: None,
                    framerate: Some(25),
                },
                SegmentRef {
                    kind: AssetKind::Audio,
                    path: Some("media/voice.mp3".to_string()),
                    start_ms: 500,
                    end_ms: 4000,
                    width: None,
                    height: None,
                    framerate: None,
                },
            ],
        }
    }

    /// Problems that make individual segments unusable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = vec![];
        if self.width == 0 || self.height == 0 {
            errors.push(format!(
                "Output size {}x{} is degenerate",
                self.width, self.height
            ));
        }
        if self.framerate == 0 {
            errors.push("Frame rate must be positive".to_string());
        }
        for (index, segment) in self.segments.iter().enumerate() {
            if segment.end_ms <= segment.start_ms {
                errors.push(format!(
                    "Segment #{index} ({}) has empty range {}-{}ms",
                    segment.kind, segment.start_ms, segment.end_ms
                ));
            }
            let needs_path = matches!(segment.kind, AssetKind::Image | AssetKind::Video);
            if needs_path && segment.path.is_none() {
                errors.push(format!("Segment #{index} ({}) has no media path", segment.kind));
            }
        }
        errors
    }
}

/// A manifest loaded from disk with its media resolved to assets.
#[derive(Debug, Clone)]
pub struct LoadedTimeline {
    /// Directory containing the manifest; media paths resolve against it.
    pub root: PathBuf,

    /// Parsed manifest.
    pub manifest: TimelineManifest,

    /// Usable segments in manifest order.
    pub assets: Vec<AssetInput>,
}

impl LoadedTimeline {
    /// Load a manifest file and read every referenced media file.
    ///
    /// Segments with a degenerate range or a missing path are skipped with a
    /// warning; unreadable media files are an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TimelineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TimelineError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let manifest: TimelineManifest =
            serde_json::from_str(&content).map_err(|e| TimelineError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_manifest(root, manifest)
    }

    /// Resolve an in-memory manifest against `root`.
    pub fn from_manifest(
        root: impl Into<PathBuf>,
        manifest: TimelineManifest,
    ) -> Result<Self, TimelineError> {
        let root = root.into();
        let mut assets = Vec::with_capacity(manifest.segments.len());
        for (index, segment) in manifest.segments.iter().enumerate() {
            match resolve_segment(&root, &manifest, segment) {
                Ok(asset) => assets.push(asset),
                Err(TimelineError::Malformed { message }) => {
                    tracing::warn!(index, kind = %segment.kind, "Skipping segment: {message}");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(Self {
            root,
            manifest,
            assets,
        })
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.manifest.total_duration_ms()
    }

    /// Write the manifest as `timeline.json` inside `dir`.
    pub fn save_manifest(dir: impl AsRef<Path>, manifest: &TimelineManifest) -> Result<PathBuf, TimelineError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| TimelineError::IoError {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = dir.join("timeline.json");
        let json = serde_json::to_string_pretty(manifest).map_err(|e| TimelineError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| TimelineError::IoError {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

fn resolve_segment(
    root: &Path,
    manifest: &TimelineManifest,
    segment: &SegmentRef,
) -> Result<AssetInput, TimelineError> {
    let range = TimeRange::new(segment.start_ms, segment.end_ms)?;
    let read = |rel: &str| -> Result<Bytes, TimelineError> {
        let path = root.join(rel);
        std::fs::read(&path)
            .map(Bytes::from)
            .map_err(|e| TimelineError::IoError { path, source: e })
    };
    let required_path = || {
        segment.path.as_deref().ok_or_else(|| TimelineError::Malformed {
            message: format!("{} segment at {range} has no media path", segment.kind),
        })
    };

    let asset = match segment.kind {
        AssetKind::Video => AssetInput::Video(VideoInput {
            data: read(required_path()?)?,
            range,
            width: segment.width.unwrap_or(manifest.width),
            height: segment.height.unwrap_or(manifest.height),
            framerate: segment.framerate.unwrap_or(manifest.framerate),
        }),
        AssetKind::Image => AssetInput::Image(ImageInput {
            data: read(required_path()?)?,
            range,
            width: segment.width.unwrap_or(manifest.width),
            height: segment.height.unwrap_or(manifest.height),
        }),
        AssetKind::Audio => AssetInput::Audio(AudioInput {
            data: segment.path.as_deref().map(read).transpose()?,
            range,
        }),
        AssetKind::Empty => AssetInput::Empty(range),
    };
    Ok(asset)
}

/// Errors that can occur when working with timelines.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Malformed segment: {message}")]
    Malformed { message: String },
}

impl From<TimelineError> for clipweave_common::ClipweaveError {
    fn from(err: TimelineError) -> Self {
        match err {
            TimelineError::IoError { path, source } => {
                if source.kind() == std::io::ErrorKind::NotFound {
                    Self::FileNotFound { path }
                } else {
                    Self::Io(source)
                }
            }
            TimelineError::ParseError { source, .. } => Self::Json(source),
            TimelineError::Malformed { message } => Self::MalformedInput { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_defaults_to_latest_segment_end() {
        let mut manifest = TimelineManifest::example();
        manifest.duration_ms = None;
        assert_eq!(manifest.total_duration_ms(), 4000);
    }

    #[test]
    fn test_example_manifest_is_valid() {
        assert!(TimelineManifest::example().validate().is_empty());
    }

    #[test]
    fn test_validate_reports_degenerate_segments() {
        let mut manifest = TimelineManifest::example();
        manifest.segments[0].end_ms = manifest.segments[0].start_ms;
        manifest.segments[1].path = None;

        let errors = manifest.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("empty range"));
        assert!(errors[1].contains("no media path"));
    }

    #[test]
    fn test_manifest_deserialization_defaults() {
        let raw = r#"{
            "width": 640,
            "height": 360,
            "segments": [{"kind":"audio","start_ms":0,"end_ms":1000}]
        }"#;
        let manifest: TimelineManifest = serde_json::from_str(raw).unwrap();
        assert_eq!(manifest.framerate, 25);
        assert_eq!(manifest.duration_ms, None);
        assert!(manifest.segments[0].path.is_none());
    }

    #[test]
    fn test_malformed_maps_to_malformed_input() {
        let err: clipweave_common::ClipweaveError = TimelineError::Malformed {
            message: "bad".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            clipweave_common::ClipweaveError::MalformedInput { .. }
        ));
    }
}
