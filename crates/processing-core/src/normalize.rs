//! Gap-and-overlap normalization of the visual lane.
//!
//! Turns the sparse, unordered image and video segments of a timeline into a
//! [`Covering`]: every millisecond of `[0, total)` belongs to exactly one
//! entry, and uncovered stretches become explicit `Empty` entries.
//!
//! Overlap policy:
//! - An image is cut at the start of the earliest video that begins inside
//!   it. Videos win over stills.
//! - Any other overlap is resolved in timeline order: the later entry loses
//!   its head up to where the earlier one ends.
//! - Content beyond the timeline end is clipped to it.
//!
//! Entries whose width reaches zero along the way are dropped.

use clipweave_timeline_model::{Covering, ImageInput, TimeRange, VideoInput, VisualSegment};

/// Build the covering of `[0, total_ms)` for the given visual segments.
///
/// Inputs are not modified; the covering holds derived copies.
pub fn normalize(images: &[ImageInput], videos: &[VideoInput], total_ms: u64) -> Covering {
    let mut content: Vec<VisualSegment> = images
        .iter()
        .cloned()
        .map(VisualSegment::from)
        .chain(videos.iter().cloned().map(VisualSegment::from))
        .collect();

    // Stable: equal starts keep images ahead of videos.
    content.sort_by_key(|segment| segment.range().start_ms);

    yield_images_to_videos(&mut content);

    let mut entries = Vec::with_capacity(content.len() * 2 + 1);
    let mut cursor = 0u64;

    for mut segment in content {
        let original = segment.range();
        let mut range = original;
        range.truncate_end(total_ms);
        range.truncate_start(cursor);

        if range.is_empty() {
            tracing::warn!(
                kind = %segment.kind(),
                range = %original,
                "Dropping segment with no visible duration"
            );
            continue;
        }
        if range != original {
            tracing::debug!(
                kind = %segment.kind(),
                from = %original,
                to = %range,
                "Clipped overlapping segment"
            );
            *segment.range_mut() = range;
        }

        if range.start_ms > cursor {
            entries.push(filler(cursor, range.start_ms));
        }
        cursor = range.end_ms;
        entries.push(segment);
    }

    if cursor < total_ms {
        entries.push(filler(cursor, total_ms));
    }

    Covering::from_entries(entries, total_ms)
}

/// Cut every image at the first video starting inside it.
///
/// `content` is sorted by start, so candidate videos all sit after the image.
fn yield_images_to_videos(content: &mut [VisualSegment]) {
    for i in 0..content.len() {
        let range = match &content[i] {
            VisualSegment::Image(image) => image.range,
            _ => continue,
        };
        let first_video_start = content[i + 1..]
            .iter()
            .filter_map(|segment| match segment {
                VisualSegment::Video(video) => Some(video.range.start_ms),
                _ => None,
            })
            .filter(|&start| start >= range.start_ms && start < range.end_ms)
            .min();
        if let (Some(cut), VisualSegment::Image(image)) = (first_video_start, &mut content[i]) {
            image.range.truncate_end(cut);
        }
    }
}

fn filler(start_ms: u64, end_ms: u64) -> VisualSegment {
    VisualSegment::Empty(TimeRange { start_ms, end_ms })
}
