//! Gapless visual coverings of a timeline.

use crate::asset::VisualSegment;

/// Ordered visual entries spanning `[0, total_ms)` exactly once.
///
/// Built by the normalizer; the compositors only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct Covering {
    entries: Vec<VisualSegment>,
    total_ms: u64,
}

impl Covering {
    /// Wrap entries that the caller has already laid out contiguously.
    pub fn from_entries(entries: Vec<VisualSegment>, total_ms: u64) -> Self {
        Self { entries, total_ms }
    }

    pub fn entries(&self) -> &[VisualSegment] {
        &self.entries
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VisualSegment> {
        self.entries.iter()
    }

    /// Check the covering invariants: first entry starts at zero, each entry
    /// ends where the next begins, the last ends at `total_ms`, and no entry
    /// has zero width.
    pub fn is_contiguous(&self) -> bool {
        if self.total_ms == 0 {
            return self.entries.is_empty();
        }
        let Some(first) = self.entries.first() else {
            return false;
        };
        if first.range().start_ms != 0 {
            return false;
        }
        if self.entries.iter().any(|e| e.range().is_empty()) {
            return false;
        }
        let joined = self
            .entries
            .windows(2)
            .all(|pair| pair[0].range().end_ms == pair[1].range().start_ms);
        let last_end = self.entries.last().map(|e| e.range().end_ms);
        joined && last_end == Some(self.total_ms)
    }

    /// Short human-readable layout, e.g. `empty 0-1000ms | video 1000-3000ms`.
    pub fn describe(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} {}", e.kind(), e.range()))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl<'a> IntoIterator for &'a Covering {
    type Item = &'a VisualSegment;
    type IntoIter = std::slice::Iter<'a, VisualSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::TimeRange;

    fn empty(start: u64, end: u64) -> VisualSegment {
        VisualSegment::Empty(TimeRange::new(start, end).unwrap())
    }

    #[test]
    fn test_contiguous_covering() {
        let covering = Covering::from_entries(vec![empty(0, 1000), empty(1000, 2500)], 2500);
        assert!(covering.is_contiguous());
        assert_eq!(covering.describe(), "empty 0-1000ms | empty 1000-2500ms");
    }

    #[test]
    fn test_gap_breaks_contiguity() {
        let covering = Covering::from_entries(vec![empty(0, 1000), empty(1200, 2500)], 2500);
        assert!(!covering.is_contiguous());
    }

    #[test]
    fn test_short_covering_is_not_contiguous() {
        let covering = Covering::from_entries(vec![empty(0, 1000)], 2000);
        assert!(!covering.is_contiguous());
    }
}
