//! Time ranges on the timeline.

use serde::{Deserialize, Serialize};

use crate::manifest::TimelineError;

/// Half-open interval `[start_ms, end_ms)` in timeline milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimeRange {
    /// Build a range, rejecting zero-width or inverted intervals.
    pub fn new(start_ms: u64, end_ms: u64) -> Result<Self, TimelineError> {
        if end_ms <= start_ms {
            return Err(TimelineError::Malformed {
                message: format!("range end {end_ms}ms is not after start {start_ms}ms"),
            });
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Zero-width ranges can appear after overlap resolution.
    pub fn is_empty(&self) -> bool {
        self.end_ms <= self.start_ms
    }

    /// Pull the end back to `end_ms`. Never extends the range.
    pub fn truncate_end(&mut self, end_ms: u64) {
        self.end_ms = self.end_ms.min(end_ms).max(self.start_ms);
    }

    /// Push the start forward to `start_ms`. Never extends the range.
    pub fn truncate_start(&mut self, start_ms: u64) {
        self.start_ms = self.start_ms.max(start_ms).min(self.end_ms);
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}ms", self.start_ms, self.end_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_inverted_and_empty_ranges() {
        assert!(TimeRange::new(1000, 1000).is_err());
        assert!(TimeRange::new(2000, 1000).is_err());
        assert!(TimeRange::new(0, 1).is_ok());
    }

    #[test]
    fn test_duration_ms() {
        let range = TimeRange::new(1500, 4000).unwrap();
        assert_eq!(range.duration_ms(), 2500);
    }

    #[test]
    fn test_truncate_end_only_shrinks() {
        let mut range = TimeRange::new(0, 2000).unwrap();
        range.truncate_end(3000);
        assert_eq!(range.end_ms, 2000);
        range.truncate_end(1500);
        assert_eq!(range.end_ms, 1500);
    }

    #[test]
    fn test_truncate_past_start_yields_empty_range() {
        let mut range = TimeRange::new(1000, 2000).unwrap();
        range.truncate_end(500);
        assert!(range.is_empty());
        assert_eq!(range.duration_ms(), 0);
    }
}
