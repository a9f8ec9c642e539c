//! Progress accounting across multi-step encoding work.
//!
//! Engine requests report progress as log lines carrying an output timestamp
//! (`time=HH:MM:SS.CC`). Those are turned into a percentage of the request's
//! expected duration, then mapped into the [`Stage`] that request owns on the
//! overall 0-100 scale. [`ProgressReporter`] makes the final figure
//! monotonic, so repeated or out-of-order reports never move it backwards.

use std::sync::Mutex;

/// Line prefixes of ffmpeg's periodic status output: `frame=` while
/// encoding video, `size=` while encoding audio only.
const PROGRESS_PREFIXES: [&str; 2] = ["frame", "size"];

const TIME_MARKER: &str = "time=";

/// Output timestamp carried by an engine status line, in milliseconds.
///
/// Returns `None` for any line that is not a status line or whose timestamp
/// is unavailable (`time=N/A`).
pub fn derive_progress_ms(line: &str) -> Option<u64> {
    let line = line.trim_start();
    if !PROGRESS_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return None;
    }
    let start = line.find(TIME_MARKER)? + TIME_MARKER.len();
    let token = line[start..].split_whitespace().next()?;
    parse_timestamp_ms(token)
}

/// Percentage of `total_ms` reached according to `line`.
///
/// A zero `total_ms` means there is nothing to wait for, so any status line
/// reports completion.
pub fn derive_progress(line: &str, total_ms: u64) -> Option<f64> {
    let elapsed_ms = derive_progress_ms(line)?;
    if total_ms == 0 {
        return Some(100.0);
    }
    Some((elapsed_ms as f64 / total_ms as f64 * 100.0).clamp(0.0, 100.0))
}

/// Parse `HH:MM:SS.CC` into milliseconds.
fn parse_timestamp_ms(token: &str) -> Option<u64> {
    let mut parts = token.split(':');
    let hours = parse_digits(parts.next()?, 2, usize::MAX)?;
    let minutes = parse_digits(parts.next()?, 2, 2)?;
    let (seconds, fraction) = parts.next()?.split_once('.')?;
    if parts.next().is_some() {
        return None;
    }
    let seconds = parse_digits(seconds, 2, 2)?;
    // Only centiseconds are significant; finer digits are ignored.
    let centis = parse_digits(fraction.get(..2)?, 2, 2)?;
    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + centis * 10)
}

fn parse_digits(raw: &str, min_len: usize, max_len: usize) -> Option<u64> {
    if raw.len() < min_len || raw.len() > max_len || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Map `raw` in `[0, 100]` linearly onto `[start, target]`.
pub fn scale_progress(raw: f64, start: f64, target: f64) -> f64 {
    start + raw * (target - start) / 100.0
}

/// A slice of the overall 0-100 progress scale owned by one unit of work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage {
    pub start: f64,
    pub target: f64,
}

impl Stage {
    pub fn new(start: f64, target: f64) -> Self {
        Self { start, target }
    }

    /// Overall value reached when this stage's own work is `raw` percent done.
    pub fn scale(&self, raw: f64) -> f64 {
        scale_progress(raw.clamp(0.0, 100.0), self.start, self.target)
    }

    /// Nested stage covering `[from, to]` of this stage's own 0-100 scale.
    pub fn sub(&self, from: f64, to: f64) -> Stage {
        Stage {
            start: self.scale(from),
            target: self.scale(to),
        }
    }

    pub fn width(&self) -> f64 {
        self.target - self.start
    }

    /// Split this stage into consecutive children sized by `weights`.
    ///
    /// Children are laid out back to back without overlap. Zero-weight
    /// children get a zero-width stage at the current position; when every
    /// weight is zero all children collapse onto `start`.
    pub fn partition(&self, weights: &[f64]) -> Vec<Stage> {
        let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
        let mut cursor = self.start;
        weights
            .iter()
            .map(|weight| {
                let share = if total > 0.0 {
                    weight.max(0.0) / total * self.width()
                } else {
                    0.0
                };
                let stage = Stage {
                    start: cursor,
                    target: cursor + share,
                };
                cursor += share;
                stage
            })
            .collect()
    }
}

type ProgressFn = dyn Fn(f64, &str) + Send + Sync;

/// Forwards progress to a caller callback, never reporting a lower value
/// than one already reported.
pub struct ProgressReporter {
    callback: Box<ProgressFn>,
    last: Mutex<f64>,
}

impl ProgressReporter {
    pub fn new(callback: impl Fn(f64, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            last: Mutex::new(0.0),
        }
    }

    /// Reporter that only tracks the value.
    pub fn silent() -> Self {
        Self::new(|_, _| {})
    }

    /// Report `percent` with a status message and return the value emitted.
    pub fn report(&self, percent: f64, message: &str) -> f64 {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let value = if percent.is_nan() {
            *last
        } else {
            percent.clamp(0.0, 100.0).max(*last)
        };
        *last = value;
        // Emitting under the lock keeps concurrent reports ordered.
        (self.callback)(value, message);
        value
    }

    /// Last value emitted.
    pub fn current(&self) -> f64 {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("current", &self.current())
            .finish()
    }
}

/// Weighted combination of lanes that advance concurrently.
#[derive(Debug)]
pub struct LaneProgress {
    weights: Vec<f64>,
    values: Mutex<Vec<f64>>,
}

impl LaneProgress {
    pub fn new(weights: &[f64]) -> Self {
        Self {
            weights: weights.iter().map(|w| w.max(0.0)).collect(),
            values: Mutex::new(vec![0.0; weights.len()]),
        }
    }

    /// Record `percent` for `lane` and return the combined value.
    ///
    /// A lane never moves backwards; unknown lanes are ignored.
    pub fn update(&self, lane: usize, percent: f64) -> f64 {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(value) = values.get_mut(lane) {
            if percent > *value {
                *value = percent.min(100.0);
            }
        }
        let total: f64 = self.weights.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.weights
            .iter()
            .zip(values.iter())
            .map(|(w, v)| w * v)
            .sum::<f64>()
            / total
    }
}
