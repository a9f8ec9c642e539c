//! Scoped progress capture around single engine requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clipweave_common::error::{ClipweaveError, ClipweaveResult};
use clipweave_processing_core::progress::{derive_progress, ProgressReporter, Stage};

use crate::engine::{EncodingEngine, ListenerId};

/// A log listener attached for the duration of one request.
///
/// Dropping the capture first silences it and then detaches it, so lines the
/// engine delivers after the request has finished never reach `on_percent`.
pub struct ProgressCapture<'a> {
    engine: &'a dyn EncodingEngine,
    id: ListenerId,
    active: Arc<AtomicBool>,
}

impl<'a> ProgressCapture<'a> {
    /// Translate status lines into percentages of `total_ms`.
    pub fn attach(
        engine: &'a dyn EncodingEngine,
        total_ms: u64,
        on_percent: impl Fn(f64) + Send + Sync + 'static,
    ) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&active);
        let id = engine.on_log(Arc::new(move |line: &str| {
            if !gate.load(Ordering::Acquire) {
                return;
            }
            if let Some(percent) = derive_progress(line, total_ms) {
                on_percent(percent);
            }
        }));
        Self { engine, id, active }
    }
}

impl Drop for ProgressCapture<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        self.engine.off_log(self.id);
    }
}

/// Run one request; a non-zero exit code becomes an encoding error for `stage_name`.
pub async fn run_request(
    engine: &dyn EncodingEngine,
    args: &[String],
    stage_name: &str,
) -> ClipweaveResult<()> {
    let _turn = engine.request_gate().lock().await;
    exec_checked(engine, args, stage_name).await
}

async fn exec_checked(
    engine: &dyn EncodingEngine,
    args: &[String],
    stage_name: &str,
) -> ClipweaveResult<()> {
    let exit_code = engine.exec(args).await?;
    if exit_code != 0 {
        tracing::warn!(
            session = engine.label(),
            stage = stage_name,
            exit_code,
            "Engine request failed"
        );
        return Err(ClipweaveError::encoding(stage_name, exit_code));
    }
    Ok(())
}

/// Progress target of a tracked request.
#[derive(Clone, Copy)]
pub struct Tracked<'r> {
    pub reporter: &'r Arc<ProgressReporter>,
    pub stage: Stage,
    /// Expected output duration, the denominator of status-line progress.
    pub total_ms: u64,
    pub message: &'static str,
}

/// Run one request while mapping its progress into `tracked.stage`.
///
/// The session's request gate is held from listener attach to detach. On
/// success the stage is reported complete.
pub async fn run_tracked(
    engine: &dyn EncodingEngine,
    args: &[String],
    stage_name: &str,
    tracked: Tracked<'_>,
) -> ClipweaveResult<()> {
    let reporter = Arc::clone(tracked.reporter);
    let stage = tracked.stage;
    let message = tracked.message;

    let turn = engine.request_gate().lock().await;
    let capture = ProgressCapture::attach(engine, tracked.total_ms, move |raw| {
        reporter.report(stage.scale(raw), message);
    });
    let result = exec_checked(engine, args, stage_name).await;
    drop(capture);
    drop(turn);

    result?;
    tracked.reporter.report(stage.target, message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedEngine;
    use std::sync::Mutex;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    fn recording_reporter() -> (Arc<ProgressReporter>, Arc<Mutex<Vec<f64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = Arc::new(ProgressReporter::new(move |p, _| sink.lock().unwrap().push(p)));
        (reporter, seen)
    }

    #[tokio::test]
    async fn test_capture_maps_lines_into_stage_and_detaches() {
        let engine = ScriptedEngine::new("test");
        engine.emit_when("anullsrc", &["size=       1kB time=00:00:01.00 bitrate=N/A speed=1x"]);
        let (reporter, seen) = recording_reporter();

        run_tracked(
            &engine,
            &args(&["-f", "lavfi", "-i", "anullsrc", "-t", "2", "out.mp3"]),
            "base audio",
            Tracked {
                reporter: &reporter,
                stage: Stage::new(0.0, 25.0),
                total_ms: 2000,
                message: "Creating base audio...",
            },
        )
        .await
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![12.5, 25.0]);
        assert_eq!(engine.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_trailing_lines_after_drop_are_ignored() {
        let engine = ScriptedEngine::new("test");
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let capture = ProgressCapture::attach(&engine, 1000, move |_| *counter.lock().unwrap() += 1);

        engine.emit("frame=   1 fps=0 time=00:00:00.50 speed=1x");
        drop(capture);
        engine.emit("frame=   2 fps=0 time=00:00:01.00 speed=1x");

        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_request_names_stage_and_skips_completion() {
        let engine = ScriptedEngine::new("test");
        engine.fail_when("concat", 1);
        let (reporter, seen) = recording_reporter();

        let err = run_tracked(
            &engine,
            &args(&["-f", "concat", "-i", "list.txt", "out.mp4"]),
            "concatenation",
            Tracked {
                reporter: &reporter,
                stage: Stage::new(70.0, 100.0),
                total_ms: 1000,
                message: "Merging audio and video...",
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.failed_stage(), Some("concatenation"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requests_only_see_their_own_lines() {
        let engine = ScriptedEngine::new("test");
        engine.emit_when("second.mp3", &["size=       1kB time=00:00:10.00 bitrate=N/A speed=1x"]);
        let (first_reporter, first_seen) = recording_reporter();
        let (second_reporter, second_seen) = recording_reporter();
        let first_args = args(&["-f", "lavfi", "-i", "anullsrc", "-t", "20", "first.mp3"]);
        let second_args = args(&["-f", "lavfi", "-i", "anullsrc", "-t", "20", "second.mp3"]);

        let (first, second) = tokio::join!(
            run_tracked(
                &engine,
                &first_args,
                "base audio",
                Tracked {
                    reporter: &first_reporter,
                    stage: Stage::new(0.0, 25.0),
                    total_ms: 20_000,
                    message: "Creating base audio...",
                },
            ),
            run_tracked(
                &engine,
                &second_args,
                "base audio",
                Tracked {
                    reporter: &second_reporter,
                    stage: Stage::new(0.0, 25.0),
                    total_ms: 20_000,
                    message: "Creating base audio...",
                },
            ),
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(*first_seen.lock().unwrap(), vec![25.0]);
        assert_eq!(*second_seen.lock().unwrap(), vec![12.5, 25.0]);
        assert_eq!(engine.listener_count(), 0);
    }
}
