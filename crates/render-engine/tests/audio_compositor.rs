use std::sync::{Arc, Mutex};

use bytes::Bytes;

use clipweave_processing_core::ProgressReporter;
use clipweave_render_engine::{compose_full_audio, FullAudioRequest, ScriptedEngine};
use clipweave_timeline_model::{AudioInput, TimeRange};

fn clip(start: u64, end: u64) -> AudioInput {
    AudioInput {
        data: Some(Bytes::from_static(b"mp3 bytes")),
        range: TimeRange::new(start, end).unwrap(),
    }
}

fn request(clips: Vec<AudioInput>, total_ms: u64) -> FullAudioRequest {
    FullAudioRequest {
        clips,
        filename: "audio.mp3".to_string(),
        total_ms,
    }
}

fn recording_reporter() -> (Arc<ProgressReporter>, Arc<Mutex<Vec<(f64, String)>>>) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let reporter = ProgressReporter::new(move |percent, message: &str| {
        sink.lock().unwrap().push((percent, message.to_string()));
    });
    (Arc::new(reporter), reports)
}

fn value_after<'a>(request: &'a [String], flag: &str) -> Option<&'a str> {
    let position = request.iter().position(|arg| arg == flag)?;
    request.get(position + 1).map(String::as_str)
}

#[tokio::test]
async fn no_clips_yields_silent_base_without_mixing() {
    let engine = Arc::new(ScriptedEngine::new("audio"));
    let (reporter, reports) = recording_reporter();

    compose_full_audio(engine.clone(), &request(vec![], 3000), &reporter)
        .await
        .unwrap();

    let requests = engine.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].iter().any(|a| a == "anullsrc"));
    assert_eq!(value_after(&requests[0], "-t"), Some("3"));
    assert_eq!(requests[0].last().map(String::as_str), Some("audio.mp3"));
    assert_eq!(engine.file_names(), vec!["audio.mp3".to_string()]);

    let last = reports.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last, (100.0, "Prepared audios...".to_string()));
}

#[tokio::test]
async fn clips_without_content_are_not_mixed() {
    let engine = Arc::new(ScriptedEngine::new("audio"));
    let pending = AudioInput {
        data: None,
        range: TimeRange::new(0, 1000).unwrap(),
    };

    compose_full_audio(engine.clone(), &request(vec![pending], 2000), &Arc::new(ProgressReporter::silent()))
        .await
        .unwrap();

    let requests = engine.requests();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].iter().any(|a| a.contains("amix")));
}

#[tokio::test]
async fn clips_are_delayed_trimmed_and_mixed() {
    let engine = Arc::new(ScriptedEngine::new("audio"));
    let (reporter, reports) = recording_reporter();

    compose_full_audio(engine.clone(), &request(vec![clip(500, 4000), clip(2000, 3000)], 5000), &reporter)
        .await
        .unwrap();

    let requests = engine.requests();
    assert_eq!(requests.len(), 2);

    let base = requests[0].last().unwrap();
    assert!(base.starts_with("base_audio_") && base.ends_with(".mp3"));

    let mix = &requests[1];
    assert_eq!(
        value_after(mix, "-filter_complex"),
        Some(
            "[1:a]atrim=0:3.5,adelay=500|500[delayed0]; \
             [2:a]atrim=0:1,adelay=2000|2000[delayed1]; \
             [0:a][delayed0][delayed1]amix=inputs=3:duration=longest[a]"
        )
    );
    let inputs: Vec<&String> = mix
        .windows(2)
        .filter(|w| w[0] == "-i")
        .map(|w| &w[1])
        .collect();
    assert_eq!(inputs.len(), 3);
    assert_eq!(inputs[0], base);
    assert!(inputs[1].starts_with("audio_"));
    assert_eq!(value_after(mix, "-map"), Some("[a]"));
    assert_eq!(value_after(mix, "-t"), Some("5"));

    assert_eq!(engine.file_names(), vec!["audio.mp3".to_string()]);

    let values: Vec<f64> = reports.lock().unwrap().iter().map(|(p, _)| *p).collect();
    // base done, then each clip's share of [25, 50] sized by clip length
    assert_eq!(values[0], 25.0);
    assert!((values[1] - (25.0 + 25.0 * 3500.0 / 4500.0)).abs() < 1e-9);
    assert!((values[2] - 50.0).abs() < 1e-9);
    assert_eq!(values.last().copied(), Some(100.0));
}

#[tokio::test]
async fn failed_mix_reports_stage_and_cleans_up() {
    let engine = Arc::new(ScriptedEngine::new("audio"));
    engine.fail_when("amix", 1);

    let err = compose_full_audio(engine.clone(), &request(vec![clip(0, 1000)], 1000), &Arc::new(ProgressReporter::silent()))
        .await
        .unwrap_err();

    assert_eq!(err.failed_stage(), Some("audio mix"));
    assert!(engine.file_names().is_empty());
}

#[tokio::test]
async fn failed_base_track_stops_before_mixing() {
    let engine = Arc::new(ScriptedEngine::new("audio"));
    engine.fail_when("anullsrc", 1);

    let err = compose_full_audio(engine.clone(), &request(vec![clip(0, 1000)], 1000), &Arc::new(ProgressReporter::silent()))
        .await
        .unwrap_err();

    assert_eq!(err.failed_stage(), Some("base audio"));
    assert_eq!(engine.requests().len(), 1);
}

#[tokio::test]
async fn concurrent_calls_on_one_session_keep_their_progress_apart() {
    let engine = Arc::new(ScriptedEngine::new("audio"));
    engine.emit_when("second.mp3", &["size=       1kB time=00:00:10.00 bitrate=N/A speed=1x"]);
    let (first_reporter, first_reports) = recording_reporter();
    let (second_reporter, second_reports) = recording_reporter();
    let first = request(vec![], 20_000);
    let mut second = request(vec![], 20_000);
    second.filename = "second.mp3".to_string();

    let (a, b) = tokio::join!(
        compose_full_audio(engine.clone(), &first, &first_reporter),
        compose_full_audio(engine.clone(), &second, &second_reporter),
    );
    a.unwrap();
    b.unwrap();

    let first_values: Vec<f64> = first_reports.lock().unwrap().iter().map(|(p, _)| *p).collect();
    assert_eq!(first_values, vec![25.0, 100.0]);
    let second_values: Vec<f64> = second_reports.lock().unwrap().iter().map(|(p, _)| *p).collect();
    assert_eq!(second_values, vec![12.5, 25.0, 100.0]);
    assert_eq!(engine.listener_count(), 0);
}
