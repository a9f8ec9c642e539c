use std::sync::{Arc, Mutex};

use bytes::Bytes;

use clipweave_common::config::CompositionDefaults;
use clipweave_common::{ClipweaveError, ClipweaveResult};
use clipweave_render_engine::{
    CompositionProgress, CompositionRequest, Compositor, EncodingEngine, EnginePool, ScriptedEngine,
    SessionKind, Track,
};
use clipweave_timeline_model::{
    AssetInput, AudioInput, ImageInput, LoadedTimeline, TimeRange, TimelineManifest, VideoInput,
};

fn sample_assets() -> Vec<AssetInput> {
    vec![
        AssetInput::Image(ImageInput {
            data: Bytes::from_static(b"jpeg"),
            range: TimeRange::new(0, 2000).unwrap(),
            width: 800,
            height: 600,
        }),
        AssetInput::Video(VideoInput {
            data: Bytes::from_static(b"mp4"),
            range: TimeRange::new(1500, 4000).unwrap(),
            width: 1024,
            height: 576,
            framerate: 25,
        }),
        AssetInput::Audio(AudioInput {
            data: Some(Bytes::from_static(b"mp3")),
            range: TimeRange::new(500, 3000).unwrap(),
        }),
    ]
}

fn sample_request() -> CompositionRequest {
    CompositionRequest {
        assets: sample_assets(),
        total_ms: 5000,
        width: 1024,
        height: 576,
        framerate: 25,
        exclude_empty: false,
        video_filename: "video.mp4".to_string(),
        audio_filename: "audio.mp3".to_string(),
    }
}

fn recorder() -> (
    Arc<Mutex<Vec<CompositionProgress>>>,
    impl Fn(CompositionProgress) + Send + Sync + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |progress: CompositionProgress| sink.lock().unwrap().push(progress))
}

/// Pool handing out the given engines, so tests can script and inspect them.
fn pool_of(video: Arc<ScriptedEngine>, audio: Arc<ScriptedEngine>) -> EnginePool {
    EnginePool::new(move |kind: SessionKind| -> ClipweaveResult<Arc<dyn EncodingEngine>> {
        Ok(match kind {
            SessionKind::Video => Arc::clone(&video) as Arc<dyn EncodingEngine>,
            SessionKind::Audio => Arc::clone(&audio) as Arc<dyn EncodingEngine>,
        })
    })
}

#[tokio::test]
async fn both_tracks_are_composed_on_their_own_sessions() {
    let video = Arc::new(ScriptedEngine::new("video"));
    let audio = Arc::new(ScriptedEngine::new("audio"));
    video.simulate_progress(true);
    audio.simulate_progress(true);
    let pool = Arc::new(pool_of(Arc::clone(&video), Arc::clone(&audio)));
    let compositor = Compositor::new(pool, &CompositionDefaults::default());
    let (seen, on_progress) = recorder();

    let result = compositor.compose(sample_request(), on_progress).await.unwrap();

    assert_eq!(result.duration_ms, 5000);
    assert_eq!(result.video.filename(), "video.mp4");
    assert_eq!(result.audio.filename(), "audio.mp3");
    assert!(!result.video.read().await.unwrap().is_empty());
    assert!(!result.audio.read().await.unwrap().is_empty());

    assert!(video.requests().iter().any(|r| r.iter().any(|a| a == "concat")));
    assert!(audio.requests().iter().any(|r| r.iter().any(|a| a.contains("amix"))));
    assert!(!video.requests().iter().any(|r| r.iter().any(|a| a.contains("amix"))));

    let seen = seen.lock().unwrap();
    let values: Vec<f64> = seen.iter().map(|p| p.percent).collect();
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(values.last().copied(), Some(100.0));
    assert!(seen.iter().any(|p| p.track == Track::Video));
    assert!(seen.iter().any(|p| p.track == Track::Audio));
}

#[tokio::test]
async fn audio_failure_fails_the_composition() {
    let video = Arc::new(ScriptedEngine::new("video"));
    let audio = Arc::new(ScriptedEngine::new("audio"));
    audio.fail_when("amix", 1);
    let compositor = Compositor::new(
        Arc::new(pool_of(video, Arc::clone(&audio))),
        &CompositionDefaults::default(),
    );

    let err = compositor
        .compose(sample_request(), |_| {})
        .await
        .unwrap_err();

    assert_eq!(err.failed_stage(), Some("audio mix"));
}

#[tokio::test]
async fn failed_track_leaves_no_scratch_files_in_the_other_session() {
    let video = Arc::new(ScriptedEngine::new("video"));
    let audio = Arc::new(ScriptedEngine::new("audio"));
    video.fail_when("concat", 1);
    // Keep the mix running well past the video failure.
    let status: Vec<String> = (1..=20)
        .map(|i| format!("size=       1kB time=00:00:00.{i:02} bitrate=N/A speed=1x"))
        .collect();
    let status: Vec<&str> = status.iter().map(String::as_str).collect();
    audio.emit_when("amix", &status);
    let compositor = Compositor::new(
        Arc::new(pool_of(Arc::clone(&video), Arc::clone(&audio))),
        &CompositionDefaults::default(),
    );

    let err = compositor
        .compose(sample_request(), |_| {})
        .await
        .unwrap_err();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert_eq!(err.failed_stage(), Some("concatenation"));
    assert!(audio.requests().iter().any(|r| r.iter().any(|a| a.contains("amix"))));
    let leftovers: Vec<String> = audio
        .file_names()
        .into_iter()
        .filter(|name| name.starts_with("audio_") || name.starts_with("base_audio_"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
    assert!(video.file_names().is_empty());
}

#[tokio::test]
async fn invalid_request_starts_no_session() {
    let pool = Arc::new(EnginePool::scripted());
    let compositor = Compositor::new(Arc::clone(&pool), &CompositionDefaults::default());
    let mut request = sample_request();
    request.total_ms = 0;

    let err = compositor.compose(request, |_| {}).await.unwrap_err();

    assert!(matches!(err, ClipweaveError::MalformedInput { .. }));
    assert!(!pool.is_started(SessionKind::Video));
    assert!(!pool.is_started(SessionKind::Audio));
}

#[tokio::test]
async fn sessions_are_reused_across_calls() {
    let pool = Arc::new(EnginePool::scripted());
    let compositor = Compositor::new(Arc::clone(&pool), &CompositionDefaults::default());

    let first = compositor.compose(sample_request(), |_| {}).await.unwrap();
    let mut second_request = sample_request();
    second_request.video_filename = "second.mp4".to_string();
    let second = compositor.compose(second_request, |_| {}).await.unwrap();

    // Both outputs live in the same video session.
    assert!(first.video.read().await.is_ok());
    assert!(second.video.read().await.is_ok());
}

#[tokio::test]
async fn timeline_on_disk_composes_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("media");
    std::fs::create_dir_all(&media).unwrap();
    std::fs::write(media.join("still.jpg"), b"jpeg").unwrap();
    std::fs::write(media.join("clip.mp4"), b"mp4").unwrap();
    std::fs::write(media.join("voice.mp3"), b"mp3").unwrap();
    let manifest_path = LoadedTimeline::save_manifest(dir.path(), &TimelineManifest::example()).unwrap();

    let timeline = LoadedTimeline::load(&manifest_path).unwrap();
    let request = CompositionRequest::from_timeline(&timeline, &CompositionDefaults::default());
    assert_eq!(request.total_ms, 5000);
    assert_eq!((request.width, request.height, request.framerate), (1024, 576, 25));

    let compositor = Compositor::new(Arc::new(EnginePool::scripted()), &CompositionDefaults::default());
    let result = compositor.compose(request, |_| {}).await.unwrap();

    let out = dir.path().join("out.mp4");
    let written = result.video.save_to(&out).await.unwrap();
    assert_eq!(written, std::fs::metadata(&out).unwrap().len());
}
