//! Caller-owned pool of engine sessions.
//!
//! Video work runs on a session tuned for multi-threaded encoding, audio work
//! on a single-threaded one. Each kind is created lazily, at most once per
//! pool, and reused by every later call. Session state (scratch files,
//! listeners) is not reset between calls.

use std::sync::Arc;

use tokio::sync::OnceCell;

use clipweave_common::config::EngineSettings;
use clipweave_common::error::ClipweaveResult;

use crate::engine::{EncodingEngine, FfmpegEngine, ScriptedEngine};

/// Which kind of work a session serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Video,
    Audio,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// Creates engine sessions on demand.
pub trait EngineFactory: Send + Sync {
    fn create(&self, kind: SessionKind) -> ClipweaveResult<Arc<dyn EncodingEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(SessionKind) -> ClipweaveResult<Arc<dyn EncodingEngine>> + Send + Sync,
{
    fn create(&self, kind: SessionKind) -> ClipweaveResult<Arc<dyn EncodingEngine>> {
        self(kind)
    }
}

/// Spawns [`FfmpegEngine`] sessions from engine settings.
#[derive(Debug, Clone)]
pub struct FfmpegFactory {
    settings: EngineSettings,
}

impl FfmpegFactory {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl EngineFactory for FfmpegFactory {
    fn create(&self, kind: SessionKind) -> ClipweaveResult<Arc<dyn EncodingEngine>> {
        let threads = match kind {
            SessionKind::Video => self.settings.video_threads,
            SessionKind::Audio => self.settings.audio_threads,
        };
        let engine = FfmpegEngine::new(kind.as_str(), &self.settings, threads)?;
        Ok(Arc::new(engine))
    }
}

/// Lazily created, reusable sessions.
pub struct EnginePool {
    factory: Box<dyn EngineFactory>,
    video: OnceCell<Arc<dyn EncodingEngine>>,
    audio: OnceCell<Arc<dyn EncodingEngine>>,
}

impl EnginePool {
    pub fn new(factory: impl EngineFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            video: OnceCell::new(),
            audio: OnceCell::new(),
        }
    }

    /// Pool of real ffmpeg sessions.
    pub fn ffmpeg(settings: EngineSettings) -> Self {
        Self::new(FfmpegFactory::new(settings))
    }

    /// Pool of [`ScriptedEngine`] sessions, for dry runs.
    pub fn scripted() -> Self {
        Self::new(|kind: SessionKind| -> ClipweaveResult<Arc<dyn EncodingEngine>> {
            let engine = ScriptedEngine::new(kind.as_str());
            engine.simulate_progress(true);
            Ok(Arc::new(engine))
        })
    }

    /// Session for `kind`, created on first use.
    pub async fn session(&self, kind: SessionKind) -> ClipweaveResult<Arc<dyn EncodingEngine>> {
        let cell = match kind {
            SessionKind::Video => &self.video,
            SessionKind::Audio => &self.audio,
        };
        let session = cell
            .get_or_try_init(|| async {
                tracing::info!(session = kind.as_str(), "Starting engine session");
                self.factory.create(kind)
            })
            .await?;
        Ok(Arc::clone(session))
    }

    pub async fn video_session(&self) -> ClipweaveResult<Arc<dyn EncodingEngine>> {
        self.session(SessionKind::Video).await
    }

    pub async fn audio_session(&self) -> ClipweaveResult<Arc<dyn EncodingEngine>> {
        self.session(SessionKind::Audio).await
    }

    /// Whether a session of `kind` has been created.
    pub fn is_started(&self, kind: SessionKind) -> bool {
        match kind {
            SessionKind::Video => self.video.initialized(),
            SessionKind::Audio => self.audio.initialized(),
        }
    }
}

impl std::fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnginePool")
            .field("video", &self.video.initialized())
            .field("audio", &self.audio.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_sessions_are_created_once_per_kind() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = EnginePool::new(move |kind: SessionKind| -> ClipweaveResult<Arc<dyn EncodingEngine>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedEngine::new(kind.as_str())))
        });

        assert!(!pool.is_started(SessionKind::Video));
        let first = pool.video_session().await.unwrap();
        let second = pool.video_session().await.unwrap();
        let audio = pool.audio_session().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(audio.label(), "audio");
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert!(pool.is_started(SessionKind::Audio));
    }

    #[tokio::test]
    async fn test_failed_creation_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let pool = EnginePool::new(move |kind: SessionKind| -> ClipweaveResult<Arc<dyn EncodingEngine>> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(clipweave_common::ClipweaveError::engine("not yet"));
            }
            Ok(Arc::new(ScriptedEngine::new(kind.as_str())))
        });

        assert!(pool.audio_session().await.is_err());
        assert!(pool.audio_session().await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
