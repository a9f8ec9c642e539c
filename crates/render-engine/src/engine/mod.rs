//! Encoding engine abstraction.
//!
//! An engine session owns a scratch file area and runs one encode/filter
//! request at a time, streaming its log lines to registered listeners while
//! the request is in flight. Callers hold the session's request gate across
//! listener attach, `exec` and detach, so a listener only ever sees the lines
//! of its own request. The compositors only talk to this trait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clipweave_common::error::ClipweaveResult;

pub mod ffmpeg;
pub mod scripted;

pub use ffmpeg::FfmpegEngine;
pub use scripted::ScriptedEngine;

/// Receives one engine log line.
pub type LogHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`EncodingEngine::on_log`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Capability of an external encoding engine session.
#[async_trait]
pub trait EncodingEngine: Send + Sync {
    /// Session label used in logs.
    fn label(&self) -> &str;

    /// Store `data` in the session's scratch area under `name`.
    async fn write_file(&self, name: &str, data: &[u8]) -> ClipweaveResult<()>;

    /// Read a scratch file back.
    async fn read_file(&self, name: &str) -> ClipweaveResult<Vec<u8>>;

    /// Remove a scratch file.
    async fn delete_file(&self, name: &str) -> ClipweaveResult<()>;

    /// Run one request and return its exit code (0 = success).
    ///
    /// `Err` means the request could not be run at all.
    async fn exec(&self, args: &[String]) -> ClipweaveResult<i32>;

    /// Register a log listener.
    fn on_log(&self, handler: LogHandler) -> ListenerId;

    /// Remove a log listener. Unknown ids are ignored.
    fn off_log(&self, id: ListenerId);

    /// Lock serializing requests on this session.
    fn request_gate(&self) -> &tokio::sync::Mutex<()>;
}

/// Listener registry shared by engine implementations.
#[derive(Default)]
pub struct LogListeners {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(ListenerId, LogHandler)>>,
}

impl LogListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: LogHandler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, handler));
        id
    }

    /// Returns whether a listener was removed.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `line` to every registered listener.
    ///
    /// Handlers run outside the registry lock so they may add or remove
    /// listeners themselves.
    pub fn emit(&self, line: &str) {
        let snapshot: Vec<LogHandler> = self.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in snapshot {
            handler(line);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, LogHandler)>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for LogListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogListeners")
            .field("count", &self.len())
            .finish()
    }
}

/// Reject scratch names that could escape the session's scratch area.
pub(crate) fn validate_scratch_name(name: &str) -> ClipweaveResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if bad {
        return Err(clipweave_common::ClipweaveError::engine(format!(
            "invalid scratch file name {name:?}"
        )));
    }
    Ok(())
}
