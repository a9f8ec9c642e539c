//! Scratch file bookkeeping for one compositor call.

use std::sync::Arc;

use uuid::Uuid;

use clipweave_common::error::ClipweaveResult;

use crate::engine::EncodingEngine;

/// Unique scratch name such as `slideshow_<uuid>.mp4`.
pub fn scratch_name(prefix: &str, extension: &str) -> String {
    format!("{prefix}_{}.{extension}", Uuid::new_v4().simple())
}

/// Scratch files created during one compositor call.
///
/// Every intermediate is tracked from the moment its name is handed out, so
/// that [`ScratchFiles::release_all`] can remove whatever is left on success
/// and on every failure path. Names that were never written are skipped.
///
/// Dropping the set with files still tracked (a cancelled call) deletes them
/// in a background task on the current tokio runtime.
pub struct ScratchFiles {
    engine: Arc<dyn EncodingEngine>,
    names: Vec<String>,
}

impl ScratchFiles {
    pub fn new(engine: Arc<dyn EncodingEngine>) -> Self {
        Self {
            engine,
            names: Vec::new(),
        }
    }

    /// Hand out a tracked name for a file a request will produce.
    pub fn reserve(&mut self, prefix: &str, extension: &str) -> String {
        let name = scratch_name(prefix, extension);
        self.names.push(name.clone());
        name
    }

    /// Write `data` under a fresh tracked name.
    pub async fn write(&mut self, prefix: &str, extension: &str, data: &[u8]) -> ClipweaveResult<String> {
        let name = self.reserve(prefix, extension);
        self.engine.write_file(&name, data).await?;
        Ok(name)
    }

    /// Delete one tracked file now that nothing consumes it anymore.
    pub async fn release(&mut self, name: &str) {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            let name = self.names.swap_remove(index);
            delete(self.engine.as_ref(), &name).await;
        }
    }

    /// Delete every file still tracked.
    pub async fn release_all(&mut self) {
        for name in std::mem::take(&mut self.names) {
            delete(self.engine.as_ref(), &name).await;
        }
    }

    /// Names still tracked.
    pub fn pending(&self) -> &[String] {
        &self.names
    }
}

async fn delete(engine: &dyn EncodingEngine, name: &str) {
    if let Err(err) = engine.delete_file(name).await {
        // Reserved names whose request failed early were never written.
        tracing::debug!(session = engine.label(), file = name, error = %err, "Scratch file not removed");
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        if self.names.is_empty() {
            return;
        }
        let names = std::mem::take(&mut self.names);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(
                    session = self.engine.label(),
                    files = ?names,
                    "Removing scratch files of an interrupted call"
                );
                let engine = Arc::clone(&self.engine);
                handle.spawn(async move {
                    for name in &names {
                        delete(engine.as_ref(), name).await;
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    session = self.engine.label(),
                    files = ?names,
                    "Scratch files left behind"
                );
            }
        }
    }
}
