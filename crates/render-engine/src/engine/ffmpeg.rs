//! Engine session backed by the `ffmpeg` command-line tool.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use clipweave_common::config::EngineSettings;
use clipweave_common::error::{ClipweaveError, ClipweaveResult};

use super::{validate_scratch_name, EncodingEngine, ListenerId, LogHandler, LogListeners};

/// Number of trailing stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 12;

/// One ffmpeg session: a private scratch directory plus a listener registry.
///
/// Requests run with the scratch directory as working directory, so file
/// names in arguments are plain scratch names. The directory is removed when
/// the session is dropped.
pub struct FfmpegEngine {
    label: String,
    binary: PathBuf,
    threads: Option<u32>,
    log_level: String,
    scratch: tempfile::TempDir,
    listeners: LogListeners,
    gate: tokio::sync::Mutex<()>,
}

impl FfmpegEngine {
    /// Create a session. `threads` overrides the thread count of every
    /// output this session encodes.
    pub fn new(
        label: impl Into<String>,
        settings: &EngineSettings,
        threads: Option<u32>,
    ) -> ClipweaveResult<Self> {
        let label = label.into();
        let mut builder = tempfile::Builder::new();
        builder.prefix("clipweave-");
        let scratch = match &settings.scratch_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        tracing::debug!(
            session = %label,
            scratch = %scratch.path().display(),
            threads = ?threads,
            "Created ffmpeg session"
        );

        Ok(Self {
            label,
            binary: settings.ffmpeg_path.clone(),
            threads,
            log_level: settings.log_level.clone(),
            scratch,
            listeners: LogListeners::new(),
            gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Directory holding this session's scratch files.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Whether `binary` can be started.
    pub async fn is_available(binary: &Path) -> bool {
        Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn scratch_path(&self, name: &str) -> ClipweaveResult<PathBuf> {
        validate_scratch_name(name)?;
        Ok(self.scratch.path().join(name))
    }

    /// Full argument list: global flags, the request, and the thread
    /// override placed right before the output name.
    fn command_args(&self, args: &[String]) -> Vec<String> {
        let mut full = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
        ];
        match (self.threads, args.split_last()) {
            (Some(threads), Some((output, rest))) => {
                full.extend(rest.iter().cloned());
                full.push("-threads".to_string());
                full.push(threads.to_string());
                full.push(output.clone());
            }
            _ => full.extend(args.iter().cloned()),
        }
        full
    }
}

#[async_trait]
impl EncodingEngine for FfmpegEngine {
    fn label(&self) -> &str {
        &self.label
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> ClipweaveResult<()> {
        let path = self.scratch_path(name)?;
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str) -> ClipweaveResult<Vec<u8>> {
        let path = self.scratch_path(name)?;
        tokio::fs::read(&path).await.map_err(|e| {
            ClipweaveError::engine(format!("{}: cannot read {name}: {e}", self.label))
        })
    }

    async fn delete_file(&self, name: &str) -> ClipweaveResult<()> {
        let path = self.scratch_path(name)?;
        tokio::fs::remove_file(&path).await.map_err(|e| {
            ClipweaveError::engine(format!("{}: cannot delete {name}: {e}", self.label))
        })
    }

    async fn exec(&self, args: &[String]) -> ClipweaveResult<i32> {
        let full_args = self.command_args(args);
        tracing::debug!(session = %self.label, args = ?full_args, "Running ffmpeg");

        let mut child = Command::new(&self.binary)
            .args(&full_args)
            .current_dir(self.scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ClipweaveError::engine(format!(
                    "Failed to start {}: {e}",
                    self.binary.display()
                ))
            })?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClipweaveError::engine("Failed to capture ffmpeg stderr"))?;

        // Status lines are terminated by '\r', regular log lines by '\n'.
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut pending: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = stderr
                .read(&mut chunk)
                .await
                .map_err(|e| ClipweaveError::engine(format!("Failed reading ffmpeg log: {e}")))?;
            if read == 0 {
                break;
            }
            for &byte in &chunk[..read] {
                if byte == b'\r' || byte == b'\n' {
                    self.dispatch_line(&mut pending, &mut tail);
                } else {
                    pending.push(byte);
                }
            }
        }
        self.dispatch_line(&mut pending, &mut tail);

        let status = child
            .wait()
            .await
            .map_err(|e| ClipweaveError::engine(format!("Failed to wait on ffmpeg: {e}")))?;
        let code = status.code().unwrap_or(-1);

        if code != 0 {
            tracing::warn!(
                session = %self.label,
                exit_code = code,
                stderr_tail = %tail.iter().cloned().collect::<Vec<_>>().join("\n"),
                "ffmpeg request failed"
            );
        }
        Ok(code)
    }

    fn on_log(&self, handler: LogHandler) -> ListenerId {
        self.listeners.add(handler)
    }

    fn off_log(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn request_gate(&self) -> &tokio::sync::Mutex<()> {
        &self.gate
    }
}

impl FfmpegEngine {
    fn dispatch_line(&self, pending: &mut Vec<u8>, tail: &mut VecDeque<String>) {
        if pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(pending).trim().to_string();
        pending.clear();
        if line.is_empty() {
            return;
        }
        tracing::trace!(session = %self.label, "{line}");
        self.listeners.emit(&line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}

impl std::fmt::Debug for FfmpegEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegEngine")
            .field("label", &self.label)
            .field("binary", &self.binary)
            .field("threads", &self.threads)
            .field("scratch", &self.scratch.path())
            .finish()
    }
}
