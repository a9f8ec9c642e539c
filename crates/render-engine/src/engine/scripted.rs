//! In-memory engine that records requests instead of encoding.
//!
//! Scratch files live in a map. Every request is recorded, checked for
//! missing inputs, answered with a scripted exit code, and (on success)
//! leaves a placeholder file under its output name. It powers dry runs and
//! the compositor test suites.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use clipweave_common::error::{ClipweaveError, ClipweaveResult};

use super::{validate_scratch_name, EncodingEngine, ListenerId, LogHandler, LogListeners};

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    exit_code: Option<i32>,
    log_lines: Vec<String>,
}

/// Engine double with scripted replies.
#[derive(Debug)]
pub struct ScriptedEngine {
    label: String,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    requests: Mutex<Vec<Vec<String>>>,
    rules: Mutex<Vec<Rule>>,
    simulate_progress: AtomicBool,
    listeners: LogListeners,
    gate: tokio::sync::Mutex<()>,
}

impl ScriptedEngine {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            files: Mutex::new(BTreeMap::new()),
            requests: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            simulate_progress: AtomicBool::new(false),
            listeners: LogListeners::new(),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Answer requests with an argument containing `needle` with `exit_code`.
    pub fn fail_when(&self, needle: impl Into<String>, exit_code: i32) -> &Self {
        self.push_rule(Rule {
            needle: needle.into(),
            exit_code: Some(exit_code),
            log_lines: Vec::new(),
        });
        self
    }

    /// Emit `lines` while running requests with an argument containing `needle`.
    pub fn emit_when(&self, needle: impl Into<String>, lines: &[&str]) -> &Self {
        self.push_rule(Rule {
            needle: needle.into(),
            exit_code: None,
            log_lines: lines.iter().map(|l| l.to_string()).collect(),
        });
        self
    }

    /// Emit status lines at half and full output duration for every request
    /// that carries a `-t` limit.
    pub fn simulate_progress(&self, enabled: bool) -> &Self {
        self.simulate_progress.store(enabled, Ordering::Relaxed);
        self
    }

    /// Deliver a log line outside any request, like trailing engine output.
    pub fn emit(&self, line: &str) {
        self.listeners.emit(line);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Names of the scratch files currently stored.
    pub fn file_names(&self) -> Vec<String> {
        self.lock_files().keys().cloned().collect()
    }

    /// Contents of a stored scratch file.
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.lock_files().get(name).cloned()
    }

    /// Number of log listeners still attached.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn push_rule(&self, rule: Rule) {
        self.rules.lock().unwrap_or_else(|e| e.into_inner()).push(rule);
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Scratch names a request reads: `-i` inputs that are not lavfi
    /// sources, plus the entries of concat lists.
    fn referenced_inputs(&self, args: &[String]) -> Vec<String> {
        let mut inputs = Vec::new();
        let mut lavfi = false;
        let mut concat = false;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-f" => {
                    let format = iter.next().map(String::as_str);
                    lavfi = format == Some("lavfi");
                    concat = format == Some("concat");
                }
                "-i" => {
                    if let Some(input) = iter.next() {
                        if !lavfi {
                            inputs.push(input.clone());
                        }
                        if concat {
                            if let Some(list) = self.file(input) {
                                inputs.extend(
                                    String::from_utf8_lossy(&list)
                                        .lines()
                                        .filter_map(|l| l.strip_prefix("file "))
                                        .map(|l| l.trim().to_string()),
                                );
                            }
                        }
                        lavfi = false;
                        concat = false;
                    }
                }
                _ => {}
            }
        }
        inputs
    }
}

/// Value following the last `-t` flag, in milliseconds.
fn output_limit_ms(args: &[String]) -> Option<u64> {
    let position = args.iter().rposition(|a| a == "-t")?;
    let secs: f64 = args.get(position + 1)?.parse().ok()?;
    Some((secs * 1000.0).round() as u64)
}

fn status_line(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = ms / 60_000 % 60;
    let seconds = ms / 1000 % 60;
    let centis = ms % 1000 / 10;
    format!("frame=    1 fps=0.0 q=-1.0 size=N/A time={hours:02}:{minutes:02}:{seconds:02}.{centis:02} bitrate=N/A speed=1x")
}

#[async_trait]
impl EncodingEngine for ScriptedEngine {
    fn label(&self) -> &str {
        &self.label
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> ClipweaveResult<()> {
        validate_scratch_name(name)?;
        self.lock_files().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> ClipweaveResult<Vec<u8>> {
        self.file(name)
            .ok_or_else(|| ClipweaveError::engine(format!("{}: no scratch file {name}", self.label)))
    }

    async fn delete_file(&self, name: &str) -> ClipweaveResult<()> {
        self.lock_files()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClipweaveError::engine(format!("{}: no scratch file {name}", self.label)))
    }

    async fn exec(&self, args: &[String]) -> ClipweaveResult<i32> {
        tracing::debug!(session = %self.label, args = ?args, "Scripted request");
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(args.to_vec());

        let rules: Vec<Rule> = self
            .rules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|rule| args.iter().any(|a| a.contains(&rule.needle)))
            .cloned()
            .collect();

        // Suspend between lines like a real process does, so concurrent
        // callers interleave.
        tokio::task::yield_now().await;
        if self.simulate_progress.load(Ordering::Relaxed) {
            if let Some(limit) = output_limit_ms(args) {
                self.listeners.emit(&status_line(limit / 2));
                tokio::task::yield_now().await;
                self.listeners.emit(&status_line(limit));
            }
        }
        for line in rules.iter().flat_map(|r| r.log_lines.iter()) {
            self.listeners.emit(line);
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;

        if let Some(code) = rules.iter().find_map(|r| r.exit_code) {
            return Ok(code);
        }

        let missing: Vec<String> = self
            .referenced_inputs(args)
            .into_iter()
            .filter(|name| self.file(name).is_none())
            .collect();
        if !missing.is_empty() {
            for name in &missing {
                self.listeners.emit(&format!("{name}: No such file or directory"));
            }
            return Ok(1);
        }

        if let Some(output) = args.last() {
            let placeholder = format!("scripted output of: {}", args.join(" "));
            self.write_file(output, placeholder.as_bytes()).await?;
        }
        Ok(0)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[tokio::test]
    async fn test_successful_request_creates_output() {
        let engine = ScriptedEngine::new("test");
        let code = engine
            .exec(&args(&["-f", "lavfi", "-i", "anullsrc", "-t", "1", "out.mp3"]))
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert!(engine.file("out.mp3").is_some());
        assert_eq!(engine.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_input_fails_request() {
        let engine = ScriptedEngine::new("test");
        let code = engine
            .exec(&args(&["-i", "missing.jpg", "out.mp4"]))
            .await
            .unwrap();
        assert_eq!(code, 1);
        assert!(engine.file("out.mp4").is_none());
    }

    #[tokio::test]
    async fn test_concat_list_entries_must_exist() {
        let engine = ScriptedEngine::new("test");
        engine.write_file("list.txt", b"file a.mp4\nfile b.mp4").await.unwrap();
        engine.write_file("a.mp4", b"a").await.unwrap();
        let request = args(&["-f", "concat", "-safe", "0", "-i", "list.txt", "-c", "copy", "out.mp4"]);

        assert_eq!(engine.exec(&request).await.unwrap(), 1);
        engine.write_file("b.mp4", b"b").await.unwrap();
        assert_eq!(engine.exec(&request).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fail_rule_sets_exit_code() {
        let engine = ScriptedEngine::new("test");
        engine.fail_when("amix", 3);
        let code = engine
            .exec(&args(&["-filter_complex", "[0:a]amix=inputs=1", "out.mp3"]))
            .await
            .unwrap();
        assert_eq!(code, 3);
    }

    #[test]
    fn test_status_line_format() {
        assert_eq!(
            status_line(62_050),
            "frame=    1 fps=0.0 q=-1.0 size=N/A time=00:01:02.05 bitrate=N/A speed=1x"
        );
        assert_eq!(output_limit_ms(&args(&["-t", "2.5", "o"])), Some(2500));
    }
}
