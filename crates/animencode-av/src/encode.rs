//! Transcoder process runner.
//!
//! Runs a compiled ffmpeg command, turning its `frame=` status lines into
//! progress callbacks and polling an abort flag while it works.

use crate::{Error, Result};
use regex::Regex;
use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::LazyLock;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lines of transcoder output kept for error reports.
pub const TAIL_LINES: usize = 10;

/// Default abort polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^frame=\s*(\d+)").expect("valid regex"));

/// A progress report from the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProgress {
    /// Frames encoded so far.
    pub frame: u64,
    /// Frame count of the source, when the prober reported one.
    pub total_frames: Option<u64>,
}

impl EncodeProgress {
    /// Completion in `0.0..=1.0`, if the total is known.
    pub fn fraction(&self) -> Option<f32> {
        match self.total_frames {
            Some(total) if total > 0 => Some((self.frame as f32 / total as f32).min(1.0)),
            _ => None,
        }
    }
}

/// How an encode ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeOutcome {
    Completed,
    /// The abort flag was raised and the transcoder was terminated.
    Aborted,
}

/// Runner settings.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Echo every transcoder output line to stderr.
    pub show_output: bool,
    /// How often `abort` is polled while the transcoder is silent.
    pub poll_interval: Duration,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            show_output: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Parse a `frame=` status line.
///
/// ```
/// use animencode_av::encode::parse_frame;
///
/// assert_eq!(parse_frame("frame=  240 fps= 48 q=28.0 size=1024kB"), Some(240));
/// assert_eq!(parse_frame("Stream mapping:"), None);
/// ```
pub fn parse_frame(line: &str) -> Option<u64> {
    FRAME_RE
        .captures(line.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Run the transcoder command `args` (executable first) that writes `output`.
///
/// Returns [`EncodeOutcome::Aborted`] if `abort` returned true before the
/// process exited.
///
/// # Errors
///
/// - [`Error::ToolNotFound`] if the executable cannot be spawned.
/// - [`Error::EncodeFailed`] on a non-zero exit, with the last
///   [`TAIL_LINES`] lines of output.
pub fn run_encode<F, A>(
    args: &[String],
    output: &Path,
    total_frames: Option<u64>,
    options: &EncodeOptions,
    mut on_progress: F,
    abort: A,
) -> Result<EncodeOutcome>
where
    F: FnMut(EncodeProgress),
    A: Fn() -> bool,
{
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| Error::tool_failed("ffmpeg", "empty command"))?;

    #[cfg(feature = "tracing")]
    tracing::info!("Encoding {:?}", output);

    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(program.as_str())
            } else {
                Error::Io(e)
            }
        })?;

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, tx.clone()));
    }
    drop(tx);

    let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);
    loop {
        if abort() {
            #[cfg(feature = "tracing")]
            tracing::info!("Abort signal received. Shutting down ffmpeg...");
            terminate(&mut child);
            child.wait()?;
            // Readers exit on their own once every holder of the pipes is gone.
            drop(readers);
            return Ok(EncodeOutcome::Aborted);
        }

        match rx.recv_timeout(options.poll_interval) {
            Ok(line) => {
                if options.show_output {
                    eprintln!("{}", line);
                }
                if let Some(frame) = parse_frame(&line) {
                    on_progress(EncodeProgress {
                        frame,
                        total_frames,
                    });
                }
                if tail.len() == TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let status = child.wait()?;
    join_readers(readers);

    if status.success() {
        #[cfg(feature = "tracing")]
        tracing::debug!("encode complete");
        Ok(EncodeOutcome::Completed)
    } else {
        Err(Error::EncodeFailed {
            path: output.to_path_buf(),
            code: status.code(),
            tail: tail.into_iter().collect(),
        })
    }
}

/// Forward non-empty lines, split on `\r` or `\n`, until the pipe closes.
fn spawn_reader<R>(mut reader: R, tx: Sender<String>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut pending = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            for &byte in &chunk[..n] {
                if byte == b'\r' || byte == b'\n' {
                    if !flush(&mut pending, &tx) {
                        return;
                    }
                } else {
                    pending.push(byte);
                }
            }
        }
        flush(&mut pending, &tx);
    })
}

/// Send the pending line if it has content. False once the receiver is gone.
fn flush(pending: &mut Vec<u8>, tx: &Sender<String>) -> bool {
    let line = String::from_utf8_lossy(pending).trim().to_string();
    pending.clear();
    line.is_empty() || tx.send(line).is_ok()
}

fn join_readers(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        let _ = reader.join();
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    // SAFETY: kill(2) with a pid we spawned and still own; no memory is shared.
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Instant;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_parse_frame() {
        assert_eq!(parse_frame("frame=    1 fps=0.0"), Some(1));
        assert_eq!(parse_frame("  frame=12"), Some(12));
        assert_eq!(parse_frame("size= frame=12"), None);
        assert_eq!(parse_frame("frame=N/A"), None);
    }

    #[test]
    fn test_fraction() {
        let p = EncodeProgress {
            frame: 50,
            total_frames: Some(200),
        };
        assert_eq!(p.fraction(), Some(0.25));
        let p = EncodeProgress {
            frame: 50,
            total_frames: None,
        };
        assert_eq!(p.fraction(), None);
    }

    #[test]
    fn test_empty_command() {
        let result = run_encode(
            &[],
            Path::new("out.mkv"),
            None,
            &EncodeOptions::default(),
            |_| {},
            || false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_executable() {
        let args = vec!["nonexistent_ffmpeg_12345".to_string()];
        let err = run_encode(
            &args,
            Path::new("out.mkv"),
            None,
            &EncodeOptions::default(),
            |_| {},
            || false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_progress_lines() {
        let args = sh(r"printf 'frame=   10 fps=0\rframe=   20 fps=1\nframe=30\n' >&2; exit 0");
        let mut frames = Vec::new();
        let outcome = run_encode(
            &args,
            Path::new("out.mkv"),
            Some(30),
            &EncodeOptions::default(),
            |p| frames.push((p.frame, p.total_frames)),
            || false,
        )
        .unwrap();
        assert_eq!(outcome, EncodeOutcome::Completed);
        assert_eq!(frames, [(10, Some(30)), (20, Some(30)), (30, Some(30))]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_keeps_tail() {
        let args = sh("for i in $(seq 1 15); do echo line$i; done; exit 3");
        let err = run_encode(
            &args,
            Path::new("/tmp/out.mkv"),
            None,
            &EncodeOptions::default(),
            |_| {},
            || false,
        )
        .unwrap_err();
        match err {
            Error::EncodeFailed { path, code, tail } => {
                assert_eq!(path, Path::new("/tmp/out.mkv"));
                assert_eq!(code, Some(3));
                assert_eq!(tail.len(), TAIL_LINES);
                assert_eq!(tail.first().map(String::as_str), Some("line6"));
                assert_eq!(tail.last().map(String::as_str), Some("line15"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_terminates() {
        let args = sh("exec sleep 30");
        let polls = Cell::new(0);
        let started = Instant::now();
        let outcome = run_encode(
            &args,
            Path::new("out.mkv"),
            None,
            &EncodeOptions {
                poll_interval: Duration::from_millis(10),
                ..EncodeOptions::default()
            },
            |_| {},
            || {
                polls.set(polls.get() + 1);
                polls.get() > 3
            },
        )
        .unwrap();
        assert_eq!(outcome, EncodeOutcome::Aborted);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
