//! Execution driver: spawns the transcoder, streams progress off its stderr,
//! and classifies failures.
//!
//! ffmpeg writes status lines to stderr separated by carriage returns. The
//! driver reads raw chunks on a helper thread and consumes them through a
//! channel so each read can be bounded by a timeout; a stalled transcoder is
//! killed rather than waited on forever. Progress is the parsed `time=` value
//! normalized against the `Duration:` header.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

/// Per-chunk stderr read timeout. Zero disables the clock.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

const READ_CHUNK: usize = 512;
const TAIL_LINES: usize = 50;

/// Drives one transcoder invocation.
#[derive(Debug, Clone)]
pub struct ExecDriver {
    read_timeout: Duration,
}

impl Default for ExecDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecDriver {
    pub fn new() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Override the per-read timeout. `Duration::ZERO` disables it.
    pub fn with_timeout(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    /// Run the given argv to completion, invoking `on_progress` with
    /// fractions in [0, 1] as the transcoder reports them. A synthetic 1.0
    /// is emitted when the run succeeds without ever reporting progress.
    ///
    /// `cancel` is checked between reads; raising it kills the child and
    /// surfaces [`Error::ExecCancelled`].
    pub fn run<F>(&self, argv: &[String], cancel: &AtomicBool, mut on_progress: F) -> Result<()>
    where
        F: FnMut(f32),
    {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::plan("empty command line"))?;
        let cmd_display = argv.join(" ");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found(program.clone())
                } else {
                    Error::Io(e)
                }
            })?;

        let mut stderr = child.stderr.take().expect("stderr was piped");
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let reader = std::thread::spawn(move || {
            use std::io::Read;
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match stderr.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut parser = ProgressParser::new();
        let mut yielded = false;

        let outcome = loop {
            if cancel.load(Ordering::Relaxed) {
                break Err(Error::ExecCancelled);
            }

            let chunk = if self.read_timeout.is_zero() {
                match rx.recv() {
                    Ok(chunk) => Some(chunk),
                    Err(_) => None,
                }
            } else {
                match rx.recv_timeout(self.read_timeout) {
                    Ok(chunk) => Some(chunk),
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        break Err(Error::ExecTimeout {
                            cmd: cmd_display.clone(),
                            timeout_secs: self.read_timeout.as_secs(),
                        });
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => None,
                }
            };

            match chunk {
                Some(chunk) => {
                    for tick in parser.push(&chunk) {
                        yielded = true;
                        on_progress(tick);
                    }
                }
                None => break Ok(()),
            }
        };

        if outcome.is_err() {
            terminate(&mut child);
        }
        // Drain whatever the reader still holds, then reap both.
        drop(rx);
        let _ = reader.join();
        let status = child.wait()?;
        outcome?;

        if status.success() {
            if !yielded {
                on_progress(1.0);
            }
            return Ok(());
        }

        Err(classify_failure(
            status.code(),
            exit_signal(&status),
            &parser.tail(),
            &cmd_display,
        ))
    }
}

fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::warn!("could not kill transcoder: {e}");
    }
}

fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    }
    #[cfg(not(unix))]
    {
        let _ = status;
        None
    }
}

/// Best-effort mapping of a failed exit to a typed error, scanning the last
/// stderr lines the way ffmpeg reports problems.
fn classify_failure(
    code: Option<i32>,
    signal: Option<i32>,
    tail: &[String],
    cmd: &str,
) -> Error {
    let last = tail.iter().rev().find(|l| !l.trim().is_empty());

    if let Some(line) = last {
        // e.g. "Received signal 15: terminating."
        if let Some(rest) = line.strip_prefix("Received signal ") {
            let parsed = rest
                .split(|c: char| !c.is_ascii_digit())
                .next()
                .and_then(|d| d.parse().ok());
            if let Some(sig) = parsed {
                return Error::ExecSignalled {
                    signal: sig,
                    cmd: cmd.to_string(),
                    tail: tail.to_vec(),
                };
            }
        }
    }

    if let Some(line) = tail.iter().rev().find(|l| l.starts_with("Error while ")) {
        return Error::ExecEncode {
            detail: line.clone(),
            cmd: cmd.to_string(),
            tail: tail.to_vec(),
        };
    }

    if let Some(sig) = signal {
        return Error::ExecSignalled {
            signal: sig,
            cmd: cmd.to_string(),
            tail: tail.to_vec(),
        };
    }

    Error::ExecUnknown {
        code: code.unwrap_or(-1),
        cmd: cmd.to_string(),
        tail: tail.to_vec(),
    }
}

/// Incremental parser over the transcoder's stderr byte stream.
///
/// Lines are terminated by carriage returns or newlines. The first
/// `Duration:` header fixes the denominator; every `time=` line afterwards
/// becomes a progress fraction clamped to [0, 1].
#[derive(Debug, Default)]
pub struct ProgressParser {
    buf: String,
    duration_secs: Option<f64>,
    tail: VecDeque<String>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the progress fractions completed lines yield.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<f32> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut ticks = Vec::new();
        while let Some(pos) = self.buf.find(['\r', '\n']) {
            let line: String = self.buf.drain(..=pos).collect();
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            if let Some(tick) = self.handle_line(&line) {
                ticks.push(tick);
            }
        }
        ticks
    }

    fn handle_line(&mut self, line: &str) -> Option<f32> {
        if !line.trim().is_empty() {
            if self.tail.len() >= TAIL_LINES {
                self.tail.pop_front();
            }
            self.tail.push_back(line.to_string());
        }

        if self.duration_secs.is_none() {
            if let Some(rest) = substring_after(line, "Duration: ") {
                if let Some(secs) = parse_timecode(rest) {
                    self.duration_secs = Some(secs);
                }
            }
        }

        let rest = substring_after(line, "time=")?;
        let time = parse_timecode(rest)?;
        let duration = self.duration_secs.filter(|d| *d > 0.0)?;
        Some((time / duration).clamp(0.0, 1.0) as f32)
    }

    /// The last stderr lines seen so far, oldest first.
    pub fn tail(&self) -> Vec<String> {
        self.tail.iter().cloned().collect()
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }
}

fn substring_after<'l>(line: &'l str, marker: &str) -> Option<&'l str> {
    line.find(marker).map(|i| &line[i + marker.len()..])
}

/// Parse the leading `HH:MM:SS.xx` (or plain seconds) of a status field.
fn parse_timecode(value: &str) -> Option<f64> {
    let token: &str = value
        .split(|c: char| !(c.is_ascii_digit() || c == ':' || c == '.'))
        .next()
        .filter(|t| !t.is_empty())?;

    let mut secs = 0.0f64;
    for part in token.split(':') {
        secs = secs * 60.0 + part.parse::<f64>().ok()?;
    }
    Some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timecode() {
        assert_eq!(parse_timecode("00:01:40.00, start:"), Some(100.0));
        assert_eq!(parse_timecode("01:00:00.00"), Some(3600.0));
        assert_eq!(parse_timecode("12.5 bitrate"), Some(12.5));
        assert_eq!(parse_timecode("garbage"), None);
    }

    #[test]
    fn test_progress_sequence() {
        let mut p = ProgressParser::new();
        let mut ticks = Vec::new();

        ticks.extend(p.push(b"Input #0, matroska,webm, from 'in.mkv':\n"));
        ticks.extend(p.push(b"  Duration: 00:01:40.00, start: 0.000000, bitrate: 2052 kb/s\n"));
        ticks.extend(p.push(b"frame=  100 fps= 25 time=00:00:25.00 bitrate= 100k\r"));
        ticks.extend(p.push(b"frame=  200 fps= 25 time=00:00:50.00 bitrate= 100k\r"));
        ticks.extend(p.push(b"frame=  400 fps= 25 time=00:01:40.00 bitrate= 100k\r"));

        assert_eq!(ticks, vec![0.25, 0.5, 1.0]);
        assert_eq!(p.duration_secs(), Some(100.0));
    }

    #[test]
    fn test_progress_clamped_to_one() {
        let mut p = ProgressParser::new();
        p.push(b"  Duration: 00:00:10.00, start: 0.0\n");
        let ticks = p.push(b"time=00:00:12.00 \r");
        assert_eq!(ticks, vec![1.0]);
    }

    #[test]
    fn test_no_duration_no_ticks() {
        let mut p = ProgressParser::new();
        let ticks = p.push(b"time=00:00:12.00 \r");
        assert!(ticks.is_empty());
    }

    #[test]
    fn test_chunks_split_mid_line() {
        let mut p = ProgressParser::new();
        p.push(b"  Duration: 00:00:40.00, start\n");
        let mut ticks = p.push(b"frame= 1 time=00:0");
        assert!(ticks.is_empty());
        ticks.extend(p.push(b"0:10.00 bitrate\r"));
        assert_eq!(ticks, vec![0.25]);
    }

    #[test]
    fn test_tail_retained() {
        let mut p = ProgressParser::new();
        p.push(b"line one\nline two\nError while decoding stream #0:1\n");
        let tail = p.tail();
        assert_eq!(tail.last().unwrap(), "Error while decoding stream #0:1");
    }

    #[test]
    fn test_classify_signalled() {
        let tail = vec!["Received signal 15: terminating.".to_string()];
        let err = classify_failure(None, None, &tail, "ffmpeg -i in out");
        assert!(matches!(err, Error::ExecSignalled { signal: 15, .. }));
    }

    #[test]
    fn test_classify_encode_error() {
        let tail = vec![
            "Stream mapping:".to_string(),
            "Error while opening encoder for output stream #0:0".to_string(),
            "Conversion failed!".to_string(),
        ];
        let err = classify_failure(Some(1), None, &tail, "ffmpeg");
        match err {
            Error::ExecEncode { detail, .. } => {
                assert!(detail.starts_with("Error while opening encoder"));
            }
            other => panic!("expected ExecEncode, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_unknown() {
        let tail = vec!["something odd".to_string()];
        let err = classify_failure(Some(1), None, &tail, "ffmpeg");
        assert!(matches!(err, Error::ExecUnknown { code: 1, .. }));
    }

    #[test]
    fn test_classify_os_signal() {
        let err = classify_failure(None, Some(9), &[], "ffmpeg");
        assert!(matches!(err, Error::ExecSignalled { signal: 9, .. }));
    }

    #[cfg(unix)]
    mod driver {
        use super::*;

        fn argv(script: &str) -> Vec<String> {
            vec!["sh".to_string(), "-c".to_string(), script.to_string()]
        }

        #[test]
        fn test_success_without_ticks_yields_synthetic_full() {
            let driver = ExecDriver::new();
            let cancel = AtomicBool::new(false);
            let mut ticks = Vec::new();
            driver
                .run(&argv("exit 0"), &cancel, |t| ticks.push(t))
                .unwrap();
            assert_eq!(ticks, vec![1.0]);
        }

        #[test]
        fn test_progress_from_stderr() {
            let driver = ExecDriver::new();
            let cancel = AtomicBool::new(false);
            let mut ticks = Vec::new();
            let script = "printf 'Duration: 00:00:10.00,\\n time=00:00:05.00 \\r' >&2; exit 0";
            driver
                .run(&argv(script), &cancel, |t| ticks.push(t))
                .unwrap();
            assert_eq!(ticks, vec![0.5]);
        }

        #[test]
        fn test_nonzero_exit_classified() {
            let driver = ExecDriver::new();
            let cancel = AtomicBool::new(false);
            let script = "printf 'Error while opening encoder\\n' >&2; exit 1";
            let err = driver.run(&argv(script), &cancel, |_| {}).unwrap_err();
            assert!(matches!(err, Error::ExecEncode { .. }));
        }

        #[test]
        fn test_cancellation() {
            let driver = ExecDriver::with_timeout(Duration::from_secs(30));
            let cancel = AtomicBool::new(true);
            let err = driver
                .run(&argv("sleep 30"), &cancel, |_| {})
                .unwrap_err();
            assert!(matches!(err, Error::ExecCancelled));
        }

        #[test]
        fn test_timeout() {
            let driver = ExecDriver::with_timeout(Duration::from_millis(200));
            let cancel = AtomicBool::new(false);
            let err = driver
                .run(&argv("sleep 10"), &cancel, |_| {})
                .unwrap_err();
            assert!(matches!(err, Error::ExecTimeout { .. }));
        }

        #[test]
        fn test_missing_binary() {
            let driver = ExecDriver::new();
            let cancel = AtomicBool::new(false);
            let err = driver
                .run(
                    &["definitely-not-a-real-binary-xyz".to_string()],
                    &cancel,
                    |_| {},
                )
                .unwrap_err();
            assert!(matches!(err, Error::ToolNotFound { .. }));
        }
    }
}
