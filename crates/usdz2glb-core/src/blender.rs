//! Spawning and supervising the headless Blender process.

use crate::error::{ConvertError, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default install location of the Blender binary.
///
/// The path is a fixed constant rather than discovered: this tool targets the
/// stock macOS Blender install and callers that need a different location
/// pass one explicitly.
pub const DEFAULT_BLENDER_PATH: &str = "/Applications/Blender.app/Contents/MacOS/Blender";

/// Poll interval for the child supervision loop
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Check that Blender exists at `blender_path` and report its version
///
/// Runs `blender --version` and returns the first line of its stdout
/// (e.g. `"Blender 4.2.1"`).
///
/// # Errors
///
/// Returns `ConvertError::BlenderNotFound` if the binary is missing or
/// cannot be executed.
#[must_use = "this function returns the Blender version string that should be used or logged"]
pub fn check_blender_available(blender_path: &Path) -> Result<String> {
    if !blender_path.exists() {
        return Err(ConvertError::BlenderNotFound(
            blender_path.display().to_string(),
        ));
    }

    let output = Command::new(blender_path)
        .arg("--version")
        .output()
        .map_err(|_| ConvertError::BlenderNotFound(blender_path.display().to_string()))?;

    if !output.status.success() {
        return Err(ConvertError::BlenderNotFound(
            blender_path.display().to_string(),
        ));
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let version = version_output
        .lines()
        .next()
        .unwrap_or("unknown")
        .to_string();

    Ok(version)
}

/// Result of one supervised Blender run
#[derive(Debug)]
pub struct BlenderRun {
    /// Exit status of the process
    pub status: ExitStatus,
    /// Combined stdout and stderr. Blender routinely writes progress and
    /// import warnings to stderr, so neither stream is authoritative alone.
    pub log: String,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl BlenderRun {
    /// Last `max_lines` lines of the captured log, for error reporting
    #[must_use]
    pub fn log_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self.log.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Run Blender in batch mode with the given control script
///
/// Spawns `blender --background --python <script> -- <input> <output>` and
/// waits for it to exit, killing it if it exceeds `timeout`.
///
/// # Errors
///
/// Returns errors if:
/// - The process cannot be spawned (`ConvertError::Io`)
/// - The process exceeds the timeout (`ConvertError::TimedOut`)
pub fn run_batch(
    blender_path: &Path,
    script_path: &Path,
    input: &Path,
    output: &Path,
    timeout: Duration,
) -> Result<BlenderRun> {
    debug!(
        blender = %blender_path.display(),
        script = %script_path.display(),
        "spawning headless Blender"
    );

    let start = Instant::now();
    let mut child = Command::new(blender_path)
        .arg("--background")
        .arg("--python")
        .arg(script_path)
        .arg("--")
        .arg(input)
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes on threads so a chatty Blender cannot fill a pipe
    // buffer and deadlock against our wait loop.
    let stdout_reader = spawn_drain(child.stdout.take());
    let stderr_reader = spawn_drain(child.stderr.take());

    let status = wait_with_timeout(&mut child, timeout, start)?;

    let mut log = join_drain(stdout_reader)?;
    let stderr_log = join_drain(stderr_reader)?;
    if !stderr_log.is_empty() {
        if !log.is_empty() && !log.ends_with('\n') {
            log.push('\n');
        }
        log.push_str(&stderr_log);
    }

    let elapsed = start.elapsed();
    debug!(?elapsed, code = ?status.code(), "Blender exited");

    Ok(BlenderRun {
        status,
        log,
        elapsed,
    })
}

/// Poll the child until it exits or the deadline passes
fn wait_with_timeout(child: &mut Child, timeout: Duration, start: Instant) -> Result<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if start.elapsed() > timeout {
                    warn!(?timeout, "Blender exceeded timeout, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ConvertError::TimedOut(timeout.as_secs()));
                }
                thread::sleep(WAIT_POLL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ConvertError::Io(e));
            }
        }
    }
}

/// Read an output pipe to the end on a background thread
fn spawn_drain<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> Option<thread::JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut r| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

/// Collect a drain thread's bytes as a string
///
/// Decoding is lossy: Blender prints raw filesystem names and addon chatter,
/// so the log may contain invalid UTF-8 even on valid input. The log is
/// diagnostic only and must never fail a run that wrote its output file.
fn join_drain(handle: Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| ConvertError::Io(std::io::Error::other("output reader thread panicked")))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_check_blender_missing_path() {
        let result = check_blender_available(Path::new("/nonexistent/blender"));
        assert!(matches!(
            result.unwrap_err(),
            ConvertError::BlenderNotFound(p) if p == "/nonexistent/blender"
        ));
    }

    #[test]
    fn test_log_tail_shorter_than_limit() {
        let run_log = "line one\nline two";
        let run = BlenderRun {
            status: fake_status(),
            log: run_log.to_string(),
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(run.log_tail(10), "line one\nline two");
    }

    #[test]
    fn test_log_tail_truncates() {
        let run = BlenderRun {
            status: fake_status(),
            log: (1..=30).map(|i| format!("line {i}\n")).collect(),
            elapsed: Duration::from_secs(1),
        };
        let tail = run.log_tail(5);
        assert_eq!(tail.lines().count(), 5);
        assert!(tail.starts_with("line 26"));
        assert!(tail.ends_with("line 30"));
    }

    fn fake_status() -> ExitStatus {
        ExitStatus::from_raw(0)
    }
}
