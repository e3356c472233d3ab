//! Bounded subprocess execution.
//!
//! Every external step (runtime construction, package upgrade, install,
//! script execution) runs through [`run_step`]:
//!
//! - stdout/stderr captured to `<logs_dir>/<step>.stdout.log` / `.stderr.log`
//! - a deadline after which the child is killed; on unix the step runs in its
//!   own process group and the whole group is killed
//! - no shell; the command is spawned directly

use crate::runtime::CommandSpec;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};

/// Maximum number of lines kept from captured output in diagnostics.
pub const DIAGNOSTIC_MAX_LINES: usize = 50;

/// Maximum total characters kept from captured output in diagnostics.
pub const DIAGNOSTIC_MAX_CHARS: usize = 4096;

/// Result of running one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Exit code of the process (None if killed or terminated by a signal).
    pub exit_code: Option<i32>,
    /// Whether the process was killed due to timeout.
    pub timed_out: bool,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Path to the stdout log file.
    pub stdout_path: PathBuf,
    /// Path to the stderr log file.
    pub stderr_path: PathBuf,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Tail of the captured stdout and stderr, for error reports.
    pub fn diagnostics(&self) -> String {
        let stdout = read_log_lossy(&self.stdout_path);
        let stderr = read_log_lossy(&self.stderr_path);

        let combined = match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
            (_, true) => stdout,
            (true, false) => stderr,
            (false, false) => format!("{}\n{}", stdout, stderr),
        };

        truncate_output(&combined, DIAGNOSTIC_MAX_LINES, DIAGNOSTIC_MAX_CHARS)
    }
}

/// Installers and scripts may emit bytes that are not UTF-8; keep the rest.
fn read_log_lossy(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Run `command` in `cwd`, capturing output under `logs_dir` with the `step` name.
///
/// Spawn failures (program not found, unreadable cwd, log files not creatable)
/// are returned as `Err`; everything after a successful spawn is reported in
/// the [`StepOutcome`].
pub fn run_step(
    command: &CommandSpec,
    cwd: &Path,
    logs_dir: &Path,
    step: &str,
    timeout: Duration,
) -> io::Result<StepOutcome> {
    fs::create_dir_all(logs_dir)?;

    let stdout_path = logs_dir.join(format!("{}.stdout.log", step));
    let stderr_path = logs_dir.join(format!("{}.stderr.log", step));
    let stdout_file = File::create(&stdout_path)?;
    let stderr_file = File::create(&stderr_path)?;

    let mut process = command.to_command();
    process
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New group led by the child, so a timeout reaches its descendants.
        process.process_group(0);
    }

    let mut child = process
        .spawn()
        .map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to execute '{}': {}", command.display(), e),
            )
        })?;

    let start_time = Instant::now();
    let (exit_code, timed_out) = wait_with_timeout(&mut child, timeout)?;

    Ok(StepOutcome {
        exit_code,
        timed_out,
        duration: start_time.elapsed(),
        stdout_path,
        stderr_path,
    })
}

/// Wait for a child process with timeout.
///
/// Returns (exit_code, timed_out).
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<(Option<i32>, bool)> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);

    loop {
        match child.try_wait()? {
            Some(status) => return Ok((status.code(), false)),
            None => {
                if start.elapsed() >= timeout {
                    kill_process_group(child);
                    // SIGKILL on Unix, TerminateProcess on Windows.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok((None, true));
                }
                std::thread::sleep(poll_interval);
            }
        }
    }
}

/// SIGKILL every process in the child's group (the group id is the child's pid).
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let group = format!("-{}", child.id());
    let result = std::process::Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = result {
        tracing::debug!(pid = child.id(), error = %e, "could not signal process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Keep the last `max_lines` lines, then the last `max_chars` characters.
pub fn truncate_output(output: &str, max_lines: usize, max_chars: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    let result = lines[start..].join("\n");

    let char_count = result.chars().count();
    if char_count <= max_chars {
        return result;
    }

    let tail: String = result.chars().skip(char_count - max_chars).collect();
    format!("...(truncated)...\n{}", tail)
}
