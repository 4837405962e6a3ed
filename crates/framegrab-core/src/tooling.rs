use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{ExtractError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default upper bound on a single ffmpeg/ffprobe invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Resolved locations of the external ffmpeg executables.
#[derive(Debug, Clone)]
pub struct Tooling {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Tooling {
    /// Find `ffmpeg` and `ffprobe` on `PATH`, failing before any decode is attempted.
    pub fn locate() -> Result<Self> {
        let path_var = env::var_os("PATH");
        let ffmpeg = locate_tool("ffmpeg", path_var.as_deref())?;
        let ffprobe = locate_tool("ffprobe", path_var.as_deref())?;
        info!(?ffmpeg, ?ffprobe, "located ffmpeg tooling");
        Ok(Self { ffmpeg, ffprobe })
    }
}

/// Search the entries of a `PATH`-style variable for an executable named `name`.
pub fn locate_tool(name: &str, path_var: Option<&OsStr>) -> Result<PathBuf> {
    let missing = || ExtractError::ToolingMissing {
        tool: name.to_string(),
    };
    let path_var = path_var.ok_or_else(missing)?;

    let file_name = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    };

    env::split_paths(path_var)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(missing)
}

/// Captured result of one external tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl ToolOutput {
    /// Human-readable account of a failed invocation: captured stderr plus exit details.
    pub fn diagnostics(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        let stderr = stderr.trim();
        let status = if self.timed_out {
            "timed out".to_string()
        } else {
            match self.code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            }
        };
        if stderr.is_empty() {
            status
        } else {
            format!("{status}: {stderr}")
        }
    }
}

/// Runs an external program to completion and captures its output.
pub trait ToolRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> Result<ToolOutput>;
}

/// Runs tools as child processes, killing any that outlive `timeout`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> Result<ToolOutput> {
        debug!(?program, ?args, timeout_secs = self.timeout.as_secs(), "spawning tool");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        // Both pipes are drained on their own threads while the child runs.
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        // A timeout too large to represent as an instant means no deadline.
        let deadline = Instant::now().checked_add(self.timeout);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) if deadline.is_some_and(|d| Instant::now() >= d) => {
                    warn!(?program, timeout_secs = self.timeout.as_secs(), "tool timed out, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ExtractError::io(
                        format!("failed to wait for {}", program.display()),
                        e,
                    ));
                }
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        let output = match status {
            Some(status) => ToolOutput {
                success: status.success(),
                code: status.code(),
                stdout,
                stderr,
                timed_out: false,
            },
            None => ToolOutput {
                success: false,
                code: None,
                stdout,
                stderr,
                timed_out: true,
            },
        };
        debug!(?program, success = output.success, code = ?output.code, "tool finished");
        Ok(output)
    }
}

pub(crate) fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn spawn_error(program: &Path, e: io::Error) -> ExtractError {
    if e.kind() == io::ErrorKind::NotFound {
        ExtractError::ToolingMissing {
            tool: program.display().to_string(),
        }
    } else {
        ExtractError::io(format!("failed to spawn {}", program.display()), e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_tool_finds_file_on_path() {
        let dir = tempfile::tempdir().unwrap();
        let name = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
        std::fs::write(dir.path().join(name), b"").unwrap();

        let empty = tempfile::tempdir().unwrap();
        let path_var = env::join_paths([empty.path(), dir.path()]).unwrap();

        let found = locate_tool("ffmpeg", Some(path_var.as_os_str())).unwrap();
        assert_eq!(found, dir.path().join(name));
    }

    #[test]
    fn locate_tool_reports_missing_tool() {
        let empty = tempfile::tempdir().unwrap();
        let path_var = env::join_paths([empty.path()]).unwrap();

        match locate_tool("ffprobe", Some(path_var.as_os_str())) {
            Err(ExtractError::ToolingMissing { tool }) => assert_eq!(tool, "ffprobe"),
            other => panic!("expected ToolingMissing, got {other:?}"),
        }
        assert!(matches!(
            locate_tool("ffprobe", None),
            Err(ExtractError::ToolingMissing { .. })
        ));
    }

    #[test]
    fn spawning_a_missing_program_is_tooling_missing() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let result = runner.run(Path::new("/nonexistent/definitely-not-ffmpeg"), &[]);
        assert!(matches!(result, Err(ExtractError::ToolingMissing { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn huge_timeout_means_no_deadline() {
        let runner = ProcessRunner::new(Duration::from_secs(u64::MAX));
        let output = runner.run(Path::new("/bin/true"), &[]).unwrap();
        assert!(output.success);
        assert!(!output.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn overdue_child_is_killed_and_reported() {
        let runner = ProcessRunner::new(Duration::from_millis(200));
        let started = Instant::now();
        let output = runner
            .run(Path::new("/bin/sleep"), &[OsString::from("5")])
            .unwrap();
        let elapsed = started.elapsed();

        assert!(output.timed_out);
        assert!(!output.success);
        assert_eq!(output.code, None);
        assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
        assert_eq!(output.diagnostics(), "timed out");
    }

    #[test]
    fn diagnostics_include_status_and_stderr() {
        let output = ToolOutput {
            code: Some(1),
            stderr: b"  Decoder libdav1d not found.\n".to_vec(),
            ..Default::default()
        };
        assert_eq!(output.diagnostics(), "exit code 1: Decoder libdav1d not found.");

        let timed_out = ToolOutput {
            timed_out: true,
            ..Default::default()
        };
        assert_eq!(timed_out.diagnostics(), "timed out");
    }
}
