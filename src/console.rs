use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use backon::{BlockingRetryable, ConstantBuilder};
use tracing::{info, warn};

use crate::register::Registration;

/// Pause between two attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Logs above this size are moved aside before a run.
pub const MAX_LOG_BYTES: u64 = 1_048_576;

/// Path to the stdout log for a tunnel.
pub fn out_log(log_dir: &Path, name: &str) -> PathBuf {
    log_dir.join(format!("{}.out.log", name))
}

/// Path to the stderr log for a tunnel.
pub fn err_log(log_dir: &Path, name: &str) -> PathBuf {
    log_dir.join(format!("{}.err.log", name))
}

/// Move a log past `max_bytes` aside to `<file>.old` before a new run
/// appends to it. Returns whether the log was moved.
fn rotate_log(path: &Path, max_bytes: u64) -> bool {
    let too_big = fs::metadata(path).is_ok_and(|meta| meta.len() > max_bytes);
    if !too_big {
        return false;
    }
    let mut old = path.as_os_str().to_owned();
    old.push(".old");
    match fs::rename(path, &old) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), "could not rotate log: {}", e);
            false
        }
    }
}

fn open_log(path: &Path) -> Result<File, RunError> {
    rotate_log(path, MAX_LOG_BYTES);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RunError::Log {
            path: path.to_path_buf(),
            source,
        })
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ssh exited with {0}")]
    Failed(ExitStatus),
    #[error("ssh was interrupted")]
    Interrupted,
    #[error("failed to open log file {}: {source}", .path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("nothing to run")]
    Empty,
}

impl RunError {
    /// Only failed runs and log errors are retried.
    fn is_retryable(&self) -> bool {
        matches!(self, RunError::Failed(_) | RunError::Log { .. })
    }
}

fn classify(status: ExitStatus) -> Result<(), RunError> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(_) => Err(RunError::Failed(status)),
        // Killed by a signal, typically Ctrl-C reaching the whole group.
        None => Err(RunError::Interrupted),
    }
}

fn run_once(reg: &Registration, log_dir: &Path) -> Result<(), RunError> {
    let (program, args) = reg
        .command
        .split_first()
        .ok_or(RunError::Empty)?;

    let out = open_log(&out_log(log_dir, &reg.name))?;
    let err = open_log(&err_log(log_dir, &reg.name))?;

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(out)
        .stderr(err)
        .status()
        .map_err(|source| RunError::Spawn {
            program: program.clone(),
            source,
        })?;
    classify(status)
}

/// Number of attempts the retry budget allows; a tunnel always runs once.
pub fn attempts(retry: u32) -> u32 {
    retry.max(1)
}

/// Run the tunnel in the foreground until it exits for good.
///
/// A failing ssh is started again after [`RETRY_DELAY`] until the
/// retry budget is spent. An interrupted run stops right away.
pub fn run(reg: &Registration, log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let attempts = attempts(reg.retry);
    info!(tunnel = %reg.name, attempts, "running {}", reg.command_line());

    let result = (|| run_once(reg, log_dir))
        .retry(
            ConstantBuilder::default()
                .with_delay(RETRY_DELAY)
                .with_max_times(attempts as usize - 1),
        )
        .sleep(std::thread::sleep)
        .when(RunError::is_retryable)
        .notify(|e, delay| {
            warn!(tunnel = %reg.name, "{}; retrying in {:?}", e, delay);
        })
        .call();

    match result {
        Ok(()) => Ok(()),
        Err(RunError::Interrupted) => {
            info!(tunnel = %reg.name, "interrupted, stopping");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("failed to run tunnel '{}'", reg.name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_never_zero() {
        assert_eq!(attempts(0), 1);
        assert_eq!(attempts(1), 1);
        assert_eq!(attempts(3), 3);
    }

    #[test]
    fn log_paths() {
        let dir = Path::new("/var/log/rev-tun");
        assert_eq!(out_log(dir, "office"), PathBuf::from("/var/log/rev-tun/office.out.log"));
        assert_eq!(err_log(dir, "office"), PathBuf::from("/var/log/rev-tun/office.err.log"));
    }

    #[test]
    fn rotate_large_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.err.log");
        fs::write(&path, vec![b'x'; 32]).unwrap();
        assert!(rotate_log(&path, 16));
        assert!(!path.exists());
        assert!(dir.path().join("t.err.log.old").exists());
    }

    #[test]
    fn keep_small_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.err.log");
        fs::write(&path, b"short").unwrap();
        assert!(!rotate_log(&path, 16));
        assert!(path.exists());
    }

    #[test]
    fn successful_run_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let reg = Registration {
            name: "echo".to_string(),
            retry: 3,
            command: vec!["sh".to_string(), "-c".to_string(), "echo up".to_string()],
        };
        run(&reg, dir.path()).unwrap();
        let out = fs::read_to_string(out_log(dir.path(), "echo")).unwrap();
        assert_eq!(out, "up\n");
    }

    #[test]
    fn missing_program_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let reg = Registration {
            name: "missing".to_string(),
            retry: 3,
            command: vec!["/nonexistent/rev-tun-test-binary".to_string()],
        };
        let err = run(&reg, dir.path()).unwrap_err();
        assert_eq!(err.to_string(), "failed to run tunnel 'missing'");
        assert!(format!("{:#}", err).contains("failed to start /nonexistent/rev-tun-test-binary"));
    }

    #[test]
    fn failing_run_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let reg = Registration {
            name: "fail".to_string(),
            retry: 1,
            command: vec!["sh".to_string(), "-c".to_string(), "echo nope >&2; exit 255".to_string()],
        };
        assert!(run(&reg, dir.path()).is_err());
        let err = fs::read_to_string(err_log(dir.path(), "fail")).unwrap();
        assert_eq!(err, "nope\n");
    }
}
