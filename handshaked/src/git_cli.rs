//! `GitTransport` backed by the `git` executable.
//!
//! Each operation is one child process with prompts disabled. The child is
//! polled until it exits or the timeout passes, in which case it is killed.

use handshake_common::{GitOperation, GitTransport, TransportError};
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct GitCliTransport {
    binary: String,
    timeout: Duration,
}

impl GitCliTransport {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn run<I, S>(&self, operation: GitOperation, args: I) -> Result<(), TransportError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        debug!(?command, %operation, "running git");

        let mut child = command.spawn().map_err(|e| TransportError::Spawn {
            operation,
            detail: format!("{}: {e}", self.binary),
        })?;

        // Drain stderr concurrently so a chatty child never blocks on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });
        let collect_stderr = |reader: Option<std::thread::JoinHandle<String>>| {
            reader
                .and_then(|handle| handle.join().ok())
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Grandchildren may still hold the pipe; leave the reader detached.
                    drop(stderr_reader);
                    return Err(TransportError::Timeout {
                        operation,
                        timeout_secs: self.timeout.as_secs(),
                    });
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(TransportError::Spawn {
                        operation,
                        detail: e.to_string(),
                    });
                }
            }
        };

        let stderr = collect_stderr(stderr_reader);
        if status.success() {
            Ok(())
        } else {
            Err(TransportError::CommandFailed {
                operation,
                exit_code: status.code(),
                stderr,
            })
        }
    }
}

impl GitTransport for GitCliTransport {
    fn clone_repo(&self, remote: &str, path: &Path) -> Result<(), TransportError> {
        self.run(
            GitOperation::Clone,
            [
                OsStr::new("clone"),
                OsStr::new("--quiet"),
                OsStr::new("--"),
                OsStr::new(remote),
                path.as_os_str(),
            ],
        )
    }

    fn pull(&self, path: &Path) -> Result<(), TransportError> {
        self.run(
            GitOperation::Pull,
            [
                OsStr::new("-C"),
                path.as_os_str(),
                OsStr::new("pull"),
                OsStr::new("--ff-only"),
                OsStr::new("--quiet"),
            ],
        )
    }

    fn add(&self, path: &Path, file: &Path) -> Result<(), TransportError> {
        self.run(
            GitOperation::Add,
            [
                OsStr::new("-C"),
                path.as_os_str(),
                OsStr::new("add"),
                OsStr::new("--"),
                file.as_os_str(),
            ],
        )
    }

    fn commit(&self, path: &Path, message: &str) -> Result<(), TransportError> {
        self.run(
            GitOperation::Commit,
            [
                OsStr::new("-C"),
                path.as_os_str(),
                OsStr::new("commit"),
                OsStr::new("--quiet"),
                OsStr::new("-m"),
                OsStr::new(message),
            ],
        )
    }

    fn push(&self, path: &Path) -> Result<(), TransportError> {
        self.run(
            GitOperation::Push,
            [
                OsStr::new("-C"),
                path.as_os_str(),
                OsStr::new("push"),
                OsStr::new("--quiet"),
            ],
        )
    }

    fn reset_to_upstream(&self, path: &Path) -> Result<(), TransportError> {
        self.run(
            GitOperation::Reset,
            [
                OsStr::new("-C"),
                path.as_os_str(),
                OsStr::new("reset"),
                OsStr::new("--hard"),
                OsStr::new("--quiet"),
                OsStr::new("@{upstream}"),
            ],
        )
    }
}
