//! Version-control transport contract.
//!
//! The engine treats git as a storage backend behind six blocking
//! operations. [`GitTransport`] is the seam; the daemon ships a CLI-backed
//! implementation and [`MockGitTransport`] is a deterministic in-memory fake
//! that still materializes working copies on disk, so the loader and writer
//! run against real files in tests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The operations the engine needs from git.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitOperation {
    Clone,
    Pull,
    Add,
    Commit,
    Push,
    Reset,
}

impl std::fmt::Display for GitOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clone => write!(f, "clone"),
            Self::Pull => write!(f, "pull"),
            Self::Add => write!(f, "add"),
            Self::Commit => write!(f, "commit"),
            Self::Push => write!(f, "push"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// Transport-level failure of a single git operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("git {operation} timed out after {timeout_secs}s")]
    Timeout {
        operation: GitOperation,
        timeout_secs: u64,
    },
    #[error("git {operation} failed (exit {}): {stderr}", exit_label(.exit_code))]
    CommandFailed {
        operation: GitOperation,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("could not run git {operation}: {detail}")]
    Spawn {
        operation: GitOperation,
        detail: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

impl TransportError {
    pub fn operation(&self) -> GitOperation {
        match self {
            Self::Timeout { operation, .. }
            | Self::CommandFailed { operation, .. }
            | Self::Spawn { operation, .. } => *operation,
        }
    }
}

/// Blocking git capability used by the repository cache and state writer.
///
/// Every method may block on network or disk; callers run them off the
/// async runtime.
pub trait GitTransport: Send + Sync {
    /// Clone `remote` into `path`, which must not exist yet.
    fn clone_repo(&self, remote: &str, path: &Path) -> Result<(), TransportError>;
    /// Fast-forward the working copy at `path` from its origin.
    fn pull(&self, path: &Path) -> Result<(), TransportError>;
    /// Stage `file` (relative to `path`).
    fn add(&self, path: &Path, file: &Path) -> Result<(), TransportError>;
    /// Commit staged changes.
    fn commit(&self, path: &Path, message: &str) -> Result<(), TransportError>;
    /// Push local commits to origin.
    fn push(&self, path: &Path) -> Result<(), TransportError>;
    /// Discard unpushed commits and local edits, leaving `path` at its
    /// upstream branch.
    fn reset_to_upstream(&self, path: &Path) -> Result<(), TransportError>;
}

/// One call observed by [`MockGitTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCall {
    pub operation: GitOperation,
    /// Remote URL for clone, working-copy path otherwise.
    pub target: String,
}

/// A commit as recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCommit {
    pub message: String,
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct MockRemote {
    files: BTreeMap<String, String>,
    commits: Vec<MockCommit>,
}

#[derive(Debug)]
struct ScriptedFailure {
    operation: GitOperation,
    target_contains: String,
}

#[derive(Debug, Default)]
struct MockState {
    remotes: HashMap<String, MockRemote>,
    origins: HashMap<PathBuf, String>,
    staged: HashMap<PathBuf, Vec<String>>,
    unpushed: HashMap<PathBuf, Vec<MockCommit>>,
    failures: Vec<ScriptedFailure>,
    calls: Vec<TransportCall>,
    active: HashMap<PathBuf, usize>,
    overlaps: usize,
    delay: Option<Duration>,
}

/// Deterministic in-memory git fake for unit and integration tests.
#[derive(Debug, Clone, Default)]
pub struct MockGitTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockGitTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock transport mutex poisoned")
    }

    /// Create or replace a remote with the given files.
    pub fn with_remote(self, remote: &str, files: &[(&str, &str)]) -> Self {
        {
            let mut state = self.lock();
            let entry = state.remotes.entry(remote.to_string()).or_default();
            entry.files = files
                .iter()
                .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
                .collect();
        }
        self
    }

    /// Update one file on a remote, as if another client pushed it.
    pub fn set_remote_file(&self, remote: &str, name: &str, content: &str) {
        self.lock()
            .remotes
            .entry(remote.to_string())
            .or_default()
            .files
            .insert(name.to_string(), content.to_string());
    }

    /// Current content of a file on a remote.
    pub fn remote_file(&self, remote: &str, name: &str) -> Option<String> {
        self.lock()
            .remotes
            .get(remote)
            .and_then(|r| r.files.get(name).cloned())
    }

    /// Commits pushed to a remote, oldest first.
    pub fn remote_commits(&self, remote: &str) -> Vec<MockCommit> {
        self.lock()
            .remotes
            .get(remote)
            .map(|r| r.commits.clone())
            .unwrap_or_default()
    }

    /// Fail every `operation` whose target contains `target_contains`.
    pub fn fail_on(&self, operation: GitOperation, target_contains: &str) {
        self.lock().failures.push(ScriptedFailure {
            operation,
            target_contains: target_contains.to_string(),
        });
    }

    /// Remove all scripted failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Make every operation block for `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Snapshot of all calls received so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    /// Calls of one kind.
    pub fn calls_of(&self, operation: GitOperation) -> Vec<TransportCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    /// How many times two operations ran on one working copy at once.
    pub fn overlapping_operations(&self) -> usize {
        self.lock().overlaps
    }

    fn begin(
        &self,
        operation: GitOperation,
        target: &str,
        path: &Path,
    ) -> Result<Option<Duration>, TransportError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.calls.push(TransportCall {
            operation,
            target: target.to_string(),
        });
        let scripted = state
            .failures
            .iter()
            .any(|f| f.operation == operation && target.contains(&f.target_contains));
        if scripted {
            return Err(TransportError::CommandFailed {
                operation,
                exit_code: Some(128),
                stderr: format!("scripted failure for {target}"),
            });
        }
        let active = state.active.entry(path.to_path_buf()).or_insert(0);
        *active += 1;
        if *active > 1 {
            state.overlaps += 1;
        }
        Ok(state.delay)
    }

    fn finish(&self, path: &Path) {
        let mut state = self.lock();
        if let Some(active) = state.active.get_mut(path) {
            *active = active.saturating_sub(1);
        }
    }

    fn run<T>(
        &self,
        operation: GitOperation,
        target: &str,
        path: &Path,
        body: impl FnOnce(&mut MockState) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        if let Some(delay) = self.begin(operation, target, path)? {
            std::thread::sleep(delay);
        }
        let mut guard = self.lock();
        let result = body(&mut *guard);
        drop(guard);
        self.finish(path);
        result
    }
}

fn failed(operation: GitOperation, stderr: impl Into<String>) -> TransportError {
    TransportError::CommandFailed {
        operation,
        exit_code: Some(128),
        stderr: stderr.into(),
    }
}

fn write_files(
    operation: GitOperation,
    path: &Path,
    files: &BTreeMap<String, String>,
) -> Result<(), TransportError> {
    for (name, content) in files {
        std::fs::write(path.join(name), content)
            .map_err(|e| failed(operation, format!("write {name}: {e}")))?;
    }
    Ok(())
}

impl GitTransport for MockGitTransport {
    fn clone_repo(&self, remote: &str, path: &Path) -> Result<(), TransportError> {
        self.run(GitOperation::Clone, remote, path, |state| {
            let Some(source) = state.remotes.get(remote) else {
                return Err(failed(
                    GitOperation::Clone,
                    format!("remote: Repository not found: {remote}"),
                ));
            };
            if path.join(".git").exists() {
                return Err(failed(
                    GitOperation::Clone,
                    format!("destination path '{}' already exists", path.display()),
                ));
            }
            std::fs::create_dir_all(path.join(".git"))
                .map_err(|e| failed(GitOperation::Clone, e.to_string()))?;
            write_files(GitOperation::Clone, path, &source.files)?;
            state
                .origins
                .insert(path.to_path_buf(), remote.to_string());
            Ok(())
        })
    }

    fn pull(&self, path: &Path) -> Result<(), TransportError> {
        let target = path.display().to_string();
        self.run(GitOperation::Pull, &target, path, |state| {
            let origin = state
                .origins
                .get(path)
                .ok_or_else(|| failed(GitOperation::Pull, "not a git repository"))?;
            let files = state
                .remotes
                .get(origin)
                .map(|r| r.files.clone())
                .unwrap_or_default();
            write_files(GitOperation::Pull, path, &files)
        })
    }

    fn add(&self, path: &Path, file: &Path) -> Result<(), TransportError> {
        let target = path.display().to_string();
        self.run(GitOperation::Add, &target, path, |state| {
            if !path.join(file).exists() {
                return Err(failed(
                    GitOperation::Add,
                    format!("pathspec '{}' did not match any files", file.display()),
                ));
            }
            state
                .staged
                .entry(path.to_path_buf())
                .or_default()
                .push(file.to_string_lossy().into_owned());
            Ok(())
        })
    }

    fn commit(&self, path: &Path, message: &str) -> Result<(), TransportError> {
        let target = path.display().to_string();
        self.run(GitOperation::Commit, &target, path, |state| {
            let staged = state.staged.remove(path).unwrap_or_default();
            if staged.is_empty() {
                return Err(TransportError::CommandFailed {
                    operation: GitOperation::Commit,
                    exit_code: Some(1),
                    stderr: "nothing to commit, working tree clean".to_string(),
                });
            }
            let mut files = BTreeMap::new();
            for name in staged {
                let content = std::fs::read_to_string(path.join(&name))
                    .map_err(|e| failed(GitOperation::Commit, e.to_string()))?;
                files.insert(name, content);
            }
            state
                .unpushed
                .entry(path.to_path_buf())
                .or_default()
                .push(MockCommit {
                    message: message.to_string(),
                    files,
                });
            Ok(())
        })
    }

    fn push(&self, path: &Path) -> Result<(), TransportError> {
        let target = path.display().to_string();
        self.run(GitOperation::Push, &target, path, |state| {
            let origin = state
                .origins
                .get(path)
                .cloned()
                .ok_or_else(|| failed(GitOperation::Push, "not a git repository"))?;
            let commits = state.unpushed.remove(path).unwrap_or_default();
            let remote = state.remotes.entry(origin).or_default();
            for commit in commits {
                remote.files.extend(commit.files.clone());
                remote.commits.push(commit);
            }
            Ok(())
        })
    }

    fn reset_to_upstream(&self, path: &Path) -> Result<(), TransportError> {
        let target = path.display().to_string();
        self.run(GitOperation::Reset, &target, path, |state| {
            let origin = state
                .origins
                .get(path)
                .cloned()
                .ok_or_else(|| failed(GitOperation::Reset, "not a git repository"))?;
            state.unpushed.remove(path);
            state.staged.remove(path);
            let files = state
                .remotes
                .get(&origin)
                .map(|r| r.files.clone())
                .unwrap_or_default();
            write_files(GitOperation::Reset, path, &files)
        })
    }
}
