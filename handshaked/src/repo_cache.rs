//! Maps repository identifiers to local working copies.
//!
//! A working copy lives at `<root>/<host>/<owner>/<name>`. The first resolve
//! clones it, every later resolve fast-forwards it. Sync and the read that
//! follows run under a per-path lock so two handshakes never interleave git
//! operations on the same checkout.

use handshake_common::{ConfigTriplet, GitOperation, HandshakeError, RepoIdentifier};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::git_exec::GitExecutor;
use crate::loader;
use crate::repo_locks::{KeyedGuard, KeyedLocks};

/// A working copy that is present and up to date with its remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRepo {
    pub identifier: RepoIdentifier,
    pub local_path: PathBuf,
}

pub struct RepoCache {
    root: PathBuf,
    allowed_hosts: Vec<String>,
    git: GitExecutor,
    working_copies: KeyedLocks,
}

impl RepoCache {
    pub fn new(root: PathBuf, allowed_hosts: Vec<String>, git: GitExecutor) -> Self {
        Self {
            root,
            allowed_hosts,
            git,
            working_copies: KeyedLocks::new(),
        }
    }

    pub fn git(&self) -> &GitExecutor {
        &self.git
    }

    /// Validate `raw` against the configured host allowlist. No I/O.
    pub fn parse(&self, raw: &str) -> Result<RepoIdentifier, HandshakeError> {
        RepoIdentifier::parse(raw, &self.allowed_hosts)
    }

    /// Bring the working copy of `raw` up to date.
    pub async fn resolve(&self, raw: &str) -> Result<ResolvedRepo, HandshakeError> {
        let identifier = self.parse(raw)?;
        let _guard = self.lock_path(&identifier.local_path(&self.root)).await;
        self.sync(identifier).await
    }

    /// Sync `identifier` and read its config triplet under one lock.
    pub async fn checkout(
        &self,
        identifier: RepoIdentifier,
    ) -> Result<(ResolvedRepo, ConfigTriplet), HandshakeError> {
        let _guard = self.lock_path(&identifier.local_path(&self.root)).await;
        let resolved = self.sync(identifier).await?;
        let triplet = loader::load(&resolved.local_path).await?;
        Ok((resolved, triplet))
    }

    /// Exclusive access to a resolved working copy.
    pub async fn lock(&self, repo: &ResolvedRepo) -> KeyedGuard {
        self.lock_path(&repo.local_path).await
    }

    async fn lock_path(&self, path: &Path) -> KeyedGuard {
        self.working_copies
            .acquire(&path.to_string_lossy())
            .await
    }

    async fn sync(&self, identifier: RepoIdentifier) -> Result<ResolvedRepo, HandshakeError> {
        let repo = identifier.short_name();
        let sync_error = |detail: String| HandshakeError::SyncError {
            repo: repo.clone(),
            detail,
        };
        let local_path = identifier.local_path(&self.root);

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            sync_error(format!(
                "cannot create work dir {}: {e}",
                self.root.display()
            ))
        })?;

        let has_git_dir = tokio::fs::try_exists(local_path.join(".git"))
            .await
            .unwrap_or(false);

        if has_git_dir {
            info!(repo = %repo, path = %local_path.display(), "pulling working copy");
            let path = local_path.clone();
            self.git
                .run(GitOperation::Pull, move |git| git.pull(&path))
                .await
                .map_err(|e| sync_error(e.to_string()))?;
        } else {
            if tokio::fs::try_exists(&local_path).await.unwrap_or(false) {
                warn!(repo = %repo, path = %local_path.display(), "removing incomplete working copy");
                tokio::fs::remove_dir_all(&local_path).await.map_err(|e| {
                    sync_error(format!("cannot remove {}: {e}", local_path.display()))
                })?;
            }
            if let Some(parent) = local_path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    sync_error(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
            info!(repo = %repo, path = %local_path.display(), "cloning working copy");
            let path = local_path.clone();
            let remote = identifier.remote_url().to_string();
            self.git
                .run(GitOperation::Clone, move |git| git.clone_repo(&remote, &path))
                .await
                .map_err(|e| sync_error(e.to_string()))?;
        }

        Ok(ResolvedRepo {
            identifier,
            local_path,
        })
    }
}
