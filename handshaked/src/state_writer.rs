//! Persists a handshake verdict back to its repository.

use handshake_common::{
    ActualState, GitOperation, HandshakeError, SERVICE_FILE, ServiceDocument,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::repo_cache::{RepoCache, ResolvedRepo};

pub const COMMIT_MESSAGE: &str = "Updated handshake status";

/// Record `state` as `actualState` in `repo`'s `service.yaml`, then add,
/// commit and push.
///
/// The document is re-read under the working-copy lock, so edits pulled in
/// since the handshake loaded it are kept. The working copy must already
/// contain `service.yaml`; otherwise nothing is written. Any failure leaves
/// the working copy as it was before the call: a failure before the commit
/// restores the previous file, a failed push resets to the upstream branch.
pub async fn persist(
    cache: &RepoCache,
    repo: &ResolvedRepo,
    state: &ActualState,
) -> Result<(), HandshakeError> {
    let name = repo.identifier.short_name();
    let target = repo.local_path.join(SERVICE_FILE);
    let publish_error = |detail: String| HandshakeError::PublishError {
        repo: name.clone(),
        detail,
    };

    let _guard = cache.lock(repo).await;

    let previous = match tokio::fs::read_to_string(&target).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(HandshakeError::MissingTarget {
                repo: name.clone(),
                document: SERVICE_FILE,
            });
        }
        Err(e) => return Err(publish_error(format!("cannot read {SERVICE_FILE}: {e}"))),
    };

    let mut service: ServiceDocument =
        serde_yaml_ng::from_str(&previous).map_err(|e| HandshakeError::MalformedConfig {
            document: SERVICE_FILE,
            path: target.clone(),
            detail: e.to_string(),
        })?;
    service.actual_state = Some(state.clone());

    let yaml = serde_yaml_ng::to_string(&service)
        .map_err(|e| publish_error(format!("cannot serialize {SERVICE_FILE}: {e}")))?;

    if let Err(e) = tokio::fs::write(&target, &yaml).await {
        restore(&target, &previous).await;
        return Err(publish_error(format!("cannot write {SERVICE_FILE}: {e}")));
    }

    let staged = stage_and_commit(cache, &repo.local_path).await;
    if let Err(detail) = staged {
        restore(&target, &previous).await;
        return Err(publish_error(detail));
    }
    info!(repo = %name, message = COMMIT_MESSAGE, "committed handshake state");

    let path = repo.local_path.clone();
    let pushed = cache
        .git()
        .run(GitOperation::Push, move |git| git.push(&path))
        .await;
    if let Err(e) = pushed {
        discard_commit(cache, repo).await;
        return Err(publish_error(e.to_string()));
    }
    info!(repo = %name, "pushed handshake state");

    Ok(())
}

async fn stage_and_commit(cache: &RepoCache, path: &Path) -> Result<(), String> {
    let add_path: PathBuf = path.to_path_buf();
    cache
        .git()
        .run(GitOperation::Add, move |git| {
            git.add(&add_path, Path::new(SERVICE_FILE))
        })
        .await
        .map_err(|e| e.to_string())?;

    let commit_path = path.to_path_buf();
    cache
        .git()
        .run(GitOperation::Commit, move |git| {
            git.commit(&commit_path, COMMIT_MESSAGE)
        })
        .await
        .map_err(|e| e.to_string())
}

async fn restore(target: &Path, previous: &str) {
    if let Err(e) = tokio::fs::write(target, previous).await {
        warn!(path = %target.display(), error = %e, "failed to restore previous service document");
    }
}

/// Drop the unpushed commit. If git cannot reset, remove the working copy
/// so the next resolve clones it again.
async fn discard_commit(cache: &RepoCache, repo: &ResolvedRepo) {
    let path = repo.local_path.clone();
    let reset = cache
        .git()
        .run(GitOperation::Reset, move |git| git.reset_to_upstream(&path))
        .await;
    let Err(e) = reset else {
        warn!(repo = %repo.identifier.short_name(), "discarded unpushed handshake commit");
        return;
    };
    warn!(
        repo = %repo.identifier.short_name(),
        error = %e,
        "reset failed, removing working copy"
    );
    if let Err(e) = tokio::fs::remove_dir_all(&repo.local_path).await {
        error!(
            path = %repo.local_path.display(),
            error = %e,
            "failed to remove working copy"
        );
    }
}
