//! Public entry point: one full handshake for one repository.

use handshake_common::{
    ActualState, FailureMode, GitTransport, HandshakeConfig, HandshakeError, RepoIdentifier,
    SERVICE_FILE,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};

use crate::git_exec::GitExecutor;
use crate::repo_cache::{RepoCache, ResolvedRepo};
use crate::repo_locks::KeyedLocks;
use crate::{state_writer, walker};

pub struct Orchestrator {
    cache: RepoCache,
    roots: KeyedLocks,
    failure_mode: FailureMode,
}

impl Orchestrator {
    pub fn new(
        work_dir: PathBuf,
        allowed_hosts: Vec<String>,
        transport: Arc<dyn GitTransport>,
        max_concurrent_git: usize,
        failure_mode: FailureMode,
    ) -> Self {
        Self {
            cache: RepoCache::new(
                work_dir,
                allowed_hosts,
                GitExecutor::new(transport, max_concurrent_git),
            ),
            roots: KeyedLocks::new(),
            failure_mode,
        }
    }

    pub fn from_config(config: &HandshakeConfig, transport: Arc<dyn GitTransport>) -> Self {
        Self::new(
            config.work_dir.value.clone(),
            config.allowed_hosts.value.clone(),
            transport,
            usize::try_from(config.max_concurrent_git.value).unwrap_or(usize::MAX),
            config.failure_mode.value,
        )
    }

    /// Clone or fast-forward the working copy of `raw` without checking it.
    pub async fn sync(&self, raw: &str) -> Result<ResolvedRepo, HandshakeError> {
        self.cache.resolve(raw).await
    }

    /// Resolve `raw`, check every desired dependency, and persist the result
    /// as `actualState` in `raw`'s own `service.yaml`.
    ///
    /// Concurrent calls for the same repository run one after another.
    pub async fn handshake(&self, raw: &str) -> Result<ActualState, HandshakeError> {
        let identifier = self.cache.parse(raw).inspect_err(|e| {
            error!(code = %e.error_code().code_string(), error = %e, "handshake rejected");
        })?;
        let span = info_span!("handshake", repo = %identifier.short_name());

        async move {
            let _root = self.roots.acquire(identifier.as_str()).await;
            info!("handshake started");

            let result = self.run(identifier).await;
            match &result {
                Ok(state) => info!(
                    status = state.handshake_status,
                    dependencies = state.details.len(),
                    "handshake finished"
                ),
                Err(e) => error!(
                    code = %e.error_code().code_string(),
                    reason = e.reason_code(),
                    error = %e,
                    "handshake failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, identifier: RepoIdentifier) -> Result<ActualState, HandshakeError> {
        let (resolved, triplet) = self.cache.checkout(identifier).await?;
        let Some(service) = triplet.service else {
            return Err(HandshakeError::MissingTarget {
                repo: resolved.identifier.short_name(),
                document: SERVICE_FILE,
            });
        };

        let state = walker::walk(
            &self.cache,
            self.failure_mode,
            &service,
            triplet.contract.as_ref(),
            triplet.interface.as_ref(),
        )
        .await?;

        state_writer::persist(&self.cache, &resolved, &state).await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, checkout_and_billing, publish, remote};
    use handshake_common::{GitOperation, MockGitTransport, ServiceDocument};
    use std::path::Path;
    use std::time::Duration;

    fn orchestrator(root: &Path, mock: &MockGitTransport, mode: FailureMode) -> Orchestrator {
        handshake_common::testing::init_global_test_logging();
        Orchestrator::new(
            root.to_path_buf(),
            vec!["github.com".to_string()],
            Arc::new(mock.clone()),
            6,
            mode,
        )
    }

    fn pushed_service(mock: &MockGitTransport, name: &str) -> ServiceDocument {
        let yaml = mock.remote_file(&remote(name), SERVICE_FILE).unwrap();
        serde_yaml_ng::from_str(&yaml).unwrap()
    }

    #[tokio::test]
    async fn test_matching_versions_succeed_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let mock = checkout_and_billing("1.2.0", "1.2.0");
        let orch = orchestrator(dir.path(), &mock, FailureMode::FailFast);

        let state = orch.handshake(&remote("checkout")).await.unwrap();
        assert!(state.handshake_status);
        assert_eq!(
            state.details["billing"].message,
            "Handshake successful with billing"
        );

        let pushed = pushed_service(&mock, "checkout");
        assert_eq!(pushed.actual_state.as_ref(), Some(&state));
        assert!(pushed.metadata.is_some());
        let commits = mock.remote_commits(&remote("checkout"));
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "Updated handshake status");
        assert!(mock.remote_commits(&remote("billing")).is_empty());
    }

    #[tokio::test]
    async fn test_version_mismatch_fails_and_still_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mock = checkout_and_billing("1.2.0", "1.3.0");
        let orch = orchestrator(dir.path(), &mock, FailureMode::FailFast);

        let state = orch.handshake(&remote("checkout")).await.unwrap();
        assert!(!state.handshake_status);
        assert_eq!(
            state.details["billing"].message,
            "Handshake failed with billing. Mismatch in contract or dependencies."
        );
        assert_eq!(mock.remote_commits(&remote("checkout")).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_identifier_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("work");
        let mock = checkout_and_billing("1.2.0", "1.2.0");
        let orch = orchestrator(&root, &mock, FailureMode::FailFast);

        let err = orch
            .handshake("https://github.com/acme/checkout")
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::InvalidIdentifier { .. }));
        assert!(mock.calls().is_empty());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_repository_without_service_document_is_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let mock = publish(
            MockGitTransport::new(),
            "checkout",
            Fixture {
                version: Some("1.0.0"),
                ..Default::default()
            },
        );
        let orch = orchestrator(dir.path(), &mock, FailureMode::FailFast);

        let err = orch.handshake(&remote("checkout")).await.unwrap_err();
        assert!(matches!(err, HandshakeError::MissingTarget { .. }));
        assert!(mock.calls_of(GitOperation::Add).is_empty());
        assert!(mock.calls_of(GitOperation::Commit).is_empty());
        assert!(
            !dir.path()
                .join("github.com/acme/checkout")
                .join(SERVICE_FILE)
                .exists()
        );
    }

    #[tokio::test]
    async fn test_fail_fast_unreachable_dependency_makes_no_commit() {
        let dir = tempfile::tempdir().unwrap();
        let mock = publish(
            MockGitTransport::new(),
            "checkout",
            Fixture {
                version: Some("1.0.0"),
                interface: Some(&["ghost"]),
                desired: Some(&[("ghost", "ghost", "ghost")]),
            },
        );
        let orch = orchestrator(dir.path(), &mock, FailureMode::FailFast);

        let err = orch.handshake(&remote("checkout")).await.unwrap_err();
        assert!(matches!(err, HandshakeError::SyncError { .. }));
        assert!(mock.calls_of(GitOperation::Commit).is_empty());
        assert!(pushed_service(&mock, "checkout").actual_state.is_none());
    }

    #[tokio::test]
    async fn test_collect_partial_records_failure_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        let mock = publish(
            MockGitTransport::new(),
            "checkout",
            Fixture {
                version: Some("1.0.0"),
                interface: Some(&["ghost"]),
                desired: Some(&[("ghost", "ghost", "ghost")]),
            },
        );
        let orch = orchestrator(dir.path(), &mock, FailureMode::CollectPartial);

        let state = orch.handshake(&remote("checkout")).await.unwrap();
        assert!(!state.handshake_status);
        assert_eq!(state.details["ghost"].error.as_deref(), Some("HSK-E100"));
        assert_eq!(mock.remote_commits(&remote("checkout")).len(), 1);
        assert_eq!(
            pushed_service(&mock, "checkout").actual_state,
            Some(state)
        );
    }

    #[tokio::test]
    async fn test_failed_push_leaves_no_commit_for_the_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let mock = checkout_and_billing("1.2.0", "1.2.0");
        let orch = orchestrator(dir.path(), &mock, FailureMode::FailFast);

        mock.fail_on(GitOperation::Push, "checkout");
        let err = orch.handshake(&remote("checkout")).await.unwrap_err();
        assert!(matches!(err, HandshakeError::PublishError { .. }));

        mock.clear_failures();
        let state = orch.handshake(&remote("checkout")).await.unwrap();
        let commits = mock.remote_commits(&remote("checkout"));
        assert_eq!(commits.len(), 1);
        assert_eq!(pushed_service(&mock, "checkout").actual_state, Some(state));
    }

    #[tokio::test]
    async fn test_details_are_keyed_by_dependency_name() {
        let dir = tempfile::tempdir().unwrap();
        let mock = publish(
            MockGitTransport::new(),
            "checkout",
            Fixture {
                version: Some("1.2.0"),
                interface: Some(&["billing"]),
                desired: Some(&[("billing-svc", "billing", "billing")]),
            },
        );
        let mock = publish(
            mock,
            "billing",
            Fixture {
                version: Some("1.2.0"),
                ..Default::default()
            },
        );
        let orch = orchestrator(dir.path(), &mock, FailureMode::FailFast);

        let state = orch.handshake(&remote("checkout")).await.unwrap();
        assert!(state.details.contains_key("billing"));
        assert!(!state.details.contains_key("billing-svc"));
        assert!(state.handshake_status);
    }

    #[tokio::test]
    async fn test_second_handshake_pulls_and_sees_new_versions() {
        let dir = tempfile::tempdir().unwrap();
        let mock = checkout_and_billing("1.2.0", "1.3.0");
        let orch = orchestrator(dir.path(), &mock, FailureMode::FailFast);

        assert!(!orch.handshake(&remote("checkout")).await.unwrap().handshake_status);

        mock.set_remote_file(&remote("billing"), "contract.yaml", "version: 1.2.0\n");
        let state = orch.handshake(&remote("checkout")).await.unwrap();
        assert!(state.handshake_status);

        assert_eq!(mock.calls_of(GitOperation::Clone).len(), 2);
        assert_eq!(mock.calls_of(GitOperation::Pull).len(), 2);
        assert_eq!(mock.remote_commits(&remote("checkout")).len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_handshakes_of_one_repository_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let mock = checkout_and_billing("1.2.0", "1.2.0");
        mock.set_delay(Duration::from_millis(5));
        let orch = Arc::new(orchestrator(dir.path(), &mock, FailureMode::FailFast));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let orch = Arc::clone(&orch);
            handles.push(tokio::spawn(async move {
                orch.handshake(&remote("checkout")).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().handshake_status);
        }

        assert_eq!(mock.overlapping_operations(), 0);
        assert_eq!(mock.calls_of(GitOperation::Clone).len(), 2);
        assert_eq!(mock.remote_commits(&remote("checkout")).len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_dependency_across_roots_never_overlaps() {
        let dir = tempfile::tempdir().unwrap();
        let mock = checkout_and_billing("1.2.0", "1.2.0");
        let mock = publish(
            mock,
            "invoicing",
            Fixture {
                version: Some("1.2.0"),
                interface: Some(&["billing"]),
                desired: Some(&[("billing", "billing", "billing")]),
            },
        );
        mock.set_delay(Duration::from_millis(5));
        let orch = Arc::new(orchestrator(dir.path(), &mock, FailureMode::FailFast));

        let a = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.handshake(&remote("checkout")).await })
        };
        let b = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.handshake(&remote("invoicing")).await })
        };
        assert!(a.await.unwrap().unwrap().handshake_status);
        assert!(b.await.unwrap().unwrap().handshake_status);
        assert_eq!(mock.overlapping_operations(), 0);
    }
}
