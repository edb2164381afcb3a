//! Contract scenarios across the public API of handshake-common.
//!
//! These scenarios validate:
//! - Identifier parsing and the stable, collision-free working-copy mapping
//! - Service document round trips that keep unknown content
//! - The mock transport behaving like a remote: clone, pull, commit, push
//! - Every error variant mapping to a catalog entry with remediation

use handshake_common::{
    ActualState, ErrorCategory, ErrorCode, GitOperation, GitTransport, HandshakeDetail,
    HandshakeError, MockGitTransport, RepoIdentifier, SERVICE_FILE, ServiceDocument,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[ctor::ctor]
fn setup() {
    handshake_common::testing::init_global_test_logging();
}

fn github() -> Vec<String> {
    vec!["github.com".to_string()]
}

// ---------------------------------------------------------------------------
// Identifier mapping
// ---------------------------------------------------------------------------

#[test]
fn e2e_identifier_maps_to_host_owner_name_path() {
    let id = RepoIdentifier::parse("https://github.com/acme/billing.git", &github()).unwrap();
    assert_eq!(id.short_name(), "acme/billing");
    assert_eq!(
        id.local_path(Path::new("/srv/work")),
        PathBuf::from("/srv/work/github.com/acme/billing")
    );
    assert_eq!(id.remote_url(), "https://github.com/acme/billing.git");
}

#[test]
fn e2e_same_name_different_owner_does_not_collide() {
    let root = Path::new("/srv/work");
    let a = RepoIdentifier::parse("https://github.com/acme/billing.git", &github()).unwrap();
    let b = RepoIdentifier::parse("https://github.com/globex/billing.git", &github()).unwrap();
    assert_ne!(a.local_path(root), b.local_path(root));
}

#[test]
fn e2e_rejected_identifiers() {
    for raw in [
        "",
        "billing",
        "http://github.com/acme/billing.git",
        "https://github.com/acme/billing",
        "https://github.com/acme/../billing.git",
        "https://gitlab.com/acme/billing.git",
        "git@github.com:acme/billing.git",
    ] {
        let err = RepoIdentifier::parse(raw, &github()).unwrap_err();
        assert!(
            matches!(err, HandshakeError::InvalidIdentifier { .. }),
            "{raw} should be rejected"
        );
    }
}

proptest! {
    #[test]
    fn e2e_mapping_is_a_function_of_the_identifier(
        owner in "[a-z][a-z0-9-]{0,12}",
        name in "[a-z][a-z0-9._-]{0,12}",
    ) {
        let raw = format!("https://github.com/{owner}/{name}.git");
        let root = Path::new("/work");
        let first = RepoIdentifier::parse(&raw, &github()).unwrap();
        let second = RepoIdentifier::parse(&raw, &github()).unwrap();
        prop_assert_eq!(first.local_path(root), second.local_path(root));
        prop_assert!(first.local_path(root).starts_with(root));
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

const CHECKOUT_SERVICE: &str = r#"
metadata:
  name: checkout
  repo: https://github.com/acme/checkout.git
desiredState:
  billing:
    repo: https://github.com/acme/billing.git
    dependencies:
      - name: billing
runbook: https://wiki.example.com/checkout
"#;

#[test]
fn e2e_service_round_trip_with_actual_state() {
    let mut doc: ServiceDocument = serde_yaml_ng::from_str(CHECKOUT_SERVICE).unwrap();
    let mut details = BTreeMap::new();
    details.insert(
        "billing".to_string(),
        HandshakeDetail {
            status: false,
            message: "Handshake failed with billing. Mismatch in contract or dependencies."
                .to_string(),
            version_match: false,
            dependency_declared: true,
            error: None,
        },
    );
    doc.actual_state = Some(ActualState::aggregate(details, chrono::Utc::now()));

    let yaml = serde_yaml_ng::to_string(&doc).unwrap();
    let reparsed: ServiceDocument = serde_yaml_ng::from_str(&yaml).unwrap();
    assert_eq!(reparsed, doc);
    assert!(yaml.contains("runbook:"));
    assert!(yaml.contains("versionMatch: false"));
    assert!(yaml.contains("dependencyDeclared: true"));
}

// ---------------------------------------------------------------------------
// Mock transport
// ---------------------------------------------------------------------------

#[test]
fn e2e_mock_transport_full_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let remote = "https://github.com/acme/checkout.git";
    let wc = dir.path().join("checkout");
    let mock = MockGitTransport::new().with_remote(remote, &[(SERVICE_FILE, CHECKOUT_SERVICE)]);
    let transport: &dyn GitTransport = &mock;

    transport.clone_repo(remote, &wc).unwrap();
    std::fs::write(wc.join(SERVICE_FILE), "desiredState: {}\n").unwrap();
    transport.add(&wc, Path::new(SERVICE_FILE)).unwrap();
    transport.commit(&wc, "Updated handshake status").unwrap();
    transport.push(&wc).unwrap();
    transport.pull(&wc).unwrap();

    let ops: Vec<GitOperation> = mock.calls().into_iter().map(|c| c.operation).collect();
    assert_eq!(
        ops,
        vec![
            GitOperation::Clone,
            GitOperation::Add,
            GitOperation::Commit,
            GitOperation::Push,
            GitOperation::Pull,
        ]
    );
    assert_eq!(
        mock.remote_file(remote, SERVICE_FILE).as_deref(),
        Some("desiredState: {}\n")
    );
}

#[test]
fn e2e_mock_pull_outside_clone_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockGitTransport::new();
    let err = mock.pull(dir.path()).unwrap_err();
    assert_eq!(err.operation(), GitOperation::Pull);
}

// ---------------------------------------------------------------------------
// Error catalog
// ---------------------------------------------------------------------------

#[test]
fn e2e_every_error_has_catalog_entry_with_remediation() {
    let errors = [
        HandshakeError::InvalidIdentifier {
            identifier: "x".into(),
            reason: "bad".into(),
        },
        HandshakeError::SyncError {
            repo: "acme/billing".into(),
            detail: "timed out".into(),
        },
        HandshakeError::MalformedConfig {
            document: "contract.yaml",
            path: PathBuf::from("/w/contract.yaml"),
            detail: "bad".into(),
        },
        HandshakeError::MissingTarget {
            repo: "acme/billing".into(),
            document: SERVICE_FILE,
        },
        HandshakeError::PublishError {
            repo: "acme/billing".into(),
            detail: "rejected".into(),
        },
    ];

    for err in &errors {
        let entry = err.error_code().entry();
        assert!(entry.code.starts_with("HSK-E"));
        assert!(!entry.remediation.is_empty(), "{} lacks remediation", entry.code);
        assert!(ErrorCode::all().contains(&err.error_code()));
    }
    assert_eq!(
        errors[1].error_code().category(),
        ErrorCategory::Sync
    );
}
