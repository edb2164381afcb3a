//! Walks `desiredState` and checks every dependency.

use chrono::Utc;
use handshake_common::{
    ActualState, ContractDocument, FailureMode, HandshakeDetail, HandshakeError,
    InterfaceDocument, ServiceDocument,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::checker::{self, failure_message};
use crate::repo_cache::RepoCache;

/// Check every entry of `service.desired_state`, in key order, against the
/// caller's own contract and interface.
///
/// Details are keyed by dependency name. When two entries share a name the
/// later key wins.
///
/// Dependencies are resolved and loaded one at a time. Under
/// [`FailureMode::FailFast`] the first resolve or load error aborts the walk;
/// under [`FailureMode::CollectPartial`] it becomes a failed detail.
pub async fn walk(
    cache: &RepoCache,
    mode: FailureMode,
    service: &ServiceDocument,
    contract: Option<&ContractDocument>,
    interface: Option<&InterfaceDocument>,
) -> Result<ActualState, HandshakeError> {
    let mut details = BTreeMap::new();

    for (key, entry) in &service.desired_state {
        let name = entry.primary_name(key);

        let fetched = match cache.parse(&entry.repo) {
            Ok(identifier) => cache.checkout(identifier).await,
            Err(e) => Err(e),
        };

        let detail = match fetched {
            Ok((_, triplet)) => {
                let detail = checker::check(contract, interface, triplet.contract.as_ref(), name);
                info!(
                    dependency = %key,
                    name,
                    status = detail.status,
                    version_match = detail.version_match,
                    dependency_declared = detail.dependency_declared,
                    "handshake checked"
                );
                detail
            }
            Err(e) if mode == FailureMode::CollectPartial => {
                let code = e.error_code();
                warn!(dependency = %key, code = %code.code_string(), error = %e, "dependency unavailable, continuing");
                HandshakeDetail {
                    status: false,
                    message: failure_message(name, &format!("{}.", code.message())),
                    version_match: false,
                    dependency_declared: interface.is_some_and(|i| i.declares(name)),
                    error: Some(code.code_string()),
                }
            }
            Err(e) => {
                warn!(dependency = %key, code = %e.error_code().code_string(), error = %e, "dependency unavailable, aborting");
                return Err(e);
            }
        };

        details.insert(name.to_string(), detail);
    }

    Ok(ActualState::aggregate(details, Utc::now()))
}
