//! Pass/fail compatibility decision between a service and one dependency.

use handshake_common::{ContractDocument, HandshakeDetail, InterfaceDocument};

/// Check a dependent against one of its dependencies.
///
/// Versions must be equal strings; a missing contract or `version` on
/// either side never matches. `dependency_name` must appear in the
/// dependent's interface.
pub fn check(
    dependent_contract: Option<&ContractDocument>,
    dependent_interface: Option<&InterfaceDocument>,
    dependency_contract: Option<&ContractDocument>,
    dependency_name: &str,
) -> HandshakeDetail {
    let version_match = match (
        dependent_contract.and_then(|c| c.version.as_deref()),
        dependency_contract.and_then(|c| c.version.as_deref()),
    ) {
        (Some(ours), Some(theirs)) => ours == theirs,
        _ => false,
    };
    let dependency_declared =
        dependent_interface.is_some_and(|interface| interface.declares(dependency_name));
    let status = version_match && dependency_declared;

    HandshakeDetail {
        status,
        message: if status {
            success_message(dependency_name)
        } else {
            failure_message(dependency_name, "Mismatch in contract or dependencies.")
        },
        version_match,
        dependency_declared,
        error: None,
    }
}

pub fn success_message(name: &str) -> String {
    format!("Handshake successful with {name}")
}

pub fn failure_message(name: &str, reason: &str) -> String {
    format!("Handshake failed with {name}. {reason}")
}
