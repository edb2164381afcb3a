//! Service config documents and handshake results.
//!
//! Only the fields the engine interprets are typed. Everything else in a
//! document is kept in `extra` so a read-modify-write cycle never drops
//! content the owning team put there.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeMap;

/// File name of the contract document at a repository root.
pub const CONTRACT_FILE: &str = "contract.yaml";
/// File name of the interface document at a repository root.
pub const INTERFACE_FILE: &str = "interface.yaml";
/// File name of the service document at a repository root.
pub const SERVICE_FILE: &str = "service.yaml";

/// A service's own published interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractDocument {
    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl ContractDocument {
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            extra: Mapping::new(),
        }
    }
}

/// Reference to another service by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub name: String,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl DependencyRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Mapping::new(),
        }
    }
}

/// What a service expects from the services it talks to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDocument {
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl InterfaceDocument {
    /// Whether a dependency called `name` is declared.
    pub fn declares(&self, name: &str) -> bool {
        self.dependencies.iter().any(|dep| dep.name == name)
    }
}

/// One entry of `desiredState`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredDependency {
    pub repo: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl DesiredDependency {
    /// Name used to match against the dependent's interface.
    ///
    /// The first declared dependency wins; an entry without any falls back
    /// to its own key in `desiredState`.
    pub fn primary_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.dependencies
            .first()
            .map_or(key, |dep| dep.name.as_str())
    }
}

/// Desired and last observed dependency graph of a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub desired_state: BTreeMap<String, DesiredDependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_state: Option<ActualState>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Outcome of checking one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeDetail {
    pub status: bool,
    pub message: String,
    #[serde(default)]
    pub version_match: bool,
    #[serde(default)]
    pub dependency_declared: bool,
    /// Catalog code when the dependency could not be resolved or loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated handshake verdict, persisted as `actualState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualState {
    #[serde(serialize_with = "millis_timestamp")]
    pub last_checked: DateTime<Utc>,
    pub handshake_status: bool,
    #[serde(default)]
    pub details: BTreeMap<String, HandshakeDetail>,
}

impl ActualState {
    /// Aggregate per-dependency details into a verdict stamped with `now`.
    ///
    /// An empty detail set is a vacuous success.
    pub fn aggregate(details: BTreeMap<String, HandshakeDetail>, now: DateTime<Utc>) -> Self {
        Self {
            last_checked: now.trunc_subsecs(3),
            handshake_status: details.values().all(|detail| detail.status),
            details,
        }
    }
}

/// The three well-known documents of one working copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTriplet {
    pub contract: Option<ContractDocument>,
    pub interface: Option<InterfaceDocument>,
    pub service: Option<ServiceDocument>,
}

/// RFC 3339 with exactly three fractional digits, e.g. `2026-03-01T12:30:00.000Z`.
fn millis_timestamp<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Accept any YAML scalar for `version` and keep its textual form.
///
/// `version: 1.2` and `version: "1.2"` compare equal; non-scalar values are
/// rejected as malformed.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "version must be a scalar, got {other:?}"
        ))),
    }
}
