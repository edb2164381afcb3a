//! Repository identifiers and their working-copy mapping.
//!
//! An identifier is a remote git URL of the form
//! `https://<host>/<owner>/<name>.git`. It maps to exactly one local path,
//! `<root>/<host>/<owner>/<name>`, keeping every segment so that two
//! different identifiers never share a working copy.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::errors::HandshakeError;

/// Default remote host accepted when no allowlist is configured.
pub const DEFAULT_ALLOWED_HOST: &str = "github.com";

static REMOTE_URL_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^https://([A-Za-z0-9.-]+)/([A-Za-z0-9._-]+)/([A-Za-z0-9._-]+)\.git$")
        .expect("remote url pattern is valid")
});

/// A parsed, validated repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoIdentifier {
    raw: String,
    host: String,
    owner: String,
    name: String,
}

impl RepoIdentifier {
    /// Parse `raw` and check its host against `allowed_hosts`.
    ///
    /// Performs no I/O. An empty allowlist accepts only [`DEFAULT_ALLOWED_HOST`].
    pub fn parse(raw: &str, allowed_hosts: &[String]) -> Result<Self, HandshakeError> {
        let trimmed = raw.trim();
        let Some(caps) = REMOTE_URL_PATTERN.captures(trimmed) else {
            return Err(HandshakeError::invalid_identifier(
                raw,
                "expected https://<host>/<owner>/<repo>.git",
            ));
        };

        let host = caps[1].to_string();
        let owner = caps[2].to_string();
        let name = caps[3].to_string();

        for segment in [&host, &owner, &name] {
            if segment.chars().all(|c| c == '.') {
                return Err(HandshakeError::invalid_identifier(
                    raw,
                    format!("path segment '{segment}' is not allowed"),
                ));
            }
        }

        if !host_is_allowed(&host, allowed_hosts) {
            return Err(HandshakeError::invalid_identifier(
                raw,
                format!("host '{host}' is not in the allowed host list"),
            ));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            host,
            owner,
            name,
        })
    }

    /// The identifier exactly as accepted (trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Location passed to the transport for clone.
    pub fn remote_url(&self) -> &str {
        &self.raw
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<owner>/<name>`, used in logs and error messages.
    pub fn short_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Working-copy path for this identifier under `root`.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        root.join(&self.host).join(&self.owner).join(&self.name)
    }
}

impl std::fmt::Display for RepoIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn host_is_allowed(host: &str, allowed_hosts: &[String]) -> bool {
    if allowed_hosts.is_empty() {
        return host.eq_ignore_ascii_case(DEFAULT_ALLOWED_HOST);
    }
    allowed_hosts
        .iter()
        .any(|allowed| allowed.trim().eq_ignore_ascii_case(host))
}
