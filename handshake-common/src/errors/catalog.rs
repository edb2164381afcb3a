//! Error Catalog for the handshake sync agent
//!
//! Each catalog entry carries:
//! - A unique code (HSK-E001 through HSK-E999)
//! - A human-readable message template
//! - Remediation steps
//!
//! Codes are stable: once published they are never renumbered, because the
//! trigger logs them next to the generic failure it returns to callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering every handshake failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Identifier Errors (E001-E099)
    // =========================================================================
    /// Repository identifier does not match the expected remote shape
    IdentifierMalformed,

    // =========================================================================
    // Sync Errors (E100-E199)
    // =========================================================================
    /// Clone or pull failed (network, auth, conflict or timeout)
    SyncTransportFailed,

    // =========================================================================
    // Config Errors (E200-E299)
    // =========================================================================
    /// A contract/interface/service document exists but cannot be parsed
    ConfigDocumentMalformed,
    /// Environment variable has invalid value
    ConfigEnvError,

    // =========================================================================
    // Publish Errors (E300-E399)
    // =========================================================================
    /// State write attempted against a repository without service.yaml
    PublishMissingTarget,
    /// Write, stage, commit or push of the updated state failed
    PublishFailed,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::IdentifierMalformed => 1,
            Self::SyncTransportFailed => 100,
            Self::ConfigDocumentMalformed => 200,
            Self::ConfigEnvError => 201,
            Self::PublishMissingTarget => 300,
            Self::PublishFailed => 301,
        }
    }

    /// Returns the formatted error code string (e.g., "HSK-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("HSK-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Identifier,
            100..=199 => ErrorCategory::Sync,
            200..=299 => ErrorCategory::Config,
            _ => ErrorCategory::Publish,
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Returns the error message template.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::IdentifierMalformed => "Repository identifier is malformed or not allowed",
            Self::SyncTransportFailed => "Failed to clone or pull repository",
            Self::ConfigDocumentMalformed => "Service config document could not be parsed",
            Self::ConfigEnvError => "Environment variable has invalid value",
            Self::PublishMissingTarget => "Repository has no service document to update",
            Self::PublishFailed => "Failed to commit or push handshake state",
        }
    }

    /// Returns remediation steps for this error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::IdentifierMalformed => &[
                "Use the form https://<host>/<owner>/<repo>.git",
                "Check that the host is listed in HANDSHAKE_ALLOWED_HOSTS",
            ],
            Self::SyncTransportFailed => &[
                "Verify the repository exists and credentials allow read access",
                "Check network connectivity to the remote host",
                "Remove the working copy under HANDSHAKE_WORK_DIR if it has diverged",
                "Raise HANDSHAKE_GIT_TIMEOUT_SECS for slow remotes",
            ],
            Self::ConfigDocumentMalformed => &[
                "Validate contract.yaml, interface.yaml and service.yaml with a YAML linter",
                "Check that version is a scalar and dependencies is a list of {name}",
            ],
            Self::ConfigEnvError => &[
                "Check HANDSHAKE_* environment variables for typos",
                "Unset the variable to fall back to its default",
            ],
            Self::PublishMissingTarget => &[
                "Commit a service.yaml with a desiredState mapping to the repository root",
            ],
            Self::PublishFailed => &[
                "Verify credentials allow pushing to the repository",
                "Re-run the handshake if the remote moved ahead during the check",
            ],
        }
    }

    /// Returns all error codes (for documentation generation).
    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::IdentifierMalformed,
            Self::SyncTransportFailed,
            Self::ConfigDocumentMalformed,
            Self::ConfigEnvError,
            Self::PublishMissingTarget,
            Self::PublishFailed,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Repository identifier errors (E001-E099)
    Identifier,
    /// Clone/pull errors (E100-E199)
    Sync,
    /// Document and process configuration errors (E200-E299)
    Config,
    /// State publishing errors (E300-E399)
    Publish,
}

impl ErrorCategory {
    /// Returns a human-readable name for the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Identifier => "Identifier",
            Self::Sync => "Sync",
            Self::Config => "Configuration",
            Self::Publish => "Publish",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "HSK-E001")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("Remediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        output
    }

    /// Formats the error as a single line.
    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}
