//! Error catalog and the handshake error taxonomy.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                              |
//! |------------|-------------|------------------------------------------|
//! | E001-E099  | Identifier  | Malformed or disallowed repository refs  |
//! | E100-E199  | Sync        | Clone/pull transport failures            |
//! | E200-E299  | Config      | Service documents and process config     |
//! | E300-E399  | Publish     | Writing, committing and pushing state    |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use std::path::PathBuf;

/// Failures that abort a handshake.
///
/// Nothing below the orchestrator recovers from these; they propagate to the
/// trigger which reports a generic failure and logs the detail.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("invalid repository identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("failed to sync {repo}: {detail}")]
    SyncError { repo: String, detail: String },

    #[error("malformed {document} in {}: {detail}", path.display())]
    MalformedConfig {
        document: &'static str,
        path: PathBuf,
        detail: String,
    },

    #[error("{document} not found in {repo}")]
    MissingTarget {
        repo: String,
        document: &'static str,
    },

    #[error("failed to publish state to {repo}: {detail}")]
    PublishError { repo: String, detail: String },
}

impl HandshakeError {
    /// Catalog entry for this failure.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidIdentifier { .. } => ErrorCode::IdentifierMalformed,
            Self::SyncError { .. } => ErrorCode::SyncTransportFailed,
            Self::MalformedConfig { .. } => ErrorCode::ConfigDocumentMalformed,
            Self::MissingTarget { .. } => ErrorCode::PublishMissingTarget,
            Self::PublishError { .. } => ErrorCode::PublishFailed,
        }
    }

    /// Stable deterministic reason code for diagnostics and automation.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "HSK_INVALID_IDENTIFIER",
            Self::SyncError { .. } => "HSK_SYNC_ERROR",
            Self::MalformedConfig { .. } => "HSK_MALFORMED_CONFIG",
            Self::MissingTarget { .. } => "HSK_MISSING_TARGET",
            Self::PublishError { .. } => "HSK_PUBLISH_ERROR",
        }
    }

    pub(crate) fn invalid_identifier(identifier: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}
