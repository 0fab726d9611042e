//! Manifest adaptation errors.

use std::path::PathBuf;

use thiserror::Error;

/// The manifest or background entry cannot be adapted.
///
/// Fatal to the build-start sequence: the same input would fail again, so
/// it is surfaced immediately and never retried.
#[derive(Debug, Error)]
pub enum AdaptationError {
    #[error("cannot read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("manifest is not valid JSON")]
    Parse(#[source] serde_json::Error),

    #[error("manifest root must be a JSON object")]
    NotAnObject,

    #[error("manifest is missing `manifest_version`")]
    MissingManifestVersion,

    #[error("unsupported `manifest_version`: {0} (expected 2 or 3)")]
    UnsupportedManifestVersion(String),

    #[error("malformed manifest field `{field}`: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("background script `{0}` has an unterminated reload agent block")]
    UnterminatedAgentBlock(String),
}

impl AdaptationError {
    pub(super) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            field,
            reason: reason.into(),
        }
    }
}
