//! Error taxonomy and advisory retry-policy type for docsync.
//!
//! Each side of the pipeline has its own tagged error enum so callers can
//! pattern-match on the kind of failure:
//!
//! - [`StoreError`] for the content store (read / conditional write),
//! - [`TransformError`] for the text-generation service,
//! - [`ConfigurationError`] for settings validated before anything runs.
//!
//! [`PipelineError`] is what [`crate::SyncPipeline::run`] returns; it wraps the
//! component errors without flattening them.
//!
//! Nothing in this crate retries. [`RetryPolicy`] is advice for an outer
//! caller that wants to decide whether re-running the whole pipeline is sensible.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ContentPath, VersionToken};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is worth re-running the pipeline for and, if so,
/// after what delay.
///
/// The pipeline never acts on this itself; it is exposed so a caller wrapping
/// `run` can decide without string-matching error messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// Re-running may succeed.
    Retryable {
        /// Minimum back-off before the next attempt, derived from a
        /// `Retry-After` header when the service sent one.
        after: Option<Duration>,
    },
    /// Re-running without operator intervention will fail the same way.
    NonRetryable,
}

/// HTTP statuses that indicate a transient condition on the remote side.
fn is_transient_status(status: Option<u16>) -> bool {
    matches!(status, Some(429) | Some(500..=599))
}

// ---------------------------------------------------------------------------
// Content store errors
// ---------------------------------------------------------------------------

/// Failures of the content store, both from the raw repository port and from
/// the [`crate::ContentStore`] policy layer above it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No resource exists at the path.
    ///
    /// Recovered locally by the store client: reads substitute default content
    /// and writes switch to create semantics. Never surfaced by `run`.
    #[error("resource not found: {path}")]
    NotFound {
        /// The path that was looked up.
        path: ContentPath,
    },

    /// The path resolves to something other than a single file (a directory,
    /// symlink, or submodule).
    #[error("resource at '{path}' is a {kind}, not a file")]
    InvalidResourceKind {
        /// The path that was looked up.
        path: ContentPath,
        /// The kind the store reported (e.g. `"dir"`).
        kind: String,
    },

    /// The conditional write was rejected because the resource changed after
    /// its version token was read.
    #[error("version conflict writing '{path}': resource changed since version {}", .expected.as_ref().map(VersionToken::as_str).unwrap_or("<none>"))]
    VersionConflict {
        /// The path being written.
        path: ContentPath,
        /// The token the write was conditioned on (`None` for a create).
        expected: Option<VersionToken>,
    },

    /// Any other store failure: authentication, network, rate limit, malformed
    /// response.
    #[error("content store unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Server-requested delay, when one was sent.
        retry_after: Option<Duration>,
    },
}

impl StoreError {
    /// Creates an [`StoreError::Unavailable`] with no status information.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Advisory retry policy for a caller that wraps the pipeline.
    ///
    /// A version conflict is retryable because a fresh run re-reads the
    /// current version before writing.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::VersionConflict { .. } => RetryPolicy::Retryable { after: None },
            Self::Unavailable {
                status,
                retry_after,
                ..
            } if is_transient_status(*status) => RetryPolicy::Retryable {
                after: *retry_after,
            },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Text transform errors
// ---------------------------------------------------------------------------

/// Failures of the text-generation service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// The service rejected or failed the request (quota, network, malformed
    /// request, unparseable response).
    #[error("text transform unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Server-requested delay, when one was sent.
        retry_after: Option<Duration>,
    },
}

impl TransformError {
    /// Creates an [`TransformError::Unavailable`] with no status information.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Advisory retry policy for a caller that wraps the pipeline.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Unavailable {
                status,
                retry_after,
                ..
            } if is_transient_status(*status) => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Unavailable { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Settings problems detected before any pipeline step runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// One or more required settings are absent. Every missing key is listed.
    #[error("missing required settings: {}", .missing.join(", "))]
    Missing {
        /// Names of the missing settings, in the order they were checked.
        missing: Vec<String>,
    },

    /// A setting is present but its value is unusable.
    #[error("invalid setting '{key}': {reason}")]
    Invalid {
        /// Name of the offending setting.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Pipeline-level errors
// ---------------------------------------------------------------------------

/// Errors that abort a [`crate::SyncPipeline::run`].
///
/// A failure in any step aborts the remaining steps. Nothing is rolled back:
/// the store is the only stateful resource and a failed write never mutates it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The read or the write step failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The transform step failed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Required settings were missing or invalid; no step ran.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl PipelineError {
    /// Advisory retry policy, delegated to the component error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Store(e) => e.retry_policy(),
            Self::Transform(e) => e.retry_policy(),
            Self::Configuration(_) => RetryPolicy::NonRetryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> ContentPath {
        ContentPath::new("docs/x.md").unwrap()
    }

    #[test]
    fn missing_settings_are_all_listed() {
        let err = ConfigurationError::Missing {
            missing: vec!["GITHUB_TOKEN".into(), "ANTHROPIC_API_KEY".into()],
        };
        assert_eq!(
            err.to_string(),
            "missing required settings: GITHUB_TOKEN, ANTHROPIC_API_KEY"
        );
    }

    #[test]
    fn version_conflict_names_expected_token() {
        let err = StoreError::VersionConflict {
            path: path(),
            expected: VersionToken::new("abc123"),
        };
        assert!(err.to_string().contains("abc123"));
        assert!(err.to_string().contains("docs/x.md"));
    }

    #[test]
    fn conflicts_and_rate_limits_are_retryable() {
        let conflict = StoreError::VersionConflict {
            path: path(),
            expected: None,
        };
        assert_eq!(
            conflict.retry_policy(),
            RetryPolicy::Retryable { after: None }
        );

        let limited = TransformError::Unavailable {
            message: "rate limited".into(),
            status: Some(429),
            retry_after: Some(Duration::from_secs(20)),
        };
        assert_eq!(
            PipelineError::from(limited).retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(20))
            }
        );
    }

    #[test]
    fn auth_failures_and_bad_paths_are_not_retryable() {
        let unauthorized = StoreError::Unavailable {
            message: "bad credentials".into(),
            status: Some(401),
            retry_after: None,
        };
        assert_eq!(unauthorized.retry_policy(), RetryPolicy::NonRetryable);

        let directory = StoreError::InvalidResourceKind {
            path: path(),
            kind: "dir".into(),
        };
        assert_eq!(directory.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn configuration_failures_are_not_retryable() {
        let err = PipelineError::from(ConfigurationError::Missing {
            missing: vec!["GITHUB_TOKEN".into()],
        });
        assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(
            err.to_string(),
            "configuration error: missing required settings: GITHUB_TOKEN"
        );
    }
}
