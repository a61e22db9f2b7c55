//! Error types for download clients.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a [`DownloadError`], surfaced in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadErrorKind {
    /// Connectivity, DNS, TLS, or server-side (5xx) failure.
    Network,
    /// The backend asked us to slow down (HTTP 429).
    RateLimit,
    /// The backend's usage quota is exhausted.
    Quota,
    /// The task did not finish within its configured timeout.
    Timeout,
    /// Anything else (bad responses, local write failures).
    Other,
}

impl DownloadErrorKind {
    /// Returns the stable snake_case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::Quota => "quota",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DownloadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`DownloadClient::fetch`](super::DownloadClient::fetch).
///
/// The orchestrator treats any returned error as final for that task.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level failure talking to the backend.
    #[error("network error requesting {url}: {message}")]
    Network {
        /// The request URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The backend rate-limited the request.
    #[error("rate limited by {url}")]
    RateLimit {
        /// The request URL.
        url: String,
        /// Server-suggested wait, when provided.
        retry_after: Option<Duration>,
    },

    /// The backend reported an exhausted quota.
    #[error("search quota exhausted at {url}")]
    Quota {
        /// The request URL.
        url: String,
    },

    /// The fetch exceeded its time budget.
    #[error("timed out after {}s", .after.as_secs())]
    Timeout {
        /// The budget that was exceeded.
        after: Duration,
    },

    /// Writing an image to disk failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Any other failure.
    #[error("{message}")]
    Other {
        /// Description of the failure.
        message: String,
    },
}

impl DownloadError {
    /// Creates a network error.
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a rate-limit error.
    pub fn rate_limit(url: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimit {
            url: url.into(),
            retry_after,
        }
    }

    /// Creates a quota error.
    pub fn quota(url: impl Into<String>) -> Self {
        Self::Quota { url: url.into() }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout { after }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an uncategorized error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns the summary classification of this error.
    #[must_use]
    pub fn kind(&self) -> DownloadErrorKind {
        match self {
            Self::Network { .. } => DownloadErrorKind::Network,
            Self::RateLimit { .. } => DownloadErrorKind::RateLimit,
            Self::Quota { .. } => DownloadErrorKind::Quota,
            Self::Timeout { .. } => DownloadErrorKind::Timeout,
            Self::Io { .. } | Self::Other { .. } => DownloadErrorKind::Other,
        }
    }
}
