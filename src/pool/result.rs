//! Per-task outcomes produced by the worker pool.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::client::{DownloadError, DownloadErrorKind};
use crate::directory::FilesystemError;
use crate::task::DownloadTask;

/// Why a task was skipped instead of executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Resume mode found files already present in the output directory.
    AlreadyPopulated,
    /// The run was cancelled before the task was dispatched.
    Cancelled,
}

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// The client returned a count.
    Succeeded,
    /// Directory setup or the client failed.
    Failed,
    /// The task never ran.
    Skipped(SkipReason),
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed => f.write_str("failed"),
            Self::Skipped(SkipReason::AlreadyPopulated) => f.write_str("skipped (already populated)"),
            Self::Skipped(SkipReason::Cancelled) => f.write_str("skipped (cancelled)"),
        }
    }
}

/// Classification of a task failure, as reported in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The output directory could not be created or inspected.
    Filesystem,
    /// Network failure talking to the backend.
    Network,
    /// The backend rate-limited us.
    RateLimit,
    /// The backend quota is exhausted.
    Quota,
    /// The task exceeded its timeout.
    Timeout,
    /// Any other download failure.
    Other,
    /// The worker running the task panicked.
    Panicked,
}

impl FailureKind {
    /// Returns the stable snake_case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::Quota => "quota",
            Self::Timeout => "timeout",
            Self::Other => "other",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DownloadErrorKind> for FailureKind {
    fn from(kind: DownloadErrorKind) -> Self {
        match kind {
            DownloadErrorKind::Network => Self::Network,
            DownloadErrorKind::RateLimit => Self::RateLimit,
            DownloadErrorKind::Quota => Self::Quota,
            DownloadErrorKind::Timeout => Self::Timeout,
            DownloadErrorKind::Other => Self::Other,
        }
    }
}

/// Error detail attached to a failed task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Preparing or inspecting the output directory failed.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// The download client failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The worker panicked; the payload message is kept when available.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Returns the summary classification.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Filesystem(_) => FailureKind::Filesystem,
            Self::Download(error) => error.kind().into(),
            Self::Panicked(_) => FailureKind::Panicked,
        }
    }
}

/// Outcome of one task, produced exactly once by the pool.
#[derive(Debug)]
pub struct TaskResult {
    /// The task this result belongs to.
    pub task: DownloadTask,
    /// Terminal status.
    pub status: TaskStatus,
    /// Images written by the client (zero unless succeeded).
    pub downloaded_count: usize,
    /// Present exactly when `status` is [`TaskStatus::Failed`].
    pub error: Option<TaskError>,
}

impl TaskResult {
    /// A successful fetch.
    #[must_use]
    pub fn succeeded(task: DownloadTask, downloaded_count: usize) -> Self {
        Self {
            task,
            status: TaskStatus::Succeeded,
            downloaded_count,
            error: None,
        }
    }

    /// A failed task.
    #[must_use]
    pub fn failed(task: DownloadTask, error: TaskError) -> Self {
        Self {
            task,
            status: TaskStatus::Failed,
            downloaded_count: 0,
            error: Some(error),
        }
    }

    /// A task that never ran.
    #[must_use]
    pub fn skipped(task: DownloadTask, reason: SkipReason) -> Self {
        Self {
            task,
            status: TaskStatus::Skipped(reason),
            downloaded_count: 0,
            error: None,
        }
    }
}
