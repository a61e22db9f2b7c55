//! Result aggregation and the final run summary.
//!
//! Workers report in arbitrary order; the aggregator keeps running counts
//! behind a mutex and checks at finalize time that every task was accounted
//! for exactly once.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::pool::{FailureKind, SkipReason, TaskResult, TaskStatus};

/// Internal consistency violations detected by [`ResultAggregator::finalize`].
///
/// These indicate a lost or duplicated result, never a task-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    /// The same task reported more than once.
    #[error("task {index} ({label}) reported {count} results")]
    DuplicateResult {
        /// Task index.
        index: usize,
        /// `category/concept` of the task.
        label: String,
        /// How many results arrived.
        count: usize,
    },

    /// Counts do not add up to the number of tasks.
    #[error(
        "result count mismatch: succeeded {succeeded} + failed {failed} + skipped {skipped} != total {total}"
    )]
    CountMismatch {
        /// Expected task count.
        total: usize,
        /// Succeeded results.
        succeeded: usize,
        /// Failed results.
        failed: usize,
        /// Skipped results.
        skipped: usize,
    },
}

/// One failed task in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Owning category.
    pub category: String,
    /// Concept name.
    pub concept: String,
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable error.
    pub message: String,
}

/// Immutable outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Number of tasks in the run.
    pub total: usize,
    /// Tasks whose fetch succeeded.
    pub succeeded: usize,
    /// Tasks that failed.
    pub failed: usize,
    /// Tasks that never ran, for either reason.
    pub skipped: usize,
    /// The subset of `skipped` caused by cancellation.
    pub cancelled: usize,
    /// Images written across all succeeded tasks.
    pub downloaded: usize,
    /// Failed tasks in dispatch order.
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    /// True when no task failed and none was cut off by cancellation.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

#[derive(Debug, Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
    skipped: usize,
    cancelled: usize,
    downloaded: usize,
    failures: Vec<(usize, FailureRecord)>,
    seen: HashSet<usize>,
    duplicates: Vec<(usize, String)>,
}

/// Progress counts for display while the run is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Results recorded so far.
    pub done: usize,
    /// Expected total.
    pub total: usize,
    /// Succeeded so far.
    pub succeeded: usize,
    /// Failed so far.
    pub failed: usize,
    /// Skipped so far.
    pub skipped: usize,
}

/// Thread-safe collector of [`TaskResult`]s.
#[derive(Debug)]
pub struct ResultAggregator {
    total: usize,
    tally: Mutex<Tally>,
}

impl ResultAggregator {
    /// Creates an aggregator expecting `total` results.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            tally: Mutex::new(Tally::default()),
        }
    }

    /// Expected number of results.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    fn lock(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records one task outcome. Safe to call from any worker.
    pub fn record(&self, result: TaskResult) {
        let index = result.task.index();
        let mut tally = self.lock();

        if !tally.seen.insert(index) {
            error!(index, task = %result.task.label(), "duplicate result recorded");
            tally.duplicates.push((index, result.task.label()));
        }

        match result.status {
            TaskStatus::Succeeded => {
                tally.succeeded += 1;
                tally.downloaded += result.downloaded_count;
            }
            TaskStatus::Failed => {
                tally.failed += 1;
                let (kind, message) = result.error.as_ref().map_or_else(
                    || (FailureKind::Other, "unknown error".to_string()),
                    |e| (e.kind(), e.to_string()),
                );
                tally.failures.push((
                    index,
                    FailureRecord {
                        category: result.task.category().to_string(),
                        concept: result.task.concept().to_string(),
                        kind,
                        message,
                    },
                ));
            }
            TaskStatus::Skipped(reason) => {
                tally.skipped += 1;
                if reason == SkipReason::Cancelled {
                    tally.cancelled += 1;
                }
            }
        }
        debug!(index, status = %result.status, "result recorded");
    }

    /// Current counts, for progress display.
    #[must_use]
    pub fn progress(&self) -> Progress {
        let tally = self.lock();
        Progress {
            done: tally.succeeded + tally.failed + tally.skipped,
            total: self.total,
            succeeded: tally.succeeded,
            failed: tally.failed,
            skipped: tally.skipped,
        }
    }

    /// Produces the run summary after checking every task reported once.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::DuplicateResult`] if any task reported twice
    /// and [`AggregatorError::CountMismatch`] if the counts do not add up to
    /// the expected total.
    pub fn finalize(&self) -> Result<RunSummary, AggregatorError> {
        let tally = self.lock();

        if let Some((index, label)) = tally.duplicates.first() {
            let count = 1 + tally.duplicates.iter().filter(|(i, _)| i == index).count();
            return Err(AggregatorError::DuplicateResult {
                index: *index,
                label: label.clone(),
                count,
            });
        }

        if tally.succeeded + tally.failed + tally.skipped != self.total {
            return Err(AggregatorError::CountMismatch {
                total: self.total,
                succeeded: tally.succeeded,
                failed: tally.failed,
                skipped: tally.skipped,
            });
        }

        let mut failures = tally.failures.clone();
        failures.sort_by_key(|(index, _)| *index);

        Ok(RunSummary {
            total: self.total,
            succeeded: tally.succeeded,
            failed: tally.failed,
            skipped: tally.skipped,
            cancelled: tally.cancelled,
            downloaded: tally.downloaded,
            failures: failures.into_iter().map(|(_, record)| record).collect(),
        })
    }
}
