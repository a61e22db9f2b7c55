//! Bounded-concurrency task execution.
//!
//! The pool dispatches tasks in builder order, one Tokio task each, with a
//! semaphore capping how many run at once. Every task ends in exactly one
//! [`TaskResult`] handed to the [`ResultAggregator`]:
//!
//! - directory setup and client errors fail only the owning task
//! - a task exceeding its configured timeout fails with a `Timeout` error
//! - after cancellation, undispatched tasks are skipped while in-flight tasks
//!   run to completion
//! - a panicking worker becomes a failed task rather than a lost result

mod board;
mod result;

pub use board::{BoardCounts, TaskBoard, TaskState, TransitionError};
pub use result::{FailureKind, SkipReason, TaskError, TaskResult, TaskStatus};

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{DownloadClient, DownloadError};
use crate::directory::DirectoryManager;
use crate::summary::ResultAggregator;
use crate::task::DownloadTask;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Error type for pool construction.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Run-wide pool behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolOptions {
    /// Skip tasks whose output directory already holds files.
    pub resume: bool,
}

/// Executes download tasks with at most `concurrency` running at once.
#[derive(Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    options: PoolOptions,
    directories: DirectoryManager,
    cancel: CancellationToken,
    board: Arc<TaskBoard>,
}

impl WorkerPool {
    /// Creates a pool with the given concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, PoolError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(PoolError::InvalidConcurrency { value: concurrency });
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            options: PoolOptions::default(),
            directories: DirectoryManager::new(),
            cancel: CancellationToken::new(),
            board: Arc::new(TaskBoard::new()),
        })
    }

    /// Replaces the pool options.
    #[must_use]
    pub fn with_options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the pool options.
    #[must_use]
    pub fn options(&self) -> PoolOptions {
        self.options
    }

    /// Returns a handle to the pool's cancellation signal.
    ///
    /// Cancelling it stops further dispatch; in-flight tasks are not interrupted.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests cancellation of the current run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns the live task board for progress reporting.
    #[must_use]
    pub fn board(&self) -> Arc<TaskBoard> {
        Arc::clone(&self.board)
    }

    /// Runs every task, recording one result per task in `aggregator`.
    ///
    /// Returns once all dispatched tasks have finished. Individual task
    /// failures never end the run early.
    #[instrument(skip_all, fields(tasks = tasks.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        tasks: Vec<DownloadTask>,
        client: Arc<dyn DownloadClient>,
        aggregator: &Arc<ResultAggregator>,
    ) {
        self.board.register(tasks.iter().map(DownloadTask::index));
        let mut handles = Vec::with_capacity(tasks.len());

        info!(client = client.name(), resume = self.options.resume, "starting run");

        for task in tasks {
            if self.cancel.is_cancelled() {
                self.settle(aggregator, TaskResult::skipped(task, SkipReason::Cancelled));
                continue;
            }

            if self.options.resume {
                let populated = self.directories.is_populated(task.output_dir()).await;
                match populated {
                    Ok(true) => {
                        debug!(task = %task.label(), "output already populated, skipping");
                        self.settle(
                            aggregator,
                            TaskResult::skipped(task, SkipReason::AlreadyPopulated),
                        );
                        continue;
                    }
                    Ok(false) => {}
                    Err(error) => {
                        warn!(task = %task.label(), error = %error, "cannot inspect output directory");
                        self.settle(aggregator, TaskResult::failed(task, error.into()));
                        continue;
                    }
                }
            }

            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                self.settle(aggregator, TaskResult::skipped(task, SkipReason::Cancelled));
                continue;
            };

            if let Err(e) = self.board.start(task.index()) {
                error!(error = %e, "task board rejected start");
            }

            let client = Arc::clone(&client);
            let aggregator_for_task = Arc::clone(aggregator);
            let board = Arc::clone(&self.board);
            let directories = self.directories;
            let owned = task.clone();

            handles.push((
                task,
                tokio::spawn(async move {
                    let _permit = permit;
                    let result = match execute(&owned, client.as_ref(), directories).await {
                        Ok(count) => {
                            info!(
                                category = owned.category(),
                                concept = owned.concept(),
                                count,
                                "task succeeded"
                            );
                            TaskResult::succeeded(owned, count)
                        }
                        Err(error) => {
                            warn!(
                                category = owned.category(),
                                concept = owned.concept(),
                                kind = %error.kind(),
                                error = %error,
                                "task failed"
                            );
                            TaskResult::failed(owned, error)
                        }
                    };
                    settle_on(&board, &aggregator_for_task, result);
                }),
            ));
        }

        debug!(in_flight = handles.len(), "waiting for workers to finish");

        for (task, handle) in handles {
            if let Err(join_error) = handle.await {
                let message = panic_message(join_error);
                error!(task = %task.label(), %message, "worker panicked");
                self.settle(
                    aggregator,
                    TaskResult::failed(task, TaskError::Panicked(message)),
                );
            }
        }

        info!(cancelled = self.cancel.is_cancelled(), "run finished");
    }

    fn settle(&self, aggregator: &ResultAggregator, result: TaskResult) {
        settle_on(&self.board, aggregator, result);
    }
}

/// Runs one task: directory setup, then the client under the task timeout.
async fn execute(
    task: &DownloadTask,
    client: &dyn DownloadClient,
    directories: DirectoryManager,
) -> Result<usize, TaskError> {
    let output_dir = directories.ensure(task.output_dir()).await?;
    let timeout = task.config().timeout;

    match tokio::time::timeout(
        timeout,
        client.fetch(task.search_terms(), task.config(), &output_dir),
    )
    .await
    {
        Ok(outcome) => Ok(outcome?),
        Err(_) => Err(DownloadError::timeout(timeout).into()),
    }
}

fn settle_on(board: &TaskBoard, aggregator: &ResultAggregator, result: TaskResult) {
    if let Err(e) = board.finish(result.task.index(), result.status) {
        error!(error = %e, "task board rejected finish");
    }
    aggregator.record(result);
}

fn panic_message(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
