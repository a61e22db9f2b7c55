//! Live per-task state for progress reporting.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use super::TaskStatus;

/// Lifecycle of a task: `Pending -> Running -> Finished`, or
/// `Pending -> Finished(Skipped)` for tasks that never run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not dispatched yet.
    Pending,
    /// Holding a worker slot.
    Running,
    /// Terminal; never changes again.
    Finished(TaskStatus),
}

/// Rejected state change on the [`TaskBoard`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The index was never registered.
    #[error("task {index} is not on the board")]
    UnknownTask {
        /// Task index.
        index: usize,
    },

    /// The transition is not part of the lifecycle.
    #[error("task {index} cannot move from {from:?} to {to:?}")]
    Illegal {
        /// Task index.
        index: usize,
        /// Current state.
        from: TaskState,
        /// Requested state.
        to: TaskState,
    },
}

/// Aggregate counts over a board snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardCounts {
    /// Tasks not yet dispatched.
    pub pending: usize,
    /// Tasks currently running.
    pub running: usize,
    /// Tasks in a terminal state.
    pub finished: usize,
}

/// Mutex-guarded map of task index to [`TaskState`].
#[derive(Debug, Default)]
pub struct TaskBoard {
    states: Mutex<BTreeMap<usize, TaskState>>,
}

impl TaskBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<usize, TaskState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the board contents with the given indices, all pending.
    pub fn register(&self, indices: impl IntoIterator<Item = usize>) {
        let mut states = self.lock();
        states.clear();
        states.extend(indices.into_iter().map(|index| (index, TaskState::Pending)));
    }

    /// Moves a pending task to running.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the task is unknown or not pending.
    pub fn start(&self, index: usize) -> Result<(), TransitionError> {
        self.transition(index, TaskState::Running)
    }

    /// Moves a task to its terminal state.
    ///
    /// Only skipped tasks may finish straight from pending; executed tasks
    /// must have been started.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the task is unknown, already finished,
    /// or the move skips the running state.
    pub fn finish(&self, index: usize, status: TaskStatus) -> Result<(), TransitionError> {
        self.transition(index, TaskState::Finished(status))
    }

    fn transition(&self, index: usize, to: TaskState) -> Result<(), TransitionError> {
        let mut states = self.lock();
        let Some(state) = states.get_mut(&index) else {
            return Err(TransitionError::UnknownTask { index });
        };

        let allowed = matches!(
            (*state, to),
            (TaskState::Pending, TaskState::Running)
                | (TaskState::Running, TaskState::Finished(_))
                | (
                    TaskState::Pending,
                    TaskState::Finished(TaskStatus::Skipped(_) | TaskStatus::Failed)
                )
        );
        if !allowed {
            return Err(TransitionError::Illegal {
                index,
                from: *state,
                to,
            });
        }
        *state = to;
        Ok(())
    }

    /// Returns the state of one task.
    #[must_use]
    pub fn state(&self, index: usize) -> Option<TaskState> {
        self.lock().get(&index).copied()
    }

    /// Returns every task's state, ordered by index.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(usize, TaskState)> {
        self.lock().iter().map(|(i, s)| (*i, *s)).collect()
    }

    /// Returns pending/running/finished counts.
    #[must_use]
    pub fn counts(&self) -> BoardCounts {
        self.lock()
            .values()
            .fold(BoardCounts::default(), |mut counts, state| {
                match state {
                    TaskState::Pending => counts.pending += 1,
                    TaskState::Running => counts.running += 1,
                    TaskState::Finished(_) => counts.finished += 1,
                }
                counts
            })
    }
}
