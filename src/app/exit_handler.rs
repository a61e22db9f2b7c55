//! Exit code logic for the imageset process.
//!
//! Single responsibility: map a finished run's summary to the process exit outcome.

use imageset_core::RunSummary;

use crate::ProcessExit;

/// Success when every task succeeded or was skipped by resume; failure when
/// any task failed or was cut off by cancellation.
pub(crate) fn determine_exit_outcome(summary: &RunSummary) -> ProcessExit {
    if summary.is_complete_success() {
        ProcessExit::Success
    } else {
        ProcessExit::Failure
    }
}

#[cfg(test)]
mod tests {
    use imageset_core::RunSummary;

    use super::determine_exit_outcome;
    use crate::ProcessExit;

    fn summary(succeeded: usize, failed: usize, skipped: usize, cancelled: usize) -> RunSummary {
        RunSummary {
            total: succeeded + failed + skipped,
            succeeded,
            failed,
            skipped,
            cancelled,
            downloaded: 0,
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(&summary(3, 0, 0, 0)), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_success_when_only_resume_skips() {
        assert_eq!(determine_exit_outcome(&summary(1, 0, 2, 0)), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_failure_when_any_failed() {
        assert_eq!(determine_exit_outcome(&summary(2, 1, 0, 0)), ProcessExit::Failure);
    }

    #[test]
    fn test_exit_outcome_failure_when_cancelled() {
        assert_eq!(determine_exit_outcome(&summary(1, 0, 2, 2)), ProcessExit::Failure);
    }
}
