//! Progress UI (bar) for download runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use imageset_core::{ResultAggregator, TaskBoard};
use indicatif::{ProgressBar, ProgressStyle};

/// Spawns the progress UI when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_bar` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_bar: bool,
    board: Arc<TaskBoard>,
    aggregator: Arc<ResultAggregator>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_bar {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_bar_inner(board, aggregator, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_bar_inner(
    board: Arc<TaskBoard>,
    aggregator: Arc<ResultAggregator>,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let total = aggregator.total();
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            let progress = aggregator.progress();
            let running = board.counts().running;
            bar.set_position(progress.done as u64);
            bar.set_message(format_progress_message(running, progress.failed));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        bar.finish_and_clear();
    })
}

fn format_progress_message(running: usize, failed: usize) -> String {
    if failed == 0 {
        format!("running {running}")
    } else {
        format!("running {running}, failed {failed}")
    }
}
