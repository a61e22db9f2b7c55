//! CLI output formatting and display helpers.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use imageset_core::{DownloadTask, FailureKind, RunSummary};

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    if width == 1 {
        return "…".to_string();
    }

    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FailureDescriptor {
    pub(crate) what: &'static str,
    pub(crate) fix: &'static str,
}

pub(crate) fn failure_descriptor(kind: FailureKind) -> FailureDescriptor {
    match kind {
        FailureKind::Filesystem => FailureDescriptor {
            what: "Output directory could not be created or written",
            fix: "Check permissions and free space under the output root.",
        },
        FailureKind::Network => FailureDescriptor {
            what: "Search or image requests failed in transport",
            fix: "Check connectivity and the search endpoint, then rerun with --resume.",
        },
        FailureKind::RateLimit => FailureDescriptor {
            what: "The search service kept rate limiting requests",
            fix: "Lower --concurrency and rerun with --resume.",
        },
        FailureKind::Quota => FailureDescriptor {
            what: "The search service quota is exhausted",
            fix: "Wait for the quota to reset, then rerun with --resume.",
        },
        FailureKind::Timeout => FailureDescriptor {
            what: "Tasks exceeded the per-task time limit",
            fix: "Raise --timeout-secs or lower --max-images.",
        },
        FailureKind::Panicked => FailureDescriptor {
            what: "A worker stopped unexpectedly",
            fix: "Rerun with -vv and report the log.",
        },
        FailureKind::Other => FailureDescriptor {
            what: "Unclassified failure",
            fix: "Inspect the log for details and rerun with --resume.",
        },
    }
}

/// Lines printed for `--dry-run`: the task count, plus one line per task when verbose.
pub(crate) fn dry_run_lines(tasks: &[DownloadTask], verbose: bool, width: usize) -> Vec<String> {
    let mut lines = vec![format!("{} tasks", tasks.len())];
    if verbose {
        for task in tasks {
            let line = format!(
                "{}/{}: {} (max {} per term)",
                task.category(),
                task.concept(),
                task.search_terms().join(", "),
                task.config().max_images
            );
            lines.push(truncate_to_width(&line, width));
        }
    }
    lines
}

pub(crate) fn print_dry_run(tasks: &[DownloadTask], verbose: bool) {
    for line in dry_run_lines(tasks, verbose, terminal_width()) {
        println!("{line}");
    }
}

pub(crate) fn render_summary_lines(summary: &RunSummary, root: &Path, width: usize) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Summary: {} tasks, {} succeeded, {} failed, {} skipped",
            summary.total, summary.succeeded, summary.failed, summary.skipped
        ),
        truncate_to_width(
            &format!("{} images written under {}", summary.downloaded, root.display()),
            width,
        ),
    ];
    if summary.cancelled > 0 {
        lines.push(format!(
            "Interrupted: {} tasks were not started",
            summary.cancelled
        ));
    }
    lines.extend(render_failure_summary_lines(summary, width));
    lines
}

pub(crate) fn render_failure_summary_lines(summary: &RunSummary, width: usize) -> Vec<String> {
    if summary.failures.is_empty() {
        return Vec::new();
    }

    let mut grouped: BTreeMap<&'static str, (FailureKind, usize)> = BTreeMap::new();
    for failure in &summary.failures {
        grouped
            .entry(failure.kind.as_str())
            .and_modify(|(_, count)| *count += 1)
            .or_insert((failure.kind, 1));
    }

    let mut lines = vec![truncate_to_width("Failures by kind:", width)];
    for (label, (kind, count)) in &grouped {
        let descriptor = failure_descriptor(*kind);
        lines.push(truncate_to_width(&format!("- {label}: {count}"), width));
        lines.push(truncate_to_width(&format!("  What: {}", descriptor.what), width));
        lines.push(truncate_to_width(&format!("  Fix: {}", descriptor.fix), width));
    }
    lines.push(truncate_to_width("Failed concepts:", width));
    for failure in &summary.failures {
        let line = format!(
            "  {}/{} [{}] {}",
            failure.category, failure.concept, failure.kind, failure.message
        );
        lines.push(truncate_to_width(&line, width));
    }
    lines
}

pub(crate) fn print_run_summary(summary: &RunSummary, root: &Path) {
    for line in render_summary_lines(summary, root, terminal_width()) {
        println!("{line}");
    }
}

/// Writes the summary as pretty-printed JSON, creating parent directories.
pub(crate) fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(summary).context("serializing run summary")?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use imageset_core::taxonomy::TaxonomyDefinition;
    use imageset_core::{DownloadConfig, FailureRecord, TaskBuilder, TaxonomyLoader};

    use super::*;

    fn summary_with_failures() -> RunSummary {
        RunSummary {
            total: 4,
            succeeded: 1,
            failed: 2,
            skipped: 1,
            cancelled: 0,
            downloaded: 7,
            failures: vec![
                FailureRecord {
                    category: "shot_type".to_string(),
                    concept: "closeup".to_string(),
                    kind: FailureKind::Timeout,
                    message: "timed out after 600s".to_string(),
                },
                FailureRecord {
                    category: "color".to_string(),
                    concept: "red".to_string(),
                    kind: FailureKind::Timeout,
                    message: "timed out after 600s".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_terminal_width_returns_sensible_value() {
        let w = terminal_width();
        assert!(w >= 20, "terminal_width should be at least 20, got {w}");
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("hello", 10), "hello");
        assert_eq!(truncate_to_width("hello world", 6), "hello…");
        assert_eq!(truncate_to_width("hello", 1), "…");
        assert_eq!(truncate_to_width("hello", 0), "");
    }

    #[test]
    fn test_dry_run_lines_count_then_tasks_when_verbose() {
        let taxonomy = TaxonomyLoader::load(
            TaxonomyDefinition::new().with_category("C", [("c1", vec!["a", "b"]), ("c2", vec!["x"])]),
        )
        .unwrap();
        let tasks = TaskBuilder::new("/out", DownloadConfig::default()).build(&taxonomy);

        assert_eq!(dry_run_lines(&tasks, false, 80), vec!["2 tasks".to_string()]);

        let verbose = dry_run_lines(&tasks, true, 80);
        assert_eq!(verbose.len(), 3);
        assert_eq!(verbose[1], "C/c1: a, b (max 300 per term)");
    }

    #[test]
    fn test_summary_lines_group_failures_by_kind() {
        let lines = render_summary_lines(&summary_with_failures(), &PathBuf::from("out"), 200);
        assert_eq!(lines[0], "Summary: 4 tasks, 1 succeeded, 2 failed, 1 skipped");
        assert!(lines.iter().any(|line| line == "- timeout: 2"));
        assert!(lines.iter().any(|line| line.contains("shot_type/closeup [timeout]")));
        assert!(!lines.iter().any(|line| line.starts_with("Interrupted")));
    }

    #[test]
    fn test_summary_lines_report_cancellation() {
        let mut summary = summary_with_failures();
        summary.cancelled = 1;
        let lines = render_summary_lines(&summary, &PathBuf::from("out"), 200);
        assert!(lines.contains(&"Interrupted: 1 tasks were not started".to_string()));
    }

    #[test]
    fn test_write_summary_json_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("summary.json");
        write_summary_json(&path, &summary_with_failures()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["failed"], 2);
        assert_eq!(value["failures"][0]["kind"], "timeout");
    }
}
