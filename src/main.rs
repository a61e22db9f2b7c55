//! CLI entry point for the imageset tool.

use std::process::ExitCode;

mod app;
mod cli;
mod output;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every task succeeded or was skipped by resume.
    Success,
    /// The run finished but some tasks failed or were cancelled.
    Failure,
    /// The run could not start or its results are inconsistent.
    Fatal,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => Self::SUCCESS,
            ProcessExit::Failure => Self::from(1),
            ProcessExit::Fatal => Self::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run_imageset().await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("error: {error:#}");
            ProcessExit::Fatal.into()
        }
    }
}
