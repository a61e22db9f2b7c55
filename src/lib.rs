//! Imageset Core Library
//!
//! This library builds labeled image datasets by walking a two-level
//! taxonomy (category, concept, search terms) and fetching images for every
//! concept into its own directory under bounded concurrency.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`taxonomy`] - Taxonomy parsing and validation
//! - [`task`] - Download configuration and taxonomy flattening into tasks
//! - [`directory`] - Idempotent output directory management
//! - [`client`] - The download client contract and its HTTP implementation
//! - [`pool`] - Bounded worker pool with failure isolation and cancellation
//! - [`summary`] - Thread-safe result aggregation and the run summary

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod directory;
pub mod pool;
pub mod summary;
pub mod task;
pub mod taxonomy;

// Re-export commonly used types
pub use client::{
    DownloadClient, DownloadError, DownloadErrorKind, HttpSearchClient, RetryDecision, RetryPolicy,
};
pub use directory::{DirectoryManager, FilesystemError};
pub use pool::{
    DEFAULT_CONCURRENCY, FailureKind, PoolError, PoolOptions, SkipReason, TaskBoard, TaskError,
    TaskResult, TaskState, TaskStatus, WorkerPool,
};
pub use summary::{AggregatorError, FailureRecord, ResultAggregator, RunSummary};
pub use task::{ConfigOverride, DownloadConfig, DownloadTask, ImageFormat, SizeClass, TaskBuilder};
pub use taxonomy::{Taxonomy, TaxonomyError, TaxonomyLoader, ValidationError};
