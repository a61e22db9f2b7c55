//! Image search and download clients.
//!
//! The worker pool only sees the [`DownloadClient`] trait. The bundled
//! implementation, [`HttpSearchClient`], queries a JSON search endpoint once
//! per search term and streams every result image into the task directory.

mod error;
mod filename;
mod http;
mod retry;

pub use error::{DownloadError, DownloadErrorKind};
pub use http::{CONNECT_TIMEOUT, HttpSearchClient, REQUEST_TIMEOUT};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy};

use std::path::Path;

use async_trait::async_trait;

use crate::task::DownloadConfig;

/// Fetches images for one concept into a directory.
///
/// Implementations must be safe to call from many tasks at once, including
/// concurrent calls that write into the same directory.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Searches each term and writes the resulting images into `output_dir`.
    ///
    /// Returns the number of images written. Any error is final for the task;
    /// the caller does not retry.
    async fn fetch(
        &self,
        search_terms: &[String],
        config: &DownloadConfig,
        output_dir: &Path,
    ) -> Result<usize, DownloadError>;
}
