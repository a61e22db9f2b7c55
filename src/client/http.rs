//! HTTP-backed search client.
//!
//! One `GET <endpoint>?q=&count=&format=&size=` per search term, then one
//! streaming `GET` per result URL. Search requests are retried according to a
//! [`RetryPolicy`]; image requests are not, a failed image is skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::filename::{
    PartialFile, UniqueFileAllocator, extension_from_content_type, extension_matches_format,
};
use super::retry::{RetryDecision, RetryPolicy};
use super::{DownloadClient, DownloadError};
use crate::task::DownloadConfig;

/// TCP connect timeout for every request.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout for a single search or image request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

fn user_agent() -> String {
    format!("imageset/{}", env!("CARGO_PKG_VERSION"))
}

/// Search response body: either `{"results": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped { results: Vec<SearchHit> },
    Bare(Vec<SearchHit>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchHit {
    Url(String),
    Object { url: String },
}

impl SearchResponse {
    fn into_urls(self) -> Vec<String> {
        let hits = match self {
            Self::Wrapped { results } => results,
            Self::Bare(hits) => hits,
        };
        hits.into_iter()
            .map(|hit| match hit {
                SearchHit::Url(url) | SearchHit::Object { url } => url,
            })
            .collect()
    }
}

/// [`DownloadClient`] that talks to a JSON image search endpoint.
///
/// Create once and share; the inner `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: Client,
    endpoint: Url,
    retry_policy: RetryPolicy,
    request_timeout: Duration,
}

impl HttpSearchClient {
    /// Creates a client for `endpoint` with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Other`] when the endpoint is not an http(s)
    /// URL or the HTTP client cannot be built.
    pub fn new(endpoint: &str) -> Result<Self, DownloadError> {
        Self::with_timeouts(endpoint, CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    /// Creates a client with explicit connect and per-request timeouts.
    ///
    /// # Errors
    ///
    /// Same as [`HttpSearchClient::new`].
    pub fn with_timeouts(
        endpoint: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            DownloadError::other(format!("invalid search endpoint '{endpoint}': {e}"))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(DownloadError::other(format!(
                "search endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .gzip(true)
            .user_agent(user_agent())
            .build()
            .map_err(|e| DownloadError::other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            retry_policy: RetryPolicy::default(),
            request_timeout,
        })
    }

    /// Replaces the retry policy used for search requests.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the configured search endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn search_url(&self, term: &str, config: &DownloadConfig) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", term)
            .append_pair("count", &config.max_images.to_string())
            .append_pair("format", config.image_format.as_str())
            .append_pair("size", config.size_class.as_str());
        url
    }

    /// Runs one search, retrying transient failures.
    #[instrument(level = "debug", skip(self, config))]
    async fn search(&self, term: &str, config: &DownloadConfig) -> Result<Vec<String>, DownloadError> {
        let url = self.search_url(term, config);
        let mut attempt = 1;
        loop {
            let error = match self.search_once(&url).await {
                Ok(urls) => return Ok(urls),
                Err(error) => error,
            };
            match self.retry_policy.should_retry(&error, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        term,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "search failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(term, %reason, "giving up on search");
                    return Err(error);
                }
            }
        }
    }

    async fn search_once(&self, url: &Url) -> Result<Vec<String>, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.request_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(url.as_str(), status, retry_after(&response)));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(self.request_timeout)
            } else {
                DownloadError::other(format!("invalid search response from {url}: {e}"))
            }
        })?;
        Ok(body.into_urls())
    }

    /// Downloads one image. `Ok(None)` means the response was skipped.
    async fn fetch_image(
        &self,
        url: &Url,
        config: &DownloadConfig,
        allocator: &mut UniqueFileAllocator,
    ) -> Result<Option<PathBuf>, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.request_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(url.as_str(), status, None));
        }

        let Some(extension) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(extension_from_content_type)
        else {
            debug!(url = %url, "response is not an image, skipping");
            return Ok(None);
        };
        if !extension_matches_format(extension, config.image_format) {
            debug!(url = %url, extension, wanted = %config.image_format, "format mismatch, skipping");
            return Ok(None);
        }

        let (path, file) = allocator
            .create(extension)
            .await
            .map_err(|e| DownloadError::io(allocator.dir(), e))?;
        let partial = PartialFile::new(path.clone());

        let bytes = stream_to_file(file, response, url.as_str(), &path).await?;
        if bytes == 0 {
            debug!(url = %url, "empty image body, skipping");
            return Ok(None);
        }
        Ok(Some(partial.keep()))
    }

    fn request_error(&self, url: &Url, error: &reqwest::Error) -> DownloadError {
        if error.is_timeout() {
            DownloadError::timeout(self.request_timeout)
        } else {
            DownloadError::network(url.as_str(), error.to_string())
        }
    }
}

#[async_trait]
impl DownloadClient for HttpSearchClient {
    fn name(&self) -> &str {
        "http-search"
    }

    #[instrument(skip(self, search_terms, config), fields(dir = %output_dir.display()))]
    async fn fetch(
        &self,
        search_terms: &[String],
        config: &DownloadConfig,
        output_dir: &Path,
    ) -> Result<usize, DownloadError> {
        let stem = output_dir
            .file_name()
            .map_or_else(|| "image".into(), |name| name.to_string_lossy());
        let mut allocator = UniqueFileAllocator::new(output_dir, &stem);
        let limit = usize::try_from(config.max_images).unwrap_or(usize::MAX);

        let mut seen: HashSet<Url> = HashSet::new();
        let mut downloaded = 0_usize;
        let mut searched = false;
        let mut last_error = None;

        for term in search_terms {
            let urls = match self.search(term, config).await {
                Ok(urls) => urls,
                Err(error) => {
                    warn!(term = %term, error = %error, "search failed");
                    let quota = matches!(error, DownloadError::Quota { .. });
                    last_error = Some(error);
                    if quota {
                        break;
                    }
                    continue;
                }
            };
            searched = true;

            let mut written_for_term = 0_usize;
            for raw in urls {
                if written_for_term >= limit {
                    break;
                }
                let Ok(url) = Url::parse(&raw) else {
                    debug!(url = %raw, "unparseable result url, skipping");
                    continue;
                };
                if !seen.insert(url.clone()) {
                    continue;
                }
                match self.fetch_image(&url, config, &mut allocator).await {
                    Ok(Some(path)) => {
                        debug!(path = %path.display(), "image saved");
                        written_for_term += 1;
                    }
                    Ok(None) => {}
                    Err(error @ DownloadError::Io { .. }) => return Err(error),
                    Err(error) => warn!(url = %url, error = %error, "image download failed"),
                }
            }
            downloaded += written_for_term;
        }

        match last_error {
            Some(error) if !searched => Err(error),
            _ => {
                info!(count = downloaded, "fetch complete");
                Ok(downloaded)
            }
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn status_error(url: &str, status: StatusCode, retry_after: Option<Duration>) -> DownloadError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => DownloadError::rate_limit(url, retry_after),
        StatusCode::PAYMENT_REQUIRED => DownloadError::quota(url),
        s if s.is_server_error() => DownloadError::network(url, format!("HTTP {}", s.as_u16())),
        s => DownloadError::other(format!("request to {url} returned HTTP {}", s.as_u16())),
    }
}

async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::network(url, e.to_string()))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| DownloadError::io(path, e))?;
    Ok(bytes_written)
}
