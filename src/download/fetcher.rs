//! Single-page fetcher streaming response bodies straight to disk.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::DownloadError;
use crate::user_agent;

/// Position of a page inside its chapter, used for progress lines only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    /// 1-based page index.
    pub current: usize,
    /// Number of pages in the chapter.
    pub total: usize,
}

/// Result of a page task that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// The body was streamed to the destination file.
    Written {
        /// Bytes written to disk.
        bytes: u64,
    },
    /// The destination already existed (or image downloads are off); no request was made.
    Skipped,
}

/// HTTP page fetcher.
///
/// Created once per run and cloned into page tasks; clones share the
/// underlying connection pool.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::time::Duration;
/// use archiver_core::download::{PageFetcher, PageProgress};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = PageFetcher::new();
/// let outcome = fetcher
///     .fetch(
///         "https://cdn.example.com/data/abc/x1.png",
///         Path::new("./001.png"),
///         Duration::from_secs(5),
///         PageProgress { current: 1, total: 20 },
///     )
///     .await?;
/// println!("{outcome:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl Default for PageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PageFetcher {
    /// Creates a fetcher with the project User-Agent.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_user_agent(&user_agent::default_page_user_agent())
    }

    /// Creates a fetcher sending the given User-Agent.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_user_agent(user_agent: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(user_agent)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Downloads one page to `destination`.
    ///
    /// The caller checks that `destination` does not exist yet; this method
    /// creates (or truncates) it unconditionally. `timeout` bounds the whole
    /// exchange, from connecting until the last body byte. `Written` is only
    /// returned after the body stream has ended and the file is flushed.
    ///
    /// A failure after the file was created leaves the partial file on disk.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails or times out
    /// - The server returns a non-success status
    /// - Writing to disk fails
    #[instrument(skip(self, timeout, progress), fields(url = %url, dest = %destination.display()))]
    pub async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        timeout: Duration,
        progress: PageProgress,
    ) -> Result<PageOutcome, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "page request rejected");
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        info!("DL ({}/{}) {url}", progress.current, progress.total);

        let file = File::create(destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        let bytes = stream_to_file(file, response, url, destination).await?;

        debug!(bytes, "page written");
        Ok(PageOutcome::Written { bytes })
    }
}

/// Streams a response body to `file`, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
