//! Run-wide archive settings.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::download::{
    DEFAULT_RATE_BURST, DEFAULT_RATE_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
};

/// Language code of chapters archived when none is configured.
pub const DEFAULT_TARGET_LANGUAGE: &str = "gb";

/// Prefix joined with a work id to form its public URL.
pub const DEFAULT_WORK_URL_PREFIX: &str = "https://mangadex.org/manga/";

/// Longest accepted per-page timeout.
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
/// Longest accepted gate interval.
const MAX_RATE_INTERVAL: Duration = Duration::from_secs(60);
const MAX_RATE_BURST: u32 = 100;

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("request timeout must be between 1ms and {}s, got {got:?}", MAX_REQUEST_TIMEOUT.as_secs())]
    RequestTimeout { got: Duration },

    #[error("rate interval must be at most {}s, got {got:?}", MAX_RATE_INTERVAL.as_secs())]
    RateInterval { got: Duration },

    #[error("rate burst must be between 1 and {MAX_RATE_BURST}, got {got}")]
    RateBurst { got: u32 },

    #[error("target language must not be empty")]
    EmptyLanguage,

    #[error("base directory must not be empty")]
    EmptyBaseDir,
}

/// Settings shared by every work archived in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Directory that holds one subdirectory per work.
    pub base_dir: PathBuf,
    /// When false, directories and manifests are produced but no page is fetched.
    pub download_images: bool,
    /// Bound on a single page request, body included.
    pub request_timeout: Duration,
    /// Time between rate gate permits. Zero disables pacing.
    pub rate_interval: Duration,
    pub rate_burst: u32,
    /// Only chapters in this language are archived.
    pub target_language: String,
    pub work_url_prefix: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            download_images: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rate_interval: DEFAULT_RATE_INTERVAL,
            rate_burst: DEFAULT_RATE_BURST,
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            work_url_prefix: DEFAULT_WORK_URL_PREFIX.to_string(),
        }
    }
}

impl ArchiveConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyBaseDir);
        }
        if self.request_timeout.is_zero() || self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(ConfigError::RequestTimeout {
                got: self.request_timeout,
            });
        }
        if self.rate_interval > MAX_RATE_INTERVAL {
            return Err(ConfigError::RateInterval {
                got: self.rate_interval,
            });
        }
        if !(1..=MAX_RATE_BURST).contains(&self.rate_burst) {
            return Err(ConfigError::RateBurst {
                got: self.rate_burst,
            });
        }
        if self.target_language.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }
        Ok(())
    }

    /// Public URL of a work.
    #[must_use]
    pub fn work_url(&self, work_id: u64) -> String {
        format!("{}{work_id}", self.work_url_prefix)
    }
}
