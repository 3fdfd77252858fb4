//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use archiver_core::config::{ArchiveConfig, DEFAULT_TARGET_LANGUAGE, DEFAULT_WORK_URL_PREFIX};

/// File name of the reservation database when `--db` is not given.
pub const DEFAULT_DB_FILE: &str = "archiver.db";

/// Archive serialized chapters to disk.
///
/// Each WORK_JSON describes one work and its chapters. Pages are fetched
/// under a process-wide request-rate ceiling; a manifest is written for
/// every work whose chapters all downloaded.
#[derive(Parser, Debug)]
#[command(name = "archiver")]
#[command(author, version, about)]
pub struct Args {
    /// Work descriptor files
    #[arg(value_name = "WORK_JSON", required = true)]
    pub works: Vec<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory holding one subdirectory per work
    #[arg(short = 'o', long, env = "BASE_DIR", default_value = ".")]
    pub base_dir: PathBuf,

    /// Create directories and manifests without fetching page images
    #[arg(long)]
    pub no_images: bool,

    /// Per-page request timeout in seconds (1-600)
    #[arg(short = 't', long, env = "REQUEST_TIMEOUT", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: u64,

    /// Milliseconds between page request starts (0 to disable, max 60000)
    #[arg(short = 'l', long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_interval: u64,

    /// Requests allowed back to back before pacing applies (1-100)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub rate_burst: u32,

    /// Only archive chapters in this language
    #[arg(long, default_value = DEFAULT_TARGET_LANGUAGE)]
    pub language: String,

    /// Prefix joined with a work id to form its URL in manifests
    #[arg(long, default_value = DEFAULT_WORK_URL_PREFIX)]
    pub url_prefix: String,

    /// Reservation database (defaults to BASE_DIR/archiver.db)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Directory with info.template.txt / description.template.txt overrides
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Archive works again even if an earlier run completed them
    #[arg(long)]
    pub force: bool,
}

impl Args {
    /// Archive settings selected by these arguments.
    #[must_use]
    pub fn archive_config(&self) -> ArchiveConfig {
        ArchiveConfig {
            base_dir: self.base_dir.clone(),
            download_images: !self.no_images,
            request_timeout: Duration::from_secs(self.timeout),
            rate_interval: Duration::from_millis(self.rate_interval),
            rate_burst: self.rate_burst,
            target_language: self.language.clone(),
            work_url_prefix: self.url_prefix.clone(),
        }
    }

    /// Database path, explicit or under the base directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| self.base_dir.join(DEFAULT_DB_FILE))
    }
}
