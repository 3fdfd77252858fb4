//! Page download primitives: request pacing and streaming fetches.
//!
//! # Features
//!
//! - [`RateGate`] paces request *starts* process-wide (FIFO token bucket)
//! - [`PageFetcher`] streams one page body to a destination file
//! - Per-request timeout covering the whole exchange
//! - Structured error types naming the failing URL
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use archiver_core::download::{PageFetcher, PageProgress, RateGate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gate = Arc::new(RateGate::new(Duration::from_millis(1000), 1));
//! let fetcher = PageFetcher::new();
//!
//! gate.acquire().await;
//! fetcher
//!     .fetch(
//!         "https://cdn.example.com/data/abc/x1.png",
//!         Path::new("./001.png"),
//!         Duration::from_secs(5),
//!         PageProgress { current: 1, total: 1 },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
mod error;
mod fetcher;
pub mod rate_gate;

pub use constants::{DEFAULT_RATE_BURST, DEFAULT_RATE_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
pub use error::DownloadError;
pub use fetcher::{PageFetcher, PageOutcome, PageProgress};
pub use rate_gate::RateGate;
