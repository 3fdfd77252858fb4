//! Constants for the download module (timeouts, pacing).

use std::time::Duration;

/// HTTP connect timeout applied to every page request.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout for a single page (connect through last body byte).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between rate gate permits.
pub const DEFAULT_RATE_INTERVAL: Duration = Duration::from_millis(1000);

/// Default number of permits the rate gate can release back to back.
pub const DEFAULT_RATE_BURST: u32 = 1;
