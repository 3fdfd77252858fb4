//! User-Agent string for page requests.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/archiver";

/// Default User-Agent for page downloads (identifies the tool and version).
#[must_use]
pub(crate) fn default_page_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("archiver/{version} (+{PROJECT_UA_URL})")
}
