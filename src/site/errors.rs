//! Site-layer error types.

use thiserror::Error;

/// Errors raised while retrieving a single page.
///
/// Every variant carries the URL so per-URL failures can be reported back
/// to the model without losing which page failed.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request could not be sent or the connection dropped.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The page did not respond within the fetch timeout.
    #[error("request to {url} timed out after {duration_secs}s")]
    Timeout { url: String, duration_secs: u64 },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// The body could not be read as text.
    #[error("unreadable body from {url}: {reason}")]
    Unreadable { url: String, reason: String },
}

impl FetchError {
    /// The URL that failed.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::HttpStatus { url, .. }
            | FetchError::Unreadable { url, .. } => url,
        }
    }
}

/// Errors raised while loading the URL list at startup.
#[derive(Debug, Error)]
pub enum SiteError {
    /// A URL list file could not be read.
    #[error("failed to read URL list {path}: {reason}")]
    ListUnreadable { path: String, reason: String },

    /// A sitemap file is not well-formed XML.
    #[error("malformed sitemap {path}: {reason}")]
    MalformedSitemap { path: String, reason: String },

    /// None of the configured lists produced a usable URL.
    #[error("no URLs loaded from {} list file(s)", files)]
    NoUrls { files: usize },
}
