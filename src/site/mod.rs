//! Site knowledge — what the assistant knows about the website.
//!
//! Submodules:
//! - `url_index`: Known site URLs with derived keywords and a relevance search
//! - `sitemap`: Loads URL lists and sitemap files into `UrlRecord`s
//! - `extract`: Readable-text extraction from HTML pages
//! - `fetcher`: Cached page retrieval with bounded batch concurrency
//! - `errors`: Site-layer error types

pub mod errors;
pub mod extract;
pub mod fetcher;
pub mod sitemap;
pub mod url_index;

// Re-exports for convenience
pub use errors::{FetchError, SiteError};
pub use fetcher::{ContentFetcher, FetchOutcome, HttpPageSource, PageContent, PageSource};
pub use url_index::{Category, ScoredUrlRecord, UrlIndex, UrlRecord};
