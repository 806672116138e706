//! Cached page retrieval.
//!
//! `ContentFetcher` turns a URL into a `PageContent`:
//! 1. Cache hit → return the stored page, no network call.
//! 2. Otherwise GET the page through a `PageSource`, extract readable text,
//!    store it, return it.
//!
//! Failures are never cached. `fetch_many` processes URLs in fixed-size
//! batches: each batch runs concurrently and completes before the next one
//! starts, and output order always matches input order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use super::errors::FetchError;
use super::extract::extract_page;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Browser-like User-Agent; some sites serve bots an empty shell.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Per-page request timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Response bytes read per page; the rest of the body is discarded.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Default batch size for `fetch_many`.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Default number of pages kept in the cache.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;

// ─── Types ───────────────────────────────────────────────────────────────────

/// Extracted content of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub fetched_at: DateTime<Utc>,
}

/// Result for one URL in a `fetch_many` batch.
///
/// Serialized untagged: a page object, or `{url, error}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FetchOutcome {
    Page(PageContent),
    Failed { url: String, error: String },
}

impl FetchOutcome {
    pub fn url(&self) -> &str {
        match self {
            FetchOutcome::Page(page) => &page.url,
            FetchOutcome::Failed { url, .. } => url,
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, FetchOutcome::Page(_))
    }
}

// ─── PageSource ──────────────────────────────────────────────────────────────

/// Where raw HTML comes from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Return the response body for `url`.
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// `PageSource` backed by a real HTTP client.
pub struct HttpPageSource {
    http: HttpClient,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpPageSource {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            timeout,
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    /// Cap on response bytes read per page.
    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let mut resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                        duration_secs: self.timeout.as_secs(),
                    }
                } else {
                    FetchError::Request {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    duration_secs: self.timeout.as_secs(),
                }
            } else {
                FetchError::Unreadable {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })? {
            let room = self.max_body_bytes - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                tracing::debug!(url = %url, limit = self.max_body_bytes, "page body truncated");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

// ─── PageCache ───────────────────────────────────────────────────────────────

/// URL-keyed page store with insertion-order eviction. No TTL.
struct PageCache {
    entries: HashMap<String, PageContent>,
    order: VecDeque<String>,
    max_entries: usize,
}

impl PageCache {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    fn get(&self, url: &str) -> Option<PageContent> {
        self.entries.get(url).cloned()
    }

    fn insert(&mut self, page: PageContent) {
        let url = page.url.clone();
        if self.entries.insert(url.clone(), page).is_some() {
            // Overwrite in place; keep the original insertion slot.
            return;
        }
        self.order.push_back(url);
        while self.entries.len() > self.max_entries {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            tracing::debug!(url = %oldest, "evicted cached page");
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ─── ContentFetcher ──────────────────────────────────────────────────────────

/// Fetches pages through a `PageSource` and caches the extracted content.
pub struct ContentFetcher {
    source: Arc<dyn PageSource>,
    cache: Mutex<PageCache>,
}

impl ContentFetcher {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self::with_cache_limit(source, DEFAULT_CACHE_MAX_ENTRIES)
    }

    pub fn with_cache_limit(source: Arc<dyn PageSource>, max_entries: usize) -> Self {
        Self {
            source,
            cache: Mutex::new(PageCache::new(max_entries)),
        }
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Fetch and extract one page, serving repeats from the cache.
    pub async fn fetch_one(&self, url: &str) -> Result<PageContent, FetchError> {
        if let Some(page) = self.cached(url) {
            tracing::debug!(url = %url, "page cache hit");
            return Ok(page);
        }

        let start = std::time::Instant::now();
        let html = match self.source.get(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "page fetch failed");
                return Err(e);
            }
        };

        let extracted = extract_page(&html);
        let page = PageContent {
            url: url.to_string(),
            title: extracted.title,
            description: extracted.description,
            content: extracted.content,
            fetched_at: Utc::now(),
        };

        tracing::info!(
            url = %url,
            title = %page.title,
            content_chars = page.content.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "page fetched"
        );

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(page.clone());
        }
        Ok(page)
    }

    /// Fetch several pages in batches of `max_concurrent`.
    ///
    /// Output has the same length and order as `urls`; per-URL failures are
    /// reported inline and never abort the remaining batches.
    pub async fn fetch_many(&self, urls: &[String], max_concurrent: usize) -> Vec<FetchOutcome> {
        let batch_size = max_concurrent.max(1);
        let mut outcomes = Vec::with_capacity(urls.len());

        for batch in urls.chunks(batch_size) {
            let results = join_all(batch.iter().map(|url| self.fetch_one(url))).await;
            for (url, result) in batch.iter().zip(results) {
                outcomes.push(match result {
                    Ok(page) => FetchOutcome::Page(page),
                    Err(e) => FetchOutcome::Failed {
                        url: url.clone(),
                        error: e.to_string(),
                    },
                });
            }
        }

        tracing::info!(
            requested = urls.len(),
            succeeded = outcomes.iter().filter(|o| o.is_page()).count(),
            "batch fetch complete"
        );
        outcomes
    }

    fn cached(&self, url: &str) -> Option<PageContent> {
        self.cache.lock().ok().and_then(|cache| cache.get(url))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
