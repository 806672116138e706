//! URL list loading.
//!
//! Each configured file is either a sitemap (XML, read with `quick-xml`) or
//! a plain list with one URL per line (`#` starts a comment line). The file
//! name hints at the category of every URL inside it (`post-sitemap.xml`,
//! `products.txt`, ...). Without a hint the category is read off the path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;

use super::errors::SiteError;
use super::url_index::{Category, UrlRecord};

/// Path segments that mark blog content.
const BLOG_SEGMENTS: &[&str] = &["blog", "blogs", "news", "article", "articles", "post", "posts"];

/// Path segments that mark product or pricing pages.
const PRODUCT_SEGMENTS: &[&str] = &[
    "product", "products", "pricing", "plans", "shop", "store", "buy",
];

/// Load every URL list, de-duplicating by exact URL (first wins).
pub fn load_url_records(paths: &[PathBuf]) -> Result<Vec<UrlRecord>, SiteError> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for path in paths {
        let raw = std::fs::read_to_string(path).map_err(|e| SiteError::ListUnreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let hint = category_hint(path);
        let before = records.len();
        let urls = parse_url_list(&raw).map_err(|reason| SiteError::MalformedSitemap {
            path: path.display().to_string(),
            reason,
        })?;
        for url in urls {
            if !seen.insert(url.clone()) {
                continue;
            }
            let category = hint.unwrap_or_else(|| infer_category(&url));
            records.push(UrlRecord::new(url, category));
        }

        tracing::info!(
            file = %path.display(),
            hint = hint.map(|c| c.as_str()).unwrap_or("none"),
            loaded = records.len() - before,
            "loaded URL list"
        );
    }

    if records.is_empty() && !paths.is_empty() {
        return Err(SiteError::NoUrls { files: paths.len() });
    }
    Ok(records)
}

/// Extract URLs from a sitemap or a line-oriented list.
///
/// Input starting with `<` is treated as sitemap XML and every `<loc>` value
/// is returned. Fails only on malformed XML.
pub fn parse_url_list(raw: &str) -> Result<Vec<String>, String> {
    if raw.trim_start().starts_with('<') {
        return parse_sitemap(raw);
    }

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn parse_sitemap(raw: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(raw);
    let mut urls = Vec::new();
    let mut current: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"loc" => {
                current = Some(String::new());
            }
            Event::End(e) if e.local_name().as_ref() == b"loc" => {
                if let Some(loc) = current.take() {
                    let loc = loc.trim();
                    if !loc.is_empty() {
                        urls.push(loc.to_string());
                    }
                }
            }
            Event::Text(text) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Event::CData(cdata) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&resolve_reference(&reference)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(urls)
}

/// Resolve `&#38;`, `&#x26;` and the predefined entities. Unknown names are
/// kept verbatim.
fn resolve_reference(reference: &BytesRef<'_>) -> Result<String, String> {
    if let Some(ch) = reference.resolve_char_ref().map_err(|e| e.to_string())? {
        return Ok(ch.to_string());
    }
    let name = String::from_utf8_lossy(reference);
    Ok(quick_xml::escape::resolve_predefined_entity(&name)
        .map(str::to_string)
        .unwrap_or_else(|| format!("&{name};")))
}

/// Category implied by a list's file name, if any.
fn category_hint(path: &Path) -> Option<Category> {
    let name = path.file_stem()?.to_string_lossy().to_lowercase();
    if name.contains("post") || name.contains("blog") {
        Some(Category::Blog)
    } else if name.contains("product") {
        Some(Category::Product)
    } else if name.contains("page") {
        Some(Category::Page)
    } else {
        None
    }
}

/// Category implied by the URL's path segments.
pub fn infer_category(url: &str) -> Category {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        Category::General
    } else if segments.iter().any(|s| BLOG_SEGMENTS.contains(s)) {
        Category::Blog
    } else if segments.iter().any(|s| PRODUCT_SEGMENTS.contains(s)) {
        Category::Product
    } else {
        Category::Page
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
