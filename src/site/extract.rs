//! Readable-text extraction from HTML pages.
//!
//! Parses the document with `scraper`, skips boilerplate subtrees (scripts,
//! styles, navigation, headers, footers, asides, cookie banners, ads) and
//! takes the first content region that yields text, falling back to `<body>`.
//!
//! `scraper::Html` is not `Send`, so extraction stays synchronous and must
//! never be held across an `.await`.

use scraper::{ElementRef, Html, Node, Selector};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Maximum characters of body text kept per page.
pub const MAX_CONTENT_CHARS: usize = 3000;

/// Content regions, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "[role=\"main\"]",
    "article",
    ".content",
    "#content",
    ".main-content",
    ".post-content",
    ".entry-content",
    ".page-content",
];

/// Elements whose whole subtree is dropped.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "iframe", "svg",
    "template",
];

/// Class/id fragments that mark cookie banners and ad slots.
const NOISE_MARKERS: &[&str] = &["cookie", "consent", "gdpr", "advert", "sponsor", "banner-ad"];

/// Class/id tokens that mark ad slots exactly (substring matching would hit "header", "downloads").
const AD_TOKENS: &[&str] = &["ad", "ads", "adsbygoogle", "ad-slot", "ad-banner", "ad-container"];

// ─── Types ───────────────────────────────────────────────────────────────────

/// Text pulled out of one HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    pub description: String,
    pub content: String,
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Extract title, meta description and main text from an HTML document.
pub fn extract_page(html: &str) -> ExtractedPage {
    let doc = Html::parse_document(html);

    ExtractedPage {
        title: extract_title(&doc),
        description: extract_description(&doc),
        content: extract_content(&doc),
    }
}

fn extract_title(doc: &Html) -> String {
    first_text(doc, "title")
        .or_else(|| meta_content(doc, "meta[property=\"og:title\"]"))
        .or_else(|| first_text(doc, "h1"))
        .unwrap_or_default()
}

fn extract_description(doc: &Html) -> String {
    meta_content(doc, "meta[name=\"description\"]")
        .or_else(|| meta_content(doc, "meta[property=\"og:description\"]"))
        .unwrap_or_default()
}

fn extract_content(doc: &Html) -> String {
    for sel_str in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            let text = element_text(&el);
            if !text.is_empty() {
                return text;
            }
        }
    }

    if let Ok(body_sel) = Selector::parse("body") {
        if let Some(body) = doc.select(&body_sel).next() {
            return element_text(&body);
        }
    }

    String::new()
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|t| !t.is_empty())
}

/// Visible text of an element with noisy subtrees removed, whitespace
/// collapsed and truncated to [`MAX_CONTENT_CHARS`].
fn element_text(el: &ElementRef<'_>) -> String {
    let mut buf = String::new();
    collect_text(el, &mut buf);
    truncate_chars(&collapse_whitespace(&buf), MAX_CONTENT_CHARS)
}

/// Pending work for the text walk. Pages can nest elements arbitrarily
/// deep, so the walk keeps its own stack instead of recursing.
enum Step<'a> {
    Text(&'a str),
    Element(ElementRef<'a>),
    /// Separator after an element's subtree closes.
    Gap,
}

fn collect_text<'a>(root: &ElementRef<'a>, buf: &mut String) {
    let mut stack = Vec::new();
    push_children(root, &mut stack);

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text) => buf.push_str(text),
            Step::Gap => buf.push(' '),
            Step::Element(el) => {
                if is_noise(&el) {
                    continue;
                }
                // Keep words in adjacent blocks apart.
                buf.push(' ');
                stack.push(Step::Gap);
                push_children(&el, &mut stack);
            }
        }
    }
}

/// Push `el`'s children so that they pop in document order.
fn push_children<'a>(el: &ElementRef<'a>, stack: &mut Vec<Step<'a>>) {
    let start = stack.len();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => stack.push(Step::Text(&**text)),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    stack.push(Step::Element(child_el));
                }
            }
            _ => {}
        }
    }
    stack[start..].reverse();
}

fn is_noise(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    if SKIP_TAGS.contains(&value.name()) {
        return true;
    }
    if value.attr("aria-hidden") == Some("true") {
        return true;
    }

    let markers = value
        .attr("class")
        .into_iter()
        .chain(value.attr("id"))
        .flat_map(str::split_whitespace)
        .map(str::to_lowercase);

    for token in markers {
        if NOISE_MARKERS.iter().any(|m| token.contains(m)) {
            return true;
        }
        if AD_TOKENS.contains(&token.as_str()) {
            return true;
        }
    }
    false
}

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
