//! Default parse function: HTML link extraction
//!
//! This module handles turning a fetched HTML page into:
//! - One `PageItem` describing the page (URL, title, depth, outgoing links)
//! - One derived request per followable link

use crate::crawler::ParseFn;
use crate::model::{Item, Parsed, Request, Response};
use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

/// The item emitted for every successfully parsed page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageItem {
    /// Final URL of the page, after redirects
    pub url: String,

    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Link distance from the seed
    pub depth: u32,

    /// All followable links found on the page (absolute, fragment stripped)
    pub links: Vec<String>,
}

impl Item for PageItem {
    fn is_valid(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
struct ParsedPage {
    title: Option<String>,
    links: Vec<Url>,
}

/// Builds the default parse function
///
/// Responses outside the 2xx range produce an error and nothing else. For every
/// other response the parser yields one `PageItem` followed by one request per
/// link. Depths on the derived requests are left for the analyzer to fill in.
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links
/// - Anything that does not resolve to HTTP(S)
///
/// # Example
///
/// ```
/// use ripple_engine::crawler::html_link_parser;
/// use ripple_engine::model::Response;
/// use url::Url;
///
/// let parse = html_link_parser();
/// let url = Url::parse("https://example.com/").unwrap();
/// let response = Response::new(url, 200, r#"<a href="/next">next</a>"#);
///
/// let (values, errors) = parse(&response);
/// assert!(errors.is_empty());
/// assert_eq!(values.len(), 2);
/// ```
pub fn html_link_parser() -> ParseFn<PageItem> {
    Arc::new(|response: &Response| {
        if !response.is_success() {
            return (
                Vec::new(),
                vec![anyhow::anyhow!("unexpected status {}", response.status())],
            );
        }

        let page = parse_html(response.body(), response.url());
        let mut values = Vec::with_capacity(page.links.len() + 1);

        values.push(Parsed::Item(PageItem {
            url: response.url().to_string(),
            title: page.title,
            depth: response.depth(),
            links: page.links.iter().map(Url::to_string).collect(),
        }));
        values.extend(
            page.links
                .into_iter()
                .map(|link| Parsed::Request(Request::new(link))),
        );

        (values, Vec::new())
    })
}

fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all followable links, deduplicated, in document order
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links: Vec<Url> = Vec::new();
    let mut push = |link: Url| {
        if !links.contains(&link) {
            links.push(link);
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(link) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                push(link);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(link) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                push(link);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute HTTP(S) URL without fragment
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url)
}
