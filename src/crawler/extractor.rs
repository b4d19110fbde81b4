//! HTML field extraction for comic pages
//!
//! This module turns a fetched page into the fields stored for it:
//! - The image URL (from `#comic img[src]`), resolved against the page URL
//! - The image annotation (the `title` attribute of the same image)
//! - The page title (text of `#ctitle`)

use crate::state::Extraction;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// Field name of the comic title
pub const FIELD_TITLE: &str = "title";

/// Field name of the image hover text
pub const FIELD_ANNOTATION: &str = "annotation";

/// Turns a raw document into named fields
///
/// Implementations must be pure: the same document and URL always give the
/// same result. `None` means at least one required field is missing.
pub trait Extractor: Send + Sync {
    fn extract(&self, document: &str, source_url: &str) -> Option<Extraction>;
}

/// Extractor for xkcd-style comic pages
#[derive(Debug, Clone, Copy, Default)]
pub struct ComicExtractor;

impl ComicExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ComicExtractor {
    fn extract(&self, document: &str, source_url: &str) -> Option<Extraction> {
        let base_url = Url::parse(source_url).ok()?;
        let document = Html::parse_document(document);

        let asset_url = extract_image_url(&document, &base_url)?;
        let title = extract_title(&document)?;
        let annotation = extract_annotation(&document)?;

        let mut fields = BTreeMap::new();
        fields.insert(FIELD_TITLE.to_string(), title);
        fields.insert(FIELD_ANNOTATION.to_string(), annotation);

        Some(Extraction { asset_url, fields })
    }
}

/// Extracts the comic image URL, made absolute
///
/// Protocol-relative sources (`//imgs.example.com/a.png`) take the page's scheme.
fn extract_image_url(document: &Html, base_url: &Url) -> Option<String> {
    let selector = Selector::parse("#comic img[src]").ok()?;
    let src = document.select(&selector).next()?.value().attr("src")?.trim();

    if src.is_empty() {
        return None;
    }

    let absolute = base_url.join(src).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute.to_string())
    } else {
        None
    }
}

/// Extracts the comic title from `#ctitle`
///
/// Like the annotation, an empty title is kept; only a missing element fails.
fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("#ctitle").ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
}

/// Extracts the hover text of the comic image
///
/// An empty `title` attribute is kept; only a missing one fails extraction.
fn extract_annotation(document: &Html) -> Option<String> {
    let selector = Selector::parse("#comic img").ok()?;

    document
        .select(&selector)
        .next()?
        .value()
        .attr("title")
        .map(str::to_string)
}
