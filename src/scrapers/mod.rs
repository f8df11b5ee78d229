//! Source adapters that turn a provider's change-log markup into candidates.
//!
//! Every adapter implements [`Adapter`]: given an already-parsed document it
//! returns a lazy, single-pass iterator of [`Candidate`]s. Adapters encode
//! the structural assumptions of one kind of page and skip anything that does
//! not fit instead of emitting half-formed records.
//!
//! # Available adapters
//!
//! | Kind | Module | Page shape | Used by |
//! |------|--------|------------|---------|
//! | `version_links` | [`version_links`] | anchors reading `Product 1.2.3 – date` | Matomo |
//! | `article_list` | [`article_list`] | blog `article` blocks with heading, time, excerpt | Piwik PRO |
//! | `dated_headings` | [`dated_headings`] | headings that carry their own date | Google Analytics |
//! | `date_sections` | [`date_sections`] | a date heading followed by entry subheadings | configurable |
//! | `table_rows` | [`table_rows`] | table rows with date/title/description/link cells | configurable |
//! | `generic` | [`generic`] | best-effort container probing | Adobe CJA, Amplitude, Mixpanel |
//!
//! A page that yields nothing (e.g. one rendered client-side) is a normal,
//! empty result. Only configuration problems such as an unparsable selector
//! surface as [`ExtractError`].

use crate::models::Candidate;
use crate::utils::collapse_whitespace;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub mod article_list;
pub mod date_sections;
pub mod dated_headings;
pub mod generic;
pub mod table_rows;
pub mod version_links;

pub use article_list::ArticleList;
pub use date_sections::DateSections;
pub use dated_headings::DatedHeadings;
pub use generic::Generic;
pub use table_rows::TableRows;
pub use version_links::VersionLinks;

/// Lazy candidate sequence borrowing the parsed document.
pub type Candidates<'a> = Box<dyn Iterator<Item = Candidate> + 'a>;

/// Where the markup came from.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub provider_id: String,
    /// The page that was fetched.
    pub page_url: String,
    /// Base for resolving relative links.
    pub base_url: Url,
}

/// Errors raised while setting up extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

/// One provider-page shape.
pub trait Adapter: fmt::Debug + Send + Sync {
    /// Short identifier used in logs.
    fn kind(&self) -> &'static str;

    /// Extract candidates from `document`.
    ///
    /// The returned iterator is finite and walks the document once.
    fn extract<'a>(
        &'a self,
        document: &'a Html,
        ctx: &'a SourceContext,
    ) -> Result<Candidates<'a>, ExtractError>;
}

/// Serializable adapter selection, as written in a providers file.
///
/// ```yaml
/// adapter:
///   kind: version_links
///   selector: '.entry-content a[href*="/changelog/matomo-"]'
///   limit: 20
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterConfig {
    VersionLinks(VersionLinks),
    ArticleList(ArticleList),
    DatedHeadings(DatedHeadings),
    DateSections(DateSections),
    TableRows(TableRows),
    Generic(Generic),
}

impl AdapterConfig {
    pub fn into_adapter(self) -> Box<dyn Adapter> {
        match self {
            AdapterConfig::VersionLinks(a) => Box::new(a),
            AdapterConfig::ArticleList(a) => Box::new(a),
            AdapterConfig::DatedHeadings(a) => Box::new(a),
            AdapterConfig::DateSections(a) => Box::new(a),
            AdapterConfig::TableRows(a) => Box::new(a),
            AdapterConfig::Generic(a) => Box::new(a),
        }
    }
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Elements matching `selector` in document order. Unlike [`Html::select`]
/// the iterator owns the selector, so it can outlive the caller's frame.
pub(crate) fn select_owned<'a>(
    document: &'a Html,
    selector: Selector,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |el| selector.matches(el))
}

/// Text content of an element with whitespace collapsed.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Text of the first descendant matching `selector`, empty when none does.
pub(crate) fn first_text(el: ElementRef<'_>, selector: &Selector) -> String {
    el.select(selector).next().map(text_of).unwrap_or_default()
}

/// `href` of the first descendant matching `selector`.
pub(crate) fn first_href(el: ElementRef<'_>, selector: &Selector) -> Option<String> {
    el.select(selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
}

/// Text of the element immediately following `el`, if that element is a `<p>`.
pub(crate) fn next_paragraph(el: ElementRef<'_>) -> Option<String> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .next()
        .filter(|sibling| sibling.value().name() == "p")
        .map(text_of)
}
