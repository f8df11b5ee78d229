//! Release links of the form `Matomo 5.1.2 – 28th October 2025`.
//!
//! Matomo's changelog index lists every release as one anchor whose text
//! carries product, version and date. The title and description are
//! synthesized from the version since the anchor has nothing else.

use super::{Adapter, Candidates, ExtractError, SourceContext, parse_selector, select_owned, text_of};
use crate::models::{Candidate, CandidateDate};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::trace;

static RELEASE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<product>[a-z][\w ]*?)\s+v?(?P<version>\d+(?:\.\d+)*)\.?\s*[–—-]\s*(?P<date>.+)$")
        .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VersionLinks {
    /// Anchors to consider, e.g. `.entry-content a[href*="/changelog/matomo-"]`.
    pub selector: String,
    /// Only the first `limit` matching anchors are looked at.
    pub limit: usize,
}

impl Default for VersionLinks {
    fn default() -> Self {
        Self {
            selector: r#"a[href*="/changelog/"]"#.to_string(),
            limit: 20,
        }
    }
}

impl Adapter for VersionLinks {
    fn kind(&self) -> &'static str {
        "version_links"
    }

    fn extract<'a>(
        &'a self,
        document: &'a Html,
        _ctx: &'a SourceContext,
    ) -> Result<Candidates<'a>, ExtractError> {
        let anchors = parse_selector(&self.selector)?;

        let candidates = select_owned(document, anchors)
            .take(self.limit)
            .filter_map(|anchor| {
                let text = text_of(anchor);
                let Some(caps) = RELEASE_TEXT.captures(&text) else {
                    trace!(%text, "Anchor text is not a release line");
                    return None;
                };
                let product = caps["product"].trim();
                let version = &caps["version"];

                Some(Candidate {
                    title: format!("{product} {version} Release"),
                    description: format!("New version {version} of {product} has been released"),
                    date: CandidateDate::Raw(caps["date"].trim().to_string()),
                    url: anchor.value().attr("href").unwrap_or_default().to_string(),
                })
            });

        Ok(Box::new(candidates))
    }
}
