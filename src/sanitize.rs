//! Field-level validation of scraped candidates.
//!
//! A [`SourcePolicy`] carries the per-provider limits; [`sanitize`] applies
//! them to one [`Candidate`]: collapse whitespace, reject short titles, cap
//! lengths, substitute the fallback description, and make the URL absolute.

use crate::models::Candidate;
use crate::scrapers::SourceContext;
use crate::utils::{collapse_whitespace, truncate_chars};
use serde::{Deserialize, Serialize};
use url::Url;

/// Titles are capped at this many characters for every source.
pub const MAX_TITLE_CHARS: usize = 150;

/// Per-source limits applied by [`sanitize`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcePolicy {
    /// Titles with fewer characters than this are dropped.
    pub min_title_chars: usize,
    /// Description cap in characters (250 or 300 in practice).
    pub max_description_chars: usize,
    /// Descriptions with fewer words than this are replaced by the fallback.
    pub min_description_words: usize,
    /// Description used when the extracted one is empty or uninformative.
    pub fallback_description: String,
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self {
            min_title_chars: 6,
            max_description_chars: 250,
            min_description_words: 1,
            fallback_description: "Product update".to_string(),
        }
    }
}

impl SourcePolicy {
    /// Check that every candidate passing this policy ends up with a
    /// non-empty description.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.fallback_description.trim().is_empty() {
            return Err("fallback_description must not be empty");
        }
        if self.max_description_chars == 0 {
            return Err("max_description_chars must be at least 1");
        }
        Ok(())
    }
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    EmptyTitle,
    TitleTooShort { chars: usize, min: usize },
}

/// Apply `policy` to `candidate`, resolving relative URLs against the
/// source's base URL.
///
/// The page URL stands in when the candidate has no URL at all or one that
/// cannot be resolved.
pub fn sanitize(
    candidate: Candidate,
    policy: &SourcePolicy,
    ctx: &SourceContext,
) -> Result<Candidate, Rejection> {
    let title = collapse_whitespace(&candidate.title);
    let chars = title.chars().count();
    if chars == 0 {
        return Err(Rejection::EmptyTitle);
    }
    if chars < policy.min_title_chars {
        return Err(Rejection::TitleTooShort {
            chars,
            min: policy.min_title_chars,
        });
    }

    let description = collapse_whitespace(&candidate.description);
    let description = if description.split_whitespace().count() < policy.min_description_words.max(1) {
        policy.fallback_description.clone()
    } else {
        description
    };

    Ok(Candidate {
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        description: truncate_chars(&description, policy.max_description_chars),
        date: candidate.date,
        url: resolve_url(candidate.url.trim(), &ctx.base_url, &ctx.page_url),
    })
}

/// Absolute URLs pass through; relative ones are joined onto `base_url`.
pub fn resolve_url(href: &str, base_url: &Url, page_url: &str) -> String {
    if href.is_empty() {
        return page_url.to_string();
    }
    if let Ok(absolute) = Url::parse(href) {
        return absolute.to_string();
    }
    base_url
        .join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| page_url.to_string())
}
