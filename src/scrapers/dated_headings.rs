//! Release-note pages where each entry heading names its own date, e.g.
//! `October 28, 2025 - Funnel exploration improvements` (Google Analytics).
//! The description is the paragraph right after the heading; every entry
//! links back to the page itself.

use super::{Adapter, Candidates, ExtractError, SourceContext, next_paragraph, parse_selector, select_owned, text_of};
use crate::dates::find_date_token;
use crate::models::{Candidate, CandidateDate};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b20\d{2}\b").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatedHeadings {
    pub headings: String,
    /// Headings this short or shorter are section labels, not entries.
    pub min_title_chars: usize,
    pub limit: usize,
}

impl Default for DatedHeadings {
    fn default() -> Self {
        Self {
            headings: "h2, h3".to_string(),
            min_title_chars: 11,
            limit: 15,
        }
    }
}

impl Adapter for DatedHeadings {
    fn kind(&self) -> &'static str {
        "dated_headings"
    }

    fn extract<'a>(
        &'a self,
        document: &'a Html,
        ctx: &'a SourceContext,
    ) -> Result<Candidates<'a>, ExtractError> {
        let headings = parse_selector(&self.headings)?;

        let candidates = select_owned(document, headings)
            .take(self.limit)
            .filter_map(move |heading| {
                let title = text_of(heading);
                let token = find_date_token(&title);
                if title.chars().count() < self.min_title_chars
                    || (token.is_none() && !YEAR.is_match(&title))
                {
                    return None;
                }

                Some(Candidate {
                    date: token.map_or(CandidateDate::Unknown, |t| CandidateDate::Raw(t.to_string())),
                    description: next_paragraph(heading).unwrap_or_default(),
                    url: ctx.page_url.clone(),
                    title,
                })
            });

        Ok(Box::new(candidates))
    }
}
