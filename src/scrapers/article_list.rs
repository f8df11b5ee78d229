//! Blog-style listings: one `<article>` per post with a heading, a link, a
//! `<time>` element and an excerpt paragraph (Piwik PRO news releases).

use super::{
    Adapter, Candidates, ExtractError, SourceContext, first_href, first_text, parse_selector,
    select_owned, text_of,
};
use crate::models::{Candidate, CandidateDate};
use chrono::{DateTime, NaiveDate, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ArticleList {
    pub container: String,
    pub title: String,
    pub link: String,
    pub date: String,
    pub excerpt: String,
    pub limit: usize,
}

impl Default for ArticleList {
    fn default() -> Self {
        Self {
            container: "article.post, .post-item, article".to_string(),
            title: "h2, h3, .post-title, .entry-title".to_string(),
            link: "a".to_string(),
            date: "time, .date, .post-date".to_string(),
            excerpt: ".excerpt, .post-excerpt, p".to_string(),
            limit: 15,
        }
    }
}

impl Adapter for ArticleList {
    fn kind(&self) -> &'static str {
        "article_list"
    }

    fn extract<'a>(
        &'a self,
        document: &'a Html,
        _ctx: &'a SourceContext,
    ) -> Result<Candidates<'a>, ExtractError> {
        let container = parse_selector(&self.container)?;
        let title = parse_selector(&self.title)?;
        let link = parse_selector(&self.link)?;
        let date_sel = parse_selector(&self.date)?;
        let excerpt = parse_selector(&self.excerpt)?;

        let candidates = select_owned(document, container)
            .take(self.limit)
            .filter_map(move |post| {
                let heading = first_text(post, &title);
                if heading.is_empty() {
                    return None;
                }

                // Prefer the machine-readable datetime attribute over the visible text.
                let date = post
                    .select(&date_sel)
                    .next()
                    .map(|el| match el.value().attr("datetime").and_then(machine_date) {
                        Some(date) => CandidateDate::Normalized(date),
                        None => CandidateDate::Raw(text_of(el)),
                    })
                    .filter(|d| *d != CandidateDate::Raw(String::new()))
                    .unwrap_or(CandidateDate::Unknown);

                Some(Candidate {
                    title: heading,
                    description: first_text(post, &excerpt),
                    date,
                    url: first_href(post, &link).unwrap_or_default(),
                })
            });

        Ok(Box::new(candidates))
    }
}

/// Parse a `datetime` attribute: a full RFC 3339 timestamp or a bare date.
fn machine_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}
