//! Best-effort extraction for pages with no known structure.
//!
//! Tries each container selector in turn and keeps the first one that
//! produces at least one entry. Such pages rarely expose a parsable date, so
//! candidates carry [`CandidateDate::Unknown`] and end up dated to the run.
//! Sites that render client-side usually yield nothing here.

use super::{
    Adapter, Candidates, ExtractError, SourceContext, first_href, first_text, parse_selector,
    select_owned,
};
use crate::models::{Candidate, CandidateDate};
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Generic {
    /// Probed in order; the first one yielding entries wins.
    pub containers: Vec<String>,
    pub title: String,
    pub description: String,
    pub link: String,
    /// Containers whose title is shorter than this do not count as entries.
    pub min_title_chars: usize,
    /// Matches looked at per container selector.
    pub limit: usize,
}

impl Default for Generic {
    fn default() -> Self {
        Self {
            containers: [
                "article",
                ".release",
                ".changelog-item",
                ".update-item",
                ".post",
                ".entry",
                r#"[class*="release"]"#,
                r#"[class*="changelog"]"#,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            title: r#"h1, h2, h3, h4, .title, [class*="title"]"#.to_string(),
            description: r#"p, .description, [class*="description"]"#.to_string(),
            link: "a".to_string(),
            min_title_chars: 6,
            limit: 10,
        }
    }
}

impl Adapter for Generic {
    fn kind(&self) -> &'static str {
        "generic"
    }

    fn extract<'a>(
        &'a self,
        document: &'a Html,
        ctx: &'a SourceContext,
    ) -> Result<Candidates<'a>, ExtractError> {
        let containers = self
            .containers
            .iter()
            .map(|css| parse_selector(css).map(|sel| (css.as_str(), sel)))
            .collect::<Result<Vec<_>, _>>()?;
        let title = parse_selector(&self.title)?;
        let description = parse_selector(&self.description)?;
        let link = parse_selector(&self.link)?;

        let winner = containers.into_iter().find_map(|(css, container)| {
            let (title, description, link) = (title.clone(), description.clone(), link.clone());
            let mut entries = select_owned(document, container)
                .take(self.limit)
                .filter_map(move |el| {
                    let heading = first_text(el, &title);
                    if heading.chars().count() < self.min_title_chars {
                        return None;
                    }
                    Some(Candidate {
                        title: heading,
                        description: first_text(el, &description),
                        date: CandidateDate::Unknown,
                        url: first_href(el, &link).unwrap_or_default(),
                    })
                })
                .peekable();

            entries.peek()?;
            debug!(provider = %ctx.provider_id, selector = css, "Generic container matched");
            Some(entries)
        });

        Ok(Box::new(winner.into_iter().flatten()))
    }
}
