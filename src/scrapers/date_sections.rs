//! Pages grouped by date: a heading that is just a date opens a section, and
//! each following heading up to the next date heading is one entry in it.
//!
//! ```html
//! <h2>October 28, 2025</h2>
//!   <h3>Session replay filters</h3><p>...</p>
//!   <h3>New cohort exports</h3><p>...</p>
//! <h2>October 14, 2025</h2>
//!   ...
//! ```

use super::{
    Adapter, Candidates, ExtractError, SourceContext, first_href, next_paragraph, parse_selector,
    select_owned, text_of,
};
use crate::dates::is_date_heading;
use crate::models::{Candidate, CandidateDate};
use scraper::Html;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DateSections {
    /// Both the date headings and the entry headings.
    pub headings: String,
    pub link: String,
    /// Maximum number of entries emitted.
    pub limit: usize,
}

impl Default for DateSections {
    fn default() -> Self {
        Self {
            headings: "h1, h2, h3, h4".to_string(),
            link: "a".to_string(),
            limit: 50,
        }
    }
}

impl Adapter for DateSections {
    fn kind(&self) -> &'static str {
        "date_sections"
    }

    fn extract<'a>(
        &'a self,
        document: &'a Html,
        _ctx: &'a SourceContext,
    ) -> Result<Candidates<'a>, ExtractError> {
        let headings = parse_selector(&self.headings)?;
        let link = parse_selector(&self.link)?;
        let mut section: Option<String> = None;

        let candidates = select_owned(document, headings)
            .filter_map(move |heading| {
                let text = text_of(heading);
                if text.is_empty() {
                    return None;
                }
                if is_date_heading(&text) {
                    section = Some(text);
                    return None;
                }
                // Headings before the first date heading belong to no section.
                let date = section.clone()?;

                Some(Candidate {
                    title: text,
                    description: next_paragraph(heading).unwrap_or_default(),
                    date: CandidateDate::Raw(date),
                    url: first_href(heading, &link).unwrap_or_default(),
                })
            })
            .take(self.limit);

        Ok(Box::new(candidates))
    }
}
