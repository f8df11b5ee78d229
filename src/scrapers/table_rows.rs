//! Release tables: one `<tr>` per entry with date, title, description and
//! link cells. Header rows (`<th>` only) and short rows are skipped.

use super::{Adapter, Candidates, ExtractError, SourceContext, parse_selector, select_owned, text_of};
use crate::models::{Candidate, CandidateDate};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TableRows {
    pub rows: String,
    /// Rows with fewer `<td>` cells are skipped.
    pub min_cells: usize,
    pub date_column: usize,
    pub title_column: usize,
    pub description_column: usize,
    /// Cell holding the link; its first anchor's `href` wins over its text.
    pub link_column: usize,
    pub limit: usize,
}

impl Default for TableRows {
    fn default() -> Self {
        Self {
            rows: "table tr".to_string(),
            min_cells: 4,
            date_column: 0,
            title_column: 1,
            description_column: 2,
            link_column: 3,
            limit: 30,
        }
    }
}

impl Adapter for TableRows {
    fn kind(&self) -> &'static str {
        "table_rows"
    }

    fn extract<'a>(
        &'a self,
        document: &'a Html,
        _ctx: &'a SourceContext,
    ) -> Result<Candidates<'a>, ExtractError> {
        let rows = parse_selector(&self.rows)?;
        let cell = parse_selector("td")?;
        let anchor = parse_selector("a[href]")?;

        let candidates = select_owned(document, rows)
            .filter_map(move |row| {
                let cells: Vec<ElementRef> = row.select(&cell).collect();
                if cells.len() < self.min_cells {
                    return None;
                }
                let text = |column: usize| cells.get(column).map(|c| text_of(*c)).unwrap_or_default();

                let date = text(self.date_column);
                let title = text(self.title_column);
                if date.is_empty() || title.is_empty() {
                    return None;
                }

                let url = cells
                    .get(self.link_column)
                    .and_then(|c| c.select(&anchor).next())
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string)
                    .unwrap_or_else(|| text(self.link_column));

                Some(Candidate {
                    title,
                    description: text(self.description_column),
                    date: CandidateDate::Raw(date),
                    url,
                })
            })
            .take(self.limit);

        Ok(Box::new(candidates))
    }
}
