//! Data models for tracked providers and their update histories.
//!
//! - [`Candidate`]: a transient record straight out of a source adapter
//! - [`Update`]: a validated, normalized, persisted record
//! - [`ProviderHistory`]: one provider and its newest-first update list
//! - [`Document`]: the whole persisted state, one JSON object
//!
//! The persisted field names (`competitors`, `lastUpdated`) are kept in the
//! camelCase shape that downstream readers of the JSON file already expect.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The date carried by a [`Candidate`] before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateDate {
    /// Free text as found in the markup, e.g. `"28th October 2025"` or `"Nov 25"`.
    Raw(String),
    /// Already a calendar date (e.g. from a `datetime` attribute parsed upstream).
    Normalized(NaiveDate),
    /// The markup carried no date at all.
    Unknown,
}

/// An extracted, not-yet-merged update.
///
/// Same shape as [`Update`], but fields are not length-capped yet, the URL may
/// be relative and the date may still be free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub description: String,
    pub date: CandidateDate,
    pub url: String,
}

/// A persisted update record. Never edited in place once merged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Update {
    /// At most 150 characters.
    pub title: String,
    /// Non-empty, capped per source (250 or 300 characters).
    pub description: String,
    /// Calendar date, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Absolute URL.
    pub url: String,
}

/// One tracked provider and its update history.
///
/// `updates` is ordered newest-insertion-first. That order is authoritative
/// and is not necessarily the order of `date`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderHistory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub updates: Vec<Update>,
}

impl ProviderHistory {
    pub fn empty(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            updates: Vec::new(),
        }
    }
}

/// The whole persisted state: every provider's history plus the time of the
/// last completed run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Document {
    #[serde(rename = "competitors")]
    pub providers: Vec<ProviderHistory>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl Document {
    /// A fresh document with an empty history for every `(id, name)` pair.
    pub fn fresh<'a>(
        providers: impl IntoIterator<Item = (&'a str, &'a str)>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|(id, name)| ProviderHistory::empty(id, name))
                .collect(),
            last_updated: now,
        }
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderHistory> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn provider_mut(&mut self, id: &str) -> Option<&mut ProviderHistory> {
        self.providers.iter_mut().find(|p| p.id == id)
    }

    /// Make sure every `(id, name)` pair has a history.
    ///
    /// Missing providers are appended with an empty history; existing ones get
    /// their display name refreshed. Providers not listed are left untouched.
    pub fn reconcile<'a>(&mut self, providers: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (id, name) in providers {
            match self.provider_mut(id) {
                Some(existing) => {
                    if existing.name != name {
                        existing.name = name.to_string();
                    }
                }
                None => self.providers.push(ProviderHistory::empty(id, name)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_document_serialization_shape() {
        let mut doc = Document::fresh([("matomo", "Matomo")], now());
        doc.providers[0].updates.push(Update {
            title: "Matomo 5.1 Release".to_string(),
            description: "New version 5.1 of Matomo has been released".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 10, 28).unwrap(),
            url: "https://matomo.org/changelog/matomo-5-1/".to_string(),
        });

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["competitors"][0]["id"], "matomo");
        assert_eq!(json["competitors"][0]["updates"][0]["date"], "2025-10-28");
        assert!(json["lastUpdated"].as_str().unwrap().starts_with("2025-11-20T10:00:00"));
    }

    #[test]
    fn test_document_deserialization_with_millis() {
        let json = r#"{
            "competitors": [
                { "id": "mixpanel", "name": "Mixpanel", "updates": [] },
                { "id": "matomo", "name": "Matomo" }
            ],
            "lastUpdated": "2025-11-20T10:00:00.000Z"
        }"#;

        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.providers.len(), 2);
        assert!(doc.provider("matomo").unwrap().updates.is_empty());
        assert_eq!(doc.last_updated, now());
    }

    #[test]
    fn test_reconcile_adds_missing_and_keeps_unknown() {
        let mut doc = Document::fresh([("legacy", "Legacy"), ("matomo", "Old Name")], now());
        doc.reconcile([("matomo", "Matomo"), ("amplitude", "Amplitude")]);

        let ids: Vec<&str> = doc.providers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["legacy", "matomo", "amplitude"]);
        assert_eq!(doc.provider("matomo").unwrap().name, "Matomo");
    }
}
