//! The extract → sanitize → normalize → dedupe → merge pipeline.
//!
//! [`Pipeline::run_once`] is pure: it takes the current document, the run's
//! reference instant and whatever markup was fetched per provider, and
//! returns the updated document plus a [`RunReport`]. All network access
//! lives in [`fetch_all`], which runs before it.
//!
//! Failures are contained per provider. A fetch error, a missing page or an
//! adapter error means zero candidates for that provider and nothing more;
//! the document's `lastUpdated` is refreshed regardless.

use crate::dates;
use crate::fetch::{FetchError, Fetcher};
use crate::history::{self, DedupPolicy};
use crate::models::{Candidate, CandidateDate, Document, Update};
use crate::registry::{ProviderSpec, Registry};
use crate::sanitize::sanitize;
use chrono::{DateTime, Utc};
use scraper::Html;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Result of fetching one provider's page.
pub type FetchOutcome = Result<String, FetchError>;

/// What happened to one provider during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReport {
    pub id: String,
    /// Candidates that survived sanitizing.
    pub extracted: usize,
    pub inserted: usize,
    /// Why the provider contributed nothing, if it failed.
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub providers: Vec<ProviderReport>,
}

impl RunReport {
    pub fn total_inserted(&self) -> usize {
        self.providers.iter().map(|p| p.inserted).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProviderReport> {
        self.providers.iter().filter(|p| p.failure.is_some())
    }
}

#[derive(Debug)]
pub struct Pipeline<'r> {
    registry: &'r Registry,
    dedup: DedupPolicy,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r Registry, dedup: DedupPolicy) -> Self {
        Self { registry, dedup }
    }

    /// Merge freshly fetched markup into `document`.
    ///
    /// Every registry provider gets a history (see [`Document::reconcile`]).
    /// `document.last_updated` is set to `now` even when every provider failed.
    pub fn run_once(
        &self,
        mut document: Document,
        now: DateTime<Utc>,
        fetched: &HashMap<String, FetchOutcome>,
    ) -> (Document, RunReport) {
        document.reconcile(self.registry.identities());
        let mut report = RunReport::default();

        for source in self.registry.providers() {
            let outcome = match fetched.get(&source.id) {
                Some(Ok(markup)) => self.merge_provider(&mut document, source, markup, now),
                Some(Err(e)) => {
                    error!(provider = %source.id, error = %e, "Fetch failed; no candidates this run");
                    ProviderReport::failed(&source.id, e.to_string())
                }
                None => {
                    warn!(provider = %source.id, "No markup for provider; skipping");
                    ProviderReport::failed(&source.id, "not fetched".to_string())
                }
            };

            if outcome.inserted > 0 {
                info!(provider = %source.id, inserted = outcome.inserted, "Added new updates");
            } else if outcome.failure.is_none() {
                info!(provider = %source.id, extracted = outcome.extracted, "No new updates found");
            }
            report.providers.push(outcome);
        }

        document.last_updated = now;
        (document, report)
    }

    fn merge_provider(
        &self,
        document: &mut Document,
        source: &ProviderSpec,
        markup: &str,
        now: DateTime<Utc>,
    ) -> ProviderReport {
        let html = Html::parse_document(markup);
        let ctx = source.context();

        let candidates = match source.adapter.extract(&html, &ctx) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(provider = %source.id, adapter = source.adapter.kind(), error = %e, "Extraction failed; no candidates this run");
                return ProviderReport::failed(&source.id, e.to_string());
            }
        };

        let Some(provider) = document.provider_mut(&source.id) else {
            return ProviderReport::failed(&source.id, "provider missing from document".to_string());
        };

        let mut extracted = 0;
        let updates = candidates
            .filter_map(|candidate| {
                match sanitize(candidate, &source.policy, &ctx) {
                    Ok(clean) => Some(clean),
                    Err(reason) => {
                        debug!(provider = %source.id, ?reason, "Dropped candidate");
                        None
                    }
                }
            })
            .inspect(|_| extracted += 1)
            .map(|candidate| into_update(candidate, now));

        let inserted = history::merge(&mut provider.updates, updates, self.dedup);

        ProviderReport {
            id: source.id.clone(),
            extracted,
            inserted,
            failure: None,
        }
    }
}

impl ProviderReport {
    fn failed(id: &str, reason: String) -> Self {
        Self {
            id: id.to_string(),
            extracted: 0,
            inserted: 0,
            failure: Some(reason),
        }
    }
}

/// Resolve a sanitized candidate's date against the run's reference instant.
pub fn into_update(candidate: Candidate, now: DateTime<Utc>) -> Update {
    let date = match candidate.date {
        CandidateDate::Raw(raw) => dates::normalize(&raw, now),
        CandidateDate::Normalized(date) => date,
        CandidateDate::Unknown => now.date_naive(),
    };
    Update {
        title: candidate.title,
        description: candidate.description,
        date,
        url: candidate.url,
    }
}

/// Fetch every provider's page in registry order, pausing `delay` between
/// requests. Failures are recorded for [`Pipeline::run_once`], not propagated.
#[instrument(level = "info", skip_all, fields(providers = registry.providers().len()))]
pub async fn fetch_all(
    fetcher: &Fetcher,
    registry: &Registry,
    delay: Duration,
) -> HashMap<String, FetchOutcome> {
    let mut fetched = HashMap::new();
    for (i, source) in registry.providers().iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            sleep(delay).await;
        }
        info!(provider = %source.id, url = %source.url, "Fetching provider page");
        fetched.insert(source.id.clone(), fetcher.fetch(&source.url).await);
    }
    fetched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MAX_RETAINED;
    use crate::registry::ProviderConfig;
    use crate::scrapers::{AdapterConfig, ArticleList, VersionLinks};
    use chrono::{NaiveDate, TimeZone};
    use reqwest::StatusCode;

    const MATOMO_PAGE: &str = r#"
        <html><body><div class="entry-content">
          <a href="/changelog/matomo-5-2-0/">Matomo 5.2.0 – 12th November 2025</a>
          <a href="/changelog/matomo-5-1-2/">Matomo 5.1.2 – 28th October 2025</a>
        </div></body></html>
    "#;

    const PIWIK_PAGE: &str = r#"
        <html><body>
          <article><h2><a href="/blog/piwik-pro-19/">Piwik PRO 19 is available</a></h2>
            <time datetime="2025-11-03">Nov 3</time><p>New consent manager.</p></article>
        </body></html>
    "#;

    fn registry() -> Registry {
        let yaml = r#"
- id: matomo
  name: Matomo
  url: https://matomo.org/changelog/
  adapter:
    kind: version_links
    selector: '.entry-content a[href*="/changelog/matomo-"]'
- id: piwik-pro
  name: Piwik Pro
  url: https://piwik.pro/blog/category/news-releases/
  adapter:
    kind: article_list
  policy:
    fallback_description: Piwik Pro news and updates
- id: mixpanel
  name: Mixpanel
  url: https://docs.mixpanel.com/changelogs
  adapter:
    kind: generic
"#;
        let configs: Vec<ProviderConfig> = serde_yaml::from_str(yaml).unwrap();
        Registry::from_configs(configs).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 6, 0, 0).unwrap()
    }

    fn empty_document(registry: &Registry) -> Document {
        let then = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Document::fresh(registry.identities(), then)
    }

    impl RunReport {
        fn inserted(&self, id: &str) -> Option<usize> {
            self.providers.iter().find(|p| p.id == id).map(|p| p.inserted)
        }
    }

    fn fetched(pages: Vec<(&str, FetchOutcome)>) -> HashMap<String, FetchOutcome> {
        pages
            .into_iter()
            .map(|(id, outcome)| (id.to_string(), outcome))
            .collect()
    }

    fn status_error() -> FetchOutcome {
        Err(FetchError::Status {
            url: "https://matomo.org/changelog/".to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        })
    }

    #[test]
    fn test_end_to_end_single_provider() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, DedupPolicy::TitleAndDate);
        let pages = fetched(vec![("matomo", Ok(MATOMO_PAGE.to_string()))]);

        let (doc, report) = pipeline.run_once(empty_document(&registry), now(), &pages);

        let matomo = &doc.provider("matomo").unwrap().updates;
        assert_eq!(matomo.len(), 2);
        // Each candidate goes to the front, so the last one emitted leads.
        assert_eq!(matomo[0].title, "Matomo 5.1.2 Release");
        assert_eq!(matomo[0].date, NaiveDate::from_ymd_opt(2025, 10, 28).unwrap());
        assert_eq!(matomo[0].url, "https://matomo.org/changelog/matomo-5-1-2/");
        assert_eq!(matomo[1].title, "Matomo 5.2.0 Release");
        assert_eq!(matomo[1].date, NaiveDate::from_ymd_opt(2025, 11, 12).unwrap());

        assert!(doc.provider("piwik-pro").unwrap().updates.is_empty());
        assert!(doc.provider("mixpanel").unwrap().updates.is_empty());
        assert_eq!(doc.last_updated, now());
        assert_eq!(report.inserted("matomo"), Some(2));
        assert_eq!(report.total_inserted(), 2);
    }

    #[test]
    fn test_failure_isolation() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, DedupPolicy::TitleAndDate);
        let pages = fetched(vec![
            ("matomo", status_error()),
            ("piwik-pro", Ok(PIWIK_PAGE.to_string())),
        ]);

        let (doc, report) = pipeline.run_once(empty_document(&registry), now(), &pages);

        assert!(doc.provider("matomo").unwrap().updates.is_empty());
        let piwik = &doc.provider("piwik-pro").unwrap().updates;
        assert_eq!(piwik.len(), 1);
        assert_eq!(piwik[0].url, "https://piwik.pro/blog/piwik-pro-19/");
        assert_eq!(piwik[0].date, NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
        assert_eq!(doc.last_updated, now());

        let failed: Vec<&str> = report.failures().map(|p| p.id.as_str()).collect();
        assert_eq!(failed, vec!["matomo", "mixpanel"]);
    }

    #[test]
    fn test_total_failure_still_refreshes_timestamp() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, DedupPolicy::TitleAndDate);
        let (doc, report) = pipeline.run_once(empty_document(&registry), now(), &HashMap::new());
        assert_eq!(doc.last_updated, now());
        assert_eq!(report.total_inserted(), 0);
        assert_eq!(report.failures().count(), 3);
    }

    #[test]
    fn test_second_run_inserts_nothing() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, DedupPolicy::TitleAndDate);
        let pages = fetched(vec![
            ("matomo", Ok(MATOMO_PAGE.to_string())),
            ("piwik-pro", Ok(PIWIK_PAGE.to_string())),
        ]);

        let (doc, first) = pipeline.run_once(empty_document(&registry), now(), &pages);
        assert_eq!(first.total_inserted(), 3);
        let later = Utc.with_ymd_and_hms(2025, 11, 21, 6, 0, 0).unwrap();
        let (doc2, second) = pipeline.run_once(doc.clone(), later, &pages);

        assert_eq!(second.total_inserted(), 0);
        assert_eq!(doc2.providers, doc.providers);
        assert_eq!(doc2.last_updated, later);
    }

    #[test]
    fn test_undated_entries_repeat_only_under_title_and_date() {
        let registry = registry();
        let page = "<article><h2>Session replay filters</h2><p>Filter replays by cohort.</p></article>";
        let pages = fetched(vec![("mixpanel", Ok(page.to_string()))]);
        let next_day = Utc.with_ymd_and_hms(2025, 11, 21, 6, 0, 0).unwrap();

        // Undated candidates take the run date, so each day looks like a new update.
        let by_date = Pipeline::new(&registry, DedupPolicy::TitleAndDate);
        let (doc, _) = by_date.run_once(empty_document(&registry), now(), &pages);
        let (doc, report) = by_date.run_once(doc, next_day, &pages);
        assert_eq!(report.inserted("mixpanel"), Some(1));
        assert_eq!(doc.provider("mixpanel").unwrap().updates.len(), 2);

        let by_title = Pipeline::new(&registry, DedupPolicy::Title);
        let (doc, _) = by_title.run_once(empty_document(&registry), now(), &pages);
        let (doc, report) = by_title.run_once(doc, next_day, &pages);
        assert_eq!(report.inserted("mixpanel"), Some(0));
        assert_eq!(doc.provider("mixpanel").unwrap().updates.len(), 1);
    }

    #[test]
    fn test_extraction_error_is_contained() {
        let configs = vec![
            ProviderConfig {
                id: "broken".to_string(),
                name: "Broken".to_string(),
                url: "https://broken.example/".to_string(),
                base_url: None,
                adapter: AdapterConfig::ArticleList(ArticleList {
                    container: "article[".to_string(),
                    ..ArticleList::default()
                }),
                policy: Default::default(),
            },
            ProviderConfig {
                id: "matomo".to_string(),
                name: "Matomo".to_string(),
                url: "https://matomo.org/changelog/".to_string(),
                base_url: None,
                adapter: AdapterConfig::VersionLinks(VersionLinks::default()),
                policy: Default::default(),
            },
        ];
        let registry = Registry::from_configs(configs).unwrap();
        let pipeline = Pipeline::new(&registry, DedupPolicy::Title);
        let pages = fetched(vec![
            ("broken", Ok("<article><h2>Anything at all</h2></article>".to_string())),
            ("matomo", Ok(MATOMO_PAGE.to_string())),
        ]);

        let (doc, report) = pipeline.run_once(empty_document(&registry), now(), &pages);
        assert!(report.providers[0].failure.as_deref().unwrap().contains("article["));
        assert_eq!(doc.provider("matomo").unwrap().updates.len(), 2);
    }

    #[test]
    fn test_existing_history_respected_and_bounded() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, DedupPolicy::TitleAndDate);
        let mut doc = empty_document(&registry);
        let matomo = doc.provider_mut("matomo").unwrap();
        matomo.updates = (0..MAX_RETAINED)
            .map(|i| Update {
                title: format!("matomo 4.{i} release"),
                description: "Older release".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                url: "https://matomo.org/changelog/".to_string(),
            })
            .collect();
        matomo.updates[0].title = "  MATOMO 5.1.2 release ".to_string();
        matomo.updates[0].date = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap();

        let pages = fetched(vec![("matomo", Ok(MATOMO_PAGE.to_string()))]);
        let (doc, report) = pipeline.run_once(doc, now(), &pages);

        let updates = &doc.provider("matomo").unwrap().updates;
        assert_eq!(report.inserted("matomo"), Some(1));
        assert_eq!(updates.len(), MAX_RETAINED);
        assert_eq!(updates[0].title, "Matomo 5.2.0 Release");
        assert_eq!(updates[1].title, "  MATOMO 5.1.2 release ");
    }

    #[test]
    fn test_document_missing_providers_is_reconciled() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, DedupPolicy::TitleAndDate);
        let doc = Document::fresh([("legacy", "Legacy")], now());
        let (doc, _) = pipeline.run_once(doc, now(), &HashMap::new());
        let ids: Vec<&str> = doc.providers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["legacy", "matomo", "piwik-pro", "mixpanel"]);
    }

    #[test]
    fn test_into_update_dates() {
        let candidate = |date| Candidate {
            title: "Title here".to_string(),
            description: "desc".to_string(),
            date,
            url: "https://x.example/".to_string(),
        };
        let today = now().date_naive();
        assert_eq!(into_update(candidate(CandidateDate::Unknown), now()).date, today);
        assert_eq!(
            into_update(candidate(CandidateDate::Raw("Nov 25".to_string())), now()).date,
            NaiveDate::from_ymd_opt(2025, 11, 25).unwrap()
        );
        let fixed = NaiveDate::from_ymd_opt(2020, 2, 2).unwrap();
        assert_eq!(into_update(candidate(CandidateDate::Normalized(fixed)), now()).date, fixed);
    }
}
