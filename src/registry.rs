//! The set of tracked providers.
//!
//! Each [`ProviderSpec`] ties a provider id to the page to fetch, the base
//! URL for relative links, the [`Adapter`] that understands the page and the
//! [`SourcePolicy`] its candidates are sanitized with. The registry is either
//! [`Registry::builtin`] or loaded from a YAML file:
//!
//! ```yaml
//! - id: matomo
//!   name: Matomo
//!   url: https://matomo.org/changelog/
//!   adapter:
//!     kind: version_links
//!     selector: '.entry-content a[href*="/changelog/matomo-"]'
//!   policy:
//!     fallback_description: Matomo release
//! ```

use crate::sanitize::SourcePolicy;
use crate::scrapers::{
    Adapter, AdapterConfig, ArticleList, DatedHeadings, Generic, SourceContext, VersionLinks,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("cannot read providers file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid providers file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("provider `{id}` has an invalid URL `{url}`: {source}")]
    Url {
        id: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("provider `{id}` has an unusable policy: {reason}")]
    Policy { id: String, reason: &'static str },
    #[error("provider id `{0}` is listed more than once")]
    DuplicateId(String),
    #[error("no providers configured")]
    Empty,
}

/// One provider as written in a providers file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    /// Defaults to the origin of `url`.
    #[serde(default)]
    pub base_url: Option<String>,
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub policy: SourcePolicy,
}

#[derive(Debug)]
pub struct ProviderSpec {
    pub id: String,
    pub name: String,
    pub url: String,
    pub base_url: Url,
    pub adapter: Box<dyn Adapter>,
    pub policy: SourcePolicy,
}

impl ProviderSpec {
    pub fn context(&self) -> SourceContext {
        SourceContext {
            provider_id: self.id.clone(),
            page_url: self.url.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

impl TryFrom<ProviderConfig> for ProviderSpec {
    type Error = RegistryError;

    fn try_from(config: ProviderConfig) -> Result<Self, Self::Error> {
        config.policy.validate().map_err(|reason| RegistryError::Policy {
            id: config.id.clone(),
            reason,
        })?;

        let parse = |raw: &str| {
            Url::parse(raw).map_err(|source| RegistryError::Url {
                id: config.id.clone(),
                url: raw.to_string(),
                source,
            })
        };
        let page = parse(&config.url)?;
        let base_url = match config.base_url.as_deref() {
            Some(base) => parse(base)?,
            None => page.join("/").unwrap_or(page),
        };

        Ok(ProviderSpec {
            id: config.id,
            name: config.name,
            url: config.url,
            base_url,
            adapter: config.adapter.into_adapter(),
            policy: config.policy,
        })
    }
}

#[derive(Debug)]
pub struct Registry {
    providers: Vec<ProviderSpec>,
}

impl Registry {
    pub fn new(providers: Vec<ProviderSpec>) -> Result<Self, RegistryError> {
        if providers.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        for p in &providers {
            if !seen.insert(p.id.as_str()) {
                return Err(RegistryError::DuplicateId(p.id.clone()));
            }
        }
        Ok(Self { providers })
    }

    pub fn from_configs(configs: Vec<ProviderConfig>) -> Result<Self, RegistryError> {
        let providers = configs
            .into_iter()
            .map(ProviderSpec::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(providers)
    }

    /// Load a YAML list of [`ProviderConfig`]s.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn from_yaml_file(path: &Path) -> Result<Self, RegistryError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: display.clone(),
            source,
        })?;
        let configs: Vec<ProviderConfig> =
            serde_yaml::from_str(&raw).map_err(|source| RegistryError::Yaml {
                path: display,
                source,
            })?;
        let registry = Self::from_configs(configs)?;
        info!(count = registry.providers.len(), "Loaded provider registry");
        Ok(registry)
    }

    /// The six analytics vendors tracked out of the box.
    pub fn builtin() -> Self {
        let configs = vec![
            ProviderConfig {
                id: "google-analytics".to_string(),
                name: "Google Analytics".to_string(),
                url: "https://support.google.com/analytics/answer/9164320?hl=en".to_string(),
                base_url: None,
                adapter: AdapterConfig::DatedHeadings(DatedHeadings::default()),
                policy: policy(11, "Google Analytics update"),
            },
            ProviderConfig {
                id: "adobe-cja".to_string(),
                name: "Adobe CJA".to_string(),
                url: "https://experienceleague.adobe.com/en/docs/analytics-platform/using/releases/2025"
                    .to_string(),
                base_url: None,
                adapter: AdapterConfig::Generic(Generic::default()),
                policy: policy(6, "Adobe CJA update"),
            },
            ProviderConfig {
                id: "amplitude".to_string(),
                name: "Amplitude".to_string(),
                url: "https://amplitude.com/releases".to_string(),
                base_url: None,
                adapter: AdapterConfig::Generic(Generic::default()),
                policy: policy(6, "Amplitude update"),
            },
            ProviderConfig {
                id: "mixpanel".to_string(),
                name: "Mixpanel".to_string(),
                url: "https://docs.mixpanel.com/changelogs".to_string(),
                base_url: None,
                adapter: AdapterConfig::Generic(Generic::default()),
                policy: policy(6, "Mixpanel update"),
            },
            ProviderConfig {
                id: "piwik-pro".to_string(),
                name: "Piwik Pro".to_string(),
                url: "https://piwik.pro/blog/category/news-releases/".to_string(),
                base_url: None,
                adapter: AdapterConfig::ArticleList(ArticleList::default()),
                policy: policy(6, "Piwik Pro news and updates"),
            },
            ProviderConfig {
                id: "matomo".to_string(),
                name: "Matomo".to_string(),
                url: "https://matomo.org/changelog/".to_string(),
                base_url: None,
                adapter: AdapterConfig::VersionLinks(VersionLinks {
                    selector: r#".entry-content a[href*="/changelog/matomo-"]"#.to_string(),
                    limit: 20,
                }),
                policy: policy(6, "Matomo release"),
            },
        ];

        // The built-in table is static; a failure here is a programming error.
        Self::from_configs(configs).expect("built-in provider registry is valid")
    }

    pub fn providers(&self) -> &[ProviderSpec] {
        &self.providers
    }

    pub fn get(&self, id: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// `(id, name)` pairs, for seeding and reconciling documents.
    pub fn identities(&self) -> impl Iterator<Item = (&str, &str)> {
        self.providers.iter().map(|p| (p.id.as_str(), p.name.as_str()))
    }

    /// Keep only the listed providers. An empty list keeps everything.
    pub fn retain_ids(&mut self, ids: &[String]) {
        if !ids.is_empty() {
            self.providers.retain(|p| ids.iter().any(|id| *id == p.id));
        }
    }
}

fn policy(min_title_chars: usize, fallback: &str) -> SourcePolicy {
    SourcePolicy {
        min_title_chars,
        max_description_chars: 250,
        min_description_words: 1,
        fallback_description: fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = Registry::builtin();
        let ids: Vec<&str> = registry.identities().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec!["google-analytics", "adobe-cja", "amplitude", "mixpanel", "piwik-pro", "matomo"]
        );

        let matomo = registry.get("matomo").unwrap();
        assert_eq!(matomo.adapter.kind(), "version_links");
        assert_eq!(matomo.base_url.as_str(), "https://matomo.org/");
        assert_eq!(registry.get("piwik-pro").unwrap().base_url.as_str(), "https://piwik.pro/");
    }

    #[test]
    fn test_from_yaml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("providers.yaml");
        std::fs::write(
            &path,
            r#"
- id: heap
  name: Heap
  url: https://www.heap.io/changelog
  base_url: https://help.heap.io
  adapter:
    kind: date_sections
    headings: "h2, h3"
  policy:
    max_description_chars: 300
    min_description_words: 4
    fallback_description: Heap product update
- id: posthog
  name: PostHog
  url: https://posthog.com/changelog
  adapter:
    kind: table_rows
"#,
        )
        .unwrap();

        let registry = Registry::from_yaml_file(&path).unwrap();
        let heap = registry.get("heap").unwrap();
        assert_eq!(heap.adapter.kind(), "date_sections");
        assert_eq!(heap.base_url.as_str(), "https://help.heap.io/");
        assert_eq!(heap.policy.max_description_chars, 300);
        assert_eq!(heap.policy.min_title_chars, SourcePolicy::default().min_title_chars);
        assert_eq!(registry.get("posthog").unwrap().adapter.kind(), "table_rows");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = r#"
- { id: a, name: A, url: "https://a.example/", adapter: { kind: generic } }
- { id: a, name: A2, url: "https://a2.example/", adapter: { kind: generic } }
"#;
        let configs: Vec<ProviderConfig> = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(Registry::from_configs(configs), Err(RegistryError::DuplicateId(id)) if id == "a"));
    }

    #[test]
    fn test_bad_url_rejected() {
        let yaml = r#"[{ id: a, name: A, url: "not a url", adapter: { kind: generic } }]"#;
        let configs: Vec<ProviderConfig> = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(Registry::from_configs(configs), Err(RegistryError::Url { .. })));
    }

    #[test]
    fn test_unusable_policy_rejected() {
        let yaml = r#"
- id: blank
  name: Blank
  url: https://blank.example/
  adapter: { kind: article_list }
  policy: { fallback_description: "" }
"#;
        let configs: Vec<ProviderConfig> = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            Registry::from_configs(configs),
            Err(RegistryError::Policy { id, .. }) if id == "blank"
        ));

        let yaml = r#"
- id: uncapped
  name: Uncapped
  url: https://uncapped.example/
  adapter: { kind: article_list }
  policy: { max_description_chars: 0 }
"#;
        let configs: Vec<ProviderConfig> = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            Registry::from_configs(configs),
            Err(RegistryError::Policy { id, .. }) if id == "uncapped"
        ));
    }

    #[test]
    fn test_retain_ids() {
        let mut registry = Registry::builtin();
        registry.retain_ids(&["matomo".to_string()]);
        assert_eq!(registry.providers().len(), 1);
        registry.retain_ids(&[]);
        assert_eq!(registry.providers().len(), 1);
    }
}
