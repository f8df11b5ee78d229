//! # Changelog Tracker
//!
//! Tracks the change-log and release-note pages of several providers and
//! keeps one JSON document with a deduplicated, size-bounded history of
//! updates per provider.
//!
//! ## Usage
//!
//! ```sh
//! changelog_tracker --data-file ./data/updates.json
//! ```
//!
//! ## Architecture
//!
//! One run is a short pipeline:
//! 1. **Lock & load**: take the data-file lock and load the document
//!    (a fresh one if missing or corrupt)
//! 2. **Fetch**: download every provider page, one at a time with a delay
//! 3. **Extract & merge**: adapters turn markup into candidates, which are
//!    sanitized, date-normalized, deduplicated and merged per provider
//! 4. **Save**: write the whole document back with a fresh `lastUpdated`
//!
//! Provider failures never stop a run. Only failing to save does.

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod dates;
mod fetch;
mod history;
mod models;
mod pipeline;
mod registry;
mod sanitize;
mod scrapers;
mod store;
mod utils;

use cli::Cli;
use fetch::Fetcher;
use pipeline::{Pipeline, fetch_all};
use registry::Registry;
use store::JsonStore;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("changelog_tracker starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut registry = match &args.providers {
        Some(path) => Registry::from_yaml_file(path)?,
        None => Registry::builtin(),
    };
    for id in args.only.iter().filter(|id| registry.get(id).is_none()) {
        warn!(provider = %id, "Unknown provider id in --only; ignoring");
    }
    registry.retain_ids(&args.only);
    if registry.providers().is_empty() {
        error!(only = ?args.only, "No configured provider matches --only");
        return Err("no providers selected".into());
    }

    // Early check: the data directory must be writable before any fetching.
    if let Some(dir) = args.data_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Data directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let store = JsonStore::new(&args.data_file);
    let _lock = store.lock()?;

    let run_started = Utc::now();
    let document = store.load(registry.identities(), run_started).await;

    let fetcher = Fetcher::new(&args.user_agent, args.timeout())?;
    let fetched = fetch_all(&fetcher, &registry, args.delay()).await;

    let pipeline = Pipeline::new(&registry, args.dedup);
    let (document, report) = pipeline.run_once(document, Utc::now(), &fetched);

    for entry in &report.providers {
        let retained = document.provider(&entry.id).map_or(0, |h| h.updates.len());
        debug!(provider = %entry.id, extracted = entry.extracted, inserted = entry.inserted, retained, "Provider summary");
    }
    for failed in report.failures() {
        warn!(
            provider = %failed.id,
            reason = failed.failure.as_deref().unwrap_or_default(),
            "Provider contributed nothing this run"
        );
    }

    if let Err(e) = store.save(&document).await {
        error!(path = %store.path().display(), error = %e, "Failed to save data; this run's updates are lost");
        return Err(e.into());
    }

    let elapsed = start_time.elapsed();
    info!(
        total_inserted = report.total_inserted(),
        failed = report.failures().count(),
        ?elapsed,
        "Run complete"
    );

    Ok(())
}
