//! Whole-document persistence of provider histories as one JSON file.
//!
//! - [`JsonStore::load`] never fails: a missing or unreadable file yields a
//!   fresh document with empty histories. An unparsable file is renamed
//!   aside first so the next save cannot destroy it.
//! - [`JsonStore::save`] overwrites the whole file through a temporary
//!   sibling and a rename, so readers never see a half-written document.
//! - [`JsonStore::lock`] takes an exclusive lock file for the load → save
//!   window, so overlapping runs cannot overwrite each other's merges.
//!
//! # Layout
//!
//! ```text
//! data/
//! ├── updates.json        # the document
//! ├── updates.json.lock   # present while a run is in progress
//! ├── updates.json.tmp    # transient, during save
//! └── updates.json.corrupt-20251120T100000Z  # an unparsable document, set aside
//! ```

use crate::models::Document;
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{info, instrument, warn};

/// A lock file older than this is assumed to belong to a crashed run.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{path} is locked by another run")]
    Locked { path: String },
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

/// Held for the duration of a run; removes the lock file on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Take the exclusive run lock, reclaiming it if it is older than
    /// [`STALE_LOCK_AGE`].
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        let lock_path = self.sibling(".lock");
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        match create_lock_file(&lock_path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !is_stale(&lock_path) {
                    return Err(StoreError::Locked {
                        path: lock_path.display().to_string(),
                    });
                }
                warn!(lock = %lock_path.display(), "Reclaiming stale lock file");
                std::fs::remove_file(&lock_path).map_err(|e| StoreError::io(&lock_path, e))?;
                create_lock_file(&lock_path).map_err(|e| StoreError::io(&lock_path, e))
            }
            Err(e) => Err(StoreError::io(&lock_path, e)),
        }
    }

    /// Read the document, or start a fresh one for `providers` when there is
    /// no usable file.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load<'a>(
        &self,
        providers: impl IntoIterator<Item = (&'a str, &'a str)>,
        now: DateTime<Utc>,
    ) -> Document {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    info!("No existing data; starting fresh");
                } else {
                    warn!(error = %e, "Cannot read data file; starting fresh");
                }
                return Document::fresh(providers, now);
            }
        };

        match serde_json::from_str::<Document>(&raw) {
            Ok(doc) => {
                info!(
                    providers = doc.providers.len(),
                    last_updated = %doc.last_updated,
                    "Loaded existing data"
                );
                doc
            }
            Err(e) => {
                let quarantine = self.sibling(&format!(".corrupt-{}", now.format("%Y%m%dT%H%M%SZ")));
                match fs::rename(&self.path, &quarantine).await {
                    Ok(()) => warn!(
                        error = %e,
                        moved_to = %quarantine.display(),
                        "Data file is not a valid document; set aside and starting fresh"
                    ),
                    Err(rename_err) => warn!(
                        error = %e,
                        rename_error = %rename_err,
                        "Data file is not a valid document; starting fresh"
                    ),
                }
                Document::fresh(providers, now)
            }
        }
    }

    /// Replace the stored document with `document`.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn save(&self, document: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(document)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = self.sibling(".tmp");
        fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        info!(last_updated = %document.last_updated, "Data saved");
        Ok(())
    }
}

fn create_lock_file(path: &Path) -> io::Result<StoreLock> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(StoreLock {
        path: path.to_path_buf(),
    })
}

fn is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}
