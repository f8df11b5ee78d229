//! Deduplication and merging of new updates into a provider's history.
//!
//! A history is newest-insertion-first and never longer than
//! [`MAX_RETAINED`]. Merging is deterministic and idempotent: merging the
//! same updates twice inserts nothing the second time.

use crate::models::Update;
use crate::utils::collapse_whitespace;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Maximum number of updates kept per provider.
pub const MAX_RETAINED: usize = 100;

/// Which fields make two updates "the same".
///
/// Both policies compare titles case-insensitively with whitespace collapsed.
/// `Title` additionally ignores the date, which avoids re-inserting an entry
/// whose date was recomputed differently on a later run, at the cost of
/// treating distinct updates that share a title as duplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    #[default]
    TitleAndDate,
    Title,
}

impl DedupPolicy {
    /// Whether `a` and `b` are the same update under this policy.
    pub fn same(self, a: &Update, b: &Update) -> bool {
        let titles_match = title_key(&a.title) == title_key(&b.title);
        match self {
            DedupPolicy::TitleAndDate => titles_match && a.date == b.date,
            DedupPolicy::Title => titles_match,
        }
    }
}

/// Lowercased title with every whitespace run collapsed to one space.
pub fn title_key(title: &str) -> String {
    collapse_whitespace(title).to_lowercase()
}

/// Whether `candidate` already appears in `history`.
pub fn exists(history: &[Update], candidate: &Update, policy: DedupPolicy) -> bool {
    history.iter().any(|u| policy.same(u, candidate))
}

/// Insert every update not already present at the front of `history`, in
/// the order given, then evict from the tail down to [`MAX_RETAINED`].
///
/// Each candidate is checked against the history as it grows, so duplicates
/// within `candidates` are dropped as well. Returns the number inserted.
pub fn merge(
    history: &mut Vec<Update>,
    candidates: impl IntoIterator<Item = Update>,
    policy: DedupPolicy,
) -> usize {
    let mut inserted = 0;
    for candidate in candidates {
        if !exists(history, &candidate, policy) {
            history.insert(0, candidate);
            inserted += 1;
        }
    }
    history.truncate(MAX_RETAINED);
    inserted
}
