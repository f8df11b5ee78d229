//! Command-line interface definitions for the changelog tracker.
//!
//! Every option can also be supplied through an environment variable, which
//! is how scheduled deployments configure it.

use crate::fetch::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::history::DedupPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for one tracking run.
///
/// # Examples
///
/// ```sh
/// # Built-in providers, default data file
/// changelog_tracker
///
/// # Custom providers, title-only dedup, faster politeness delay
/// changelog_tracker --providers providers.yaml --dedup title --delay-ms 250
///
/// # Refresh a single provider
/// changelog_tracker --only matomo
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON document holding every provider's history
    #[arg(short, long, env = "TRACKER_DATA_FILE", default_value = "data/updates.json")]
    pub data_file: PathBuf,

    /// YAML providers file; the built-in providers are used when omitted
    #[arg(short, long, env = "TRACKER_PROVIDERS")]
    pub providers: Option<PathBuf>,

    /// Pause between provider requests, in milliseconds
    #[arg(long, env = "TRACKER_DELAY_MS", default_value_t = 1000)]
    pub delay_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, env = "TRACKER_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[arg(long, env = "TRACKER_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Which fields identify an already-recorded update
    #[arg(long, env = "TRACKER_DEDUP", value_enum, default_value_t = DedupPolicy::TitleAndDate)]
    pub dedup: DedupPolicy,

    /// Only process these provider ids (repeatable)
    #[arg(long = "only", value_name = "ID")]
    pub only: Vec<String>,
}

impl Cli {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["changelog_tracker"]);
        assert_eq!(cli.data_file, PathBuf::from("data/updates.json"));
        assert!(cli.providers.is_none());
        assert_eq!(cli.delay(), Duration::from_secs(1));
        assert_eq!(cli.timeout(), Duration::from_secs(15));
        assert_eq!(cli.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cli.dedup, DedupPolicy::TitleAndDate);
        assert!(cli.only.is_empty());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "changelog_tracker",
            "-d",
            "/tmp/updates.json",
            "-p",
            "providers.yaml",
            "--dedup",
            "title",
            "--delay-ms",
            "0",
            "--only",
            "matomo",
            "--only",
            "piwik-pro",
        ]);

        assert_eq!(cli.data_file, PathBuf::from("/tmp/updates.json"));
        assert_eq!(cli.providers, Some(PathBuf::from("providers.yaml")));
        assert_eq!(cli.dedup, DedupPolicy::Title);
        assert_eq!(cli.delay(), Duration::ZERO);
        assert_eq!(cli.only, vec!["matomo", "piwik-pro"]);
    }
}
