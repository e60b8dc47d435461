//! Configuration file and settings resolution
//!
//! Precedence: command-line flag, then `SHELF_*` environment variable (both
//! handled by clap), then the TOML file, then built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use shelf_core::TieBreak;
use shelf_sync::{RetryPolicy, SyncConfig, DEFAULT_PULL_INTERVAL};

/// Default replica database, relative to the working directory
pub const DEFAULT_DB: &str = "shelf.db";

/// Default log level for an interactive tool
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Contents of a `shelf.toml`
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub db: Option<PathBuf>,
    pub log_level: Option<String>,
    pub remote: RemoteSection,
    pub sync: SyncSection,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSection {
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    pub debounce_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub pull_interval_secs: Option<u64>,
    pub tie_break: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub db: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub tie_break: Option<TieBreak>,
    pub log_level: Option<String>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub db: PathBuf,
    pub log_level: String,
    /// Period for `shelf watch` when not given explicitly
    pub pull_interval: Duration,
    pub sync: SyncConfig,
}

impl Settings {
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let mut sync = SyncConfig::new();

        if let Some(endpoint) = overrides.endpoint.or(file.remote.endpoint) {
            sync = sync.with_endpoint(endpoint);
        }
        if let Some(key) = overrides.key.or(file.remote.key) {
            sync = sync.with_key(key);
        }
        if let Some(secs) = overrides.timeout_secs.or(file.remote.timeout_secs) {
            sync = sync.with_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = file.sync.debounce_ms {
            sync = sync.with_debounce(Duration::from_millis(ms));
        }

        let default_retry = RetryPolicy::default();
        let attempts = file.sync.retry_attempts.unwrap_or(default_retry.max_attempts);
        let delay = file
            .sync
            .retry_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(RetryPolicy::DEFAULT_DELAY);
        sync = sync.with_retry(RetryPolicy::fixed(attempts, delay));

        let tie_break = match (overrides.tie_break, file.sync.tie_break) {
            (Some(rule), _) => rule,
            (None, Some(text)) => text.parse().map_err(|e: String| anyhow!(e))?,
            (None, None) => TieBreak::default(),
        };
        sync = sync.with_tie_break(tie_break);

        let pull_interval = file
            .sync
            .pull_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PULL_INTERVAL);

        Ok(Self {
            db: overrides
                .db
                .or(file.db)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB)),
            log_level: overrides
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            pull_interval,
            sync,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(Overrides::default(), FileConfig::default()).unwrap();
        assert_eq!(settings.db, PathBuf::from("shelf.db"));
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.pull_interval, Duration::from_secs(30));
        assert!(!settings.sync.is_online());
        assert_eq!(settings.sync.retry, RetryPolicy::default());
    }

    #[test]
    fn test_file_values() {
        let file = FileConfig::parse(
            r#"
            db = "/var/lib/shelf/replica.db"

            [remote]
            endpoint = "https://example.com/exec"
            key = "s3cret"
            timeout_secs = 5

            [sync]
            debounce_ms = 250
            retry_attempts = 3
            retry_delay_ms = 100
            pull_interval_secs = 60
            tie_break = "local"
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(Overrides::default(), file).unwrap();
        assert_eq!(settings.db, PathBuf::from("/var/lib/shelf/replica.db"));
        assert_eq!(settings.sync.endpoint.as_deref(), Some("https://example.com/exec"));
        assert_eq!(settings.sync.key.as_deref(), Some("s3cret"));
        assert_eq!(settings.sync.timeout, Duration::from_secs(5));
        assert_eq!(settings.sync.debounce, Duration::from_millis(250));
        assert_eq!(
            settings.sync.retry,
            RetryPolicy::fixed(3, Duration::from_millis(100))
        );
        assert_eq!(settings.pull_interval, Duration::from_secs(60));
        assert_eq!(settings.sync.tie_break, TieBreak::Local);
    }

    #[test]
    fn test_flags_override_file() {
        let file = FileConfig::parse(
            r#"
            log_level = "debug"
            [remote]
            endpoint = "https://file.example.com"
            [sync]
            tie_break = "local"
            "#,
        )
        .unwrap();
        let overrides = Overrides {
            endpoint: Some("https://flag.example.com".into()),
            tie_break: Some(TieBreak::Remote),
            db: Some(PathBuf::from("other.db")),
            ..Default::default()
        };

        let settings = Settings::resolve(overrides, file).unwrap();
        assert_eq!(settings.sync.endpoint.as_deref(), Some("https://flag.example.com"));
        assert_eq!(settings.sync.tie_break, TieBreak::Remote);
        assert_eq!(settings.db, PathBuf::from("other.db"));
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(FileConfig::parse("unknown = 1").is_err());

        let file = FileConfig::parse("[sync]\ntie_break = \"newest\"").unwrap();
        assert!(Settings::resolve(Overrides::default(), file).is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.toml");
        std::fs::write(&path, "[remote]\nendpoint = \"https://example.com\"\n").unwrap();

        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.remote.endpoint.as_deref(), Some("https://example.com"));
        assert!(FileConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
