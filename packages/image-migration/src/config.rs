use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::RunnerConfig;

/// Migration configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub blob_storage_root: PathBuf,
    pub blob_public_base_url: String,
    pub runner: RunnerConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = RunnerConfig::default();

        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let blob_storage_root = PathBuf::from(
            lookup("BLOB_STORAGE_ROOT").unwrap_or_else(|| "./blob-storage".to_string()),
        );
        let blob_public_base_url = lookup("BLOB_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("file://{}", blob_storage_root.display()));

        let runner = RunnerConfig {
            batch_size: parse_or(&lookup, "MIGRATION_BATCH_SIZE", defaults.batch_size)?,
            batch_delay: Duration::from_millis(parse_or(
                &lookup,
                "MIGRATION_BATCH_DELAY_MS",
                defaults.batch_delay.as_millis() as u64,
            )?),
            page_timeout: Duration::from_secs(parse_or(
                &lookup,
                "MIGRATION_PAGE_TIMEOUT_SECS",
                defaults.page_timeout.as_secs(),
            )?),
            max_errors: parse_or(&lookup, "MIGRATION_MAX_ERRORS", defaults.max_errors)?,
            max_concurrent_uploads: parse_or(
                &lookup,
                "MIGRATION_MAX_CONCURRENT_UPLOADS",
                defaults.max_concurrent_uploads,
            )?,
            ..defaults
        };

        Ok(Self {
            database_url,
            blob_storage_root,
            blob_public_base_url,
            runner,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/ecg")]))
            .unwrap();

        assert_eq!(config.blob_storage_root, PathBuf::from("./blob-storage"));
        assert_eq!(config.blob_public_base_url, "file://./blob-storage");
        assert_eq!(config.runner.batch_size, 10);
        assert_eq!(config.runner.batch_delay, Duration::from_millis(100));
        assert_eq!(config.runner.max_errors, 10);
        assert_eq!(config.runner.sample_size, 5);
        assert_eq!(config.runner.estimate_floor, 100);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/ecg"),
            ("BLOB_STORAGE_ROOT", "/srv/blobs"),
            ("BLOB_PUBLIC_BASE_URL", "https://cdn.example.com/inspections"),
            ("MIGRATION_BATCH_SIZE", "25"),
            ("MIGRATION_BATCH_DELAY_MS", "0"),
            ("MIGRATION_PAGE_TIMEOUT_SECS", "5"),
            ("MIGRATION_MAX_ERRORS", "50"),
            ("MIGRATION_MAX_CONCURRENT_UPLOADS", "8"),
        ]))
        .unwrap();

        assert_eq!(config.blob_public_base_url, "https://cdn.example.com/inspections");
        assert_eq!(config.runner.batch_size, 25);
        assert_eq!(config.runner.batch_delay, Duration::ZERO);
        assert_eq!(config.runner.page_timeout, Duration::from_secs(5));
        assert_eq!(config.runner.max_errors, 50);
        assert_eq!(config.runner.max_concurrent_uploads, 8);
    }

    #[test]
    fn test_missing_database_url_fails() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_bad_number_names_the_key() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/ecg"),
            ("MIGRATION_MAX_ERRORS", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MIGRATION_MAX_ERRORS"));
    }
}
