//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::scrapers::types::{BackoffPolicy, FetchParams, DEFAULT_BLOCK_MARKER, DEFAULT_SITE_ROOT};

/// Osaka-city income properties under 5,000万円, one-room layouts excluded.
pub const DEFAULT_TARGET_URL: &str = "https://www.rakumachi.jp/syuuekibukken/area/prefecture/dimAll/?area%5B%5D=27102&area%5B%5D=27103&area%5B%5D=27104&area%5B%5D=27106&area%5B%5D=27107&area%5B%5D=27108&area%5B%5D=27109&area%5B%5D=27111&area%5B%5D=27113&area%5B%5D=27114&area%5B%5D=27115&area%5B%5D=27116&area%5B%5D=27117&area%5B%5D=27118&area%5B%5D=27119&area%5B%5D=27120&area%5B%5D=27121&area%5B%5D=27122&area%5B%5D=27123&area%5B%5D=27124&area%5B%5D=27125&area%5B%5D=27126&area%5B%5D=27127&area%5B%5D=27128&newly=&price_from=&price_to=500&gross_from=&gross_to=&dim%5B%5D=1004&year_from=&year_to=&b_area_from=&b_area_to=&houses_ge=&houses_le=&layout%5B%5D=5&layout%5B%5D=6&layout%5B%5D=7&layout%5B%5D=8&layout%5B%5D=9&layout%5B%5D=10&layout%5B%5D=11&layout%5B%5D=12&layout%5B%5D=13&layout%5B%5D=14&min=10&l_area_from=&l_area_to=&own=1&keyword=";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/rent_search.db";

/// Directory for `last_response.html` and the fallback cache.
pub const DEFAULT_ARTIFACTS_DIR: &str = ".";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub const DEFAULT_RETRY_DELAY_SECS: f64 = 10.0;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutConfig {
    pub target_url: String,
    pub site_root: String,
    pub database_url: String,
    pub artifacts_dir: PathBuf,
    pub max_attempts: u32,
    pub retry_delay_secs: f64,
    pub request_timeout_secs: u64,
    pub block_markers: Vec<String>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            site_root: DEFAULT_SITE_ROOT.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            block_markers: vec![DEFAULT_BLOCK_MARKER.to_string()],
        }
    }
}

impl ScoutConfig {
    /// Load `.env`, then apply `SCOUT_*` environment variables over the defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("SCOUT_TARGET_URL") {
            config.target_url = v;
        }
        if let Some(v) = lookup("SCOUT_SITE_ROOT") {
            config.site_root = v;
        }
        if let Some(v) = lookup("SCOUT_DATABASE_URL") {
            config.database_url = v;
        }
        if let Some(v) = lookup("SCOUT_ARTIFACTS_DIR") {
            config.artifacts_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SCOUT_MAX_ATTEMPTS") {
            config.max_attempts = v
                .parse()
                .with_context(|| format!("Invalid SCOUT_MAX_ATTEMPTS: {v}"))?;
        }
        if let Some(v) = lookup("SCOUT_RETRY_DELAY_SECS") {
            config.retry_delay_secs = v
                .parse()
                .with_context(|| format!("Invalid SCOUT_RETRY_DELAY_SECS: {v}"))?;
        }
        if let Some(v) = lookup("SCOUT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = v
                .parse()
                .with_context(|| format!("Invalid SCOUT_REQUEST_TIMEOUT_SECS: {v}"))?;
        }
        if let Some(v) = lookup("SCOUT_BLOCK_MARKERS") {
            config.block_markers = v
                .split('|')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if Duration::try_from_secs_f64(self.retry_delay_secs).is_err() {
            anyhow::bail!(
                "Retry delay must be a non-negative number of seconds, got {}",
                self.retry_delay_secs
            );
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than 0");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fetch_params(&self) -> FetchParams {
        let backoff = BackoffPolicy::new(
            self.max_attempts,
            Duration::try_from_secs_f64(self.retry_delay_secs).unwrap_or(Duration::MAX),
        );
        let mut params = FetchParams::new(self.target_url.clone(), backoff);
        params.site_root = self.site_root.clone();
        params.block_markers = self.block_markers.clone();
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = ScoutConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);

        let params = config.fetch_params();
        assert_eq!(params.backoff.base_delay, Duration::from_secs(10));
        assert_eq!(params.block_markers, vec![DEFAULT_BLOCK_MARKER.to_string()]);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ScoutConfig::from_lookup(lookup(&[
            ("SCOUT_MAX_ATTEMPTS", "2"),
            ("SCOUT_RETRY_DELAY_SECS", "0.5"),
            ("SCOUT_DATABASE_URL", "sqlite::memory:"),
            ("SCOUT_BLOCK_MARKERS", "アクセスができません | Access Denied"),
        ]))
        .unwrap();

        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.fetch_params().backoff.base_delay, Duration::from_millis(500));
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.block_markers.len(), 2);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(ScoutConfig::from_lookup(lookup(&[("SCOUT_MAX_ATTEMPTS", "many")])).is_err());
        assert!(ScoutConfig::from_lookup(lookup(&[("SCOUT_RETRY_DELAY_SECS", "-1")])).is_err());
        assert!(ScoutConfig::from_lookup(lookup(&[("SCOUT_RETRY_DELAY_SECS", "1e20")])).is_err());
        assert!(ScoutConfig::from_lookup(lookup(&[("SCOUT_RETRY_DELAY_SECS", "NaN")])).is_err());
    }

    #[test]
    fn validated_config_builds_fetch_params() {
        let mut config = ScoutConfig::default();
        config.retry_delay_secs = 1e20;
        assert!(config.validate().is_err());

        config.retry_delay_secs = 86_400.0;
        config.validate().unwrap();
        assert_eq!(config.fetch_params().backoff.base_delay, Duration::from_secs(86_400));
    }
}
