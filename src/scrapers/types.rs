use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FetchFailure;
use crate::models::RawRecord;

/// Retry budget and jitter range for the fetch loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// `base_delay × jitter`, jitter drawn uniformly from `[jitter_min, jitter_max]`.
    pub fn delay_for(&self, rng: &mut fastrand::Rng) -> Duration {
        let span = (self.jitter_max - self.jitter_min).max(0.0);
        let jitter = (self.jitter_min + rng.f64() * span).max(0.0);
        // Saturate rather than overflow on absurd base delays.
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * jitter).unwrap_or(Duration::MAX)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
            jitter_min: 0.5,
            jitter_max: 2.0,
        }
    }
}

/// Where and how to fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchParams {
    /// Listing search URL; query parameters are opaque to the fetcher
    pub target_url: String,
    /// Site root visited first to pick up session cookies
    pub site_root: String,
    pub backoff: BackoffPolicy,
    /// Pause after a successful warm-up, drawn from this range (seconds)
    pub warm_up_pause: (f64, f64),
    /// Phrases that mean the site refused automated access
    pub block_markers: Vec<String>,
}

pub const DEFAULT_SITE_ROOT: &str = "https://www.rakumachi.jp/";
pub const DEFAULT_BLOCK_MARKER: &str = "アクセスができません";

impl FetchParams {
    pub fn new(target_url: impl Into<String>, backoff: BackoffPolicy) -> Self {
        Self {
            target_url: target_url.into(),
            site_root: DEFAULT_SITE_ROOT.to_string(),
            backoff,
            warm_up_pause: (1.0, 3.0),
            block_markers: vec![DEFAULT_BLOCK_MARKER.to_string()],
        }
    }
}

/// Browser identity presented for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProfile {
    pub user_agent: String,
    pub cookies: Vec<(String, String)>,
    pub referer: String,
}

/// A fetched response body with its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Provenance of the records a fetch returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    CachedFallback,
    SyntheticFallback,
}

#[derive(Debug, Clone)]
pub struct FetchReport {
    pub records: Vec<RawRecord>,
    pub source: DataSource,
    /// Target requests issued
    pub attempts: u32,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    pub fn is_fallback(&self) -> bool {
        self.source != DataSource::Live
    }
}
