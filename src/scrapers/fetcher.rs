use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::FetchFailure;
use crate::models::RawRecord;
use crate::scrapers::extractor::extract_listings;
use crate::scrapers::fallback::{synthetic_listings, ArtifactStore};
use crate::scrapers::traits::{Sleeper, TokioSleeper, Transport};
use crate::scrapers::types::{DataSource, FetchParams, FetchReport, SessionProfile};

/// Desktop browser identities rotated across attempts
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Drives the fetch/backoff loop for one listing search page.
///
/// Attempts are strictly sequential. Once the attempt budget is spent the
/// fetcher answers with cached or synthetic fallback data instead of an error.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    artifacts: ArtifactStore,
    rng: fastrand::Rng,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, artifacts: ArtifactStore) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            artifacts,
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = rng;
        self
    }

    pub async fn fetch(&mut self, params: &FetchParams) -> FetchReport {
        let max_attempts = params.backoff.max_attempts;
        let mut failures = Vec::new();
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = params.backoff.delay_for(&mut self.rng);
                info!(
                    "Waiting {:.2} seconds before retry {}/{}",
                    delay.as_secs_f64(),
                    attempt,
                    max_attempts
                );
                self.sleeper.sleep(delay).await;
            }

            attempts += 1;
            match self.attempt(params).await {
                Ok(records) => {
                    info!(count = records.len(), attempt, "Successfully extracted listings");
                    return FetchReport {
                        records,
                        source: DataSource::Live,
                        attempts,
                        failures,
                    };
                }
                Err(failure) => {
                    warn!(attempt, max_attempts, %failure, "Fetch attempt failed");
                    failures.push(failure);
                }
            }
        }

        error!(attempts, "Failed to scrape listings; falling back");
        self.fallback(attempts, failures).await
    }

    async fn attempt(&mut self, params: &FetchParams) -> Result<Vec<RawRecord>, FetchFailure> {
        let profile = self.session_profile(params);
        info!(url = %params.target_url, user_agent = %profile.user_agent, "Attempting to scrape URL");

        let session = self
            .transport
            .open_session(&profile)
            .await
            .map_err(|e| FetchFailure::Transport(format!("{e:#}")))?;

        // Warm-up only seeds cookies; its outcome does not count.
        match session.get(&params.site_root).await {
            Ok(page) => {
                info!(status = page.status, "Visited site root");
                self.warm_up_pause(params).await;
            }
            Err(e) => warn!(error = %e, "Failed to visit site root"),
        }

        let page = session
            .get(&params.target_url)
            .await
            .map_err(|e| FetchFailure::Transport(format!("{e:#}")))?;

        if !page.is_success() {
            return Err(FetchFailure::Blocked {
                status: page.status,
                marker: None,
            });
        }

        if let Err(e) = self.artifacts.save_last_response(&page.body).await {
            warn!(error = %e, "Could not save response HTML");
        }

        if let Some(marker) = params
            .block_markers
            .iter()
            .find(|marker| page.body.contains(marker.as_str()))
        {
            return Err(FetchFailure::Blocked {
                status: page.status,
                marker: Some(marker.clone()),
            });
        }

        let records = extract_listings(&page.body, &params.target_url);
        if records.is_empty() {
            return Err(FetchFailure::ExtractionEmpty);
        }
        Ok(records)
    }

    fn session_profile(&mut self, params: &FetchParams) -> SessionProfile {
        let user_agent = USER_AGENTS[self.rng.usize(..USER_AGENTS.len())].to_string();
        let session_id = self.rng.u32(1_000_000..=9_999_999);

        SessionProfile {
            user_agent,
            cookies: vec![
                ("visited".to_string(), "1".to_string()),
                ("session_id".to_string(), session_id.to_string()),
            ],
            referer: params.site_root.clone(),
        }
    }

    async fn warm_up_pause(&mut self, params: &FetchParams) {
        let (min, max) = params.warm_up_pause;
        if max <= 0.0 {
            return;
        }
        let secs = min + self.rng.f64() * (max - min).max(0.0);
        debug!(secs, "Pausing after warm-up");
        self.sleeper.sleep(Duration::from_secs_f64(secs.max(0.0))).await;
    }

    async fn fallback(&self, attempts: u32, failures: Vec<FetchFailure>) -> FetchReport {
        if let Some(records) = self.artifacts.load_fallback().await {
            info!(count = records.len(), "Using cached fallback data since scraping failed");
            return FetchReport {
                records,
                source: DataSource::CachedFallback,
                attempts,
                failures,
            };
        }

        let records = synthetic_listings();
        if let Err(e) = self.artifacts.save_fallback(&records).await {
            warn!(error = %e, "Could not cache synthetic fallback data");
        }
        FetchReport {
            records,
            source: DataSource::SyntheticFallback,
            attempts,
            failures,
        }
    }
}
