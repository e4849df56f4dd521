use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::scrapers::types::{Page, SessionProfile};

/// Network seam for the fetcher.
///
/// A session is opened per attempt so cookies picked up during warm-up
/// carry over to the target request, and nothing leaks into the next attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open_session(&self, profile: &SessionProfile) -> Result<Box<dyn Session>>;
}

#[async_trait]
pub trait Session: Send + Sync {
    /// Issue a GET. `Err` is reserved for transport-level failures; any HTTP
    /// status comes back as a `Page`.
    async fn get(&self, url: &str) -> Result<Page>;
}

/// Time source for the backoff loop
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
