use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, DNT, REFERER,
    UPGRADE_INSECURE_REQUESTS,
};
use reqwest::{Client, Url};
use tracing::debug;

use crate::scrapers::traits::{Session, Transport};
use crate::scrapers::types::{Page, SessionProfile};

/// `reqwest`-backed transport; every session gets its own client and cookie jar
#[derive(Debug, Clone)]
pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open_session(&self, profile: &SessionProfile) -> Result<Box<dyn Session>> {
        let root = Url::parse(&profile.referer)
            .with_context(|| format!("Invalid site root: {}", profile.referer))?;

        let jar = Arc::new(Jar::default());
        for (name, value) in &profile.cookies {
            jar.add_cookie_str(&format!("{name}={value}"), &root);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja,en-US;q=0.7,en;q=0.3"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(&profile.referer).context("Invalid referer")?,
        );
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        headers.insert(DNT, HeaderValue::from_static("1"));

        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(profile.user_agent.as_str())
            .default_headers(headers)
            .cookie_provider(jar)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Box::new(HttpSession { client }))
    }
}

struct HttpSession {
    client: Client,
}

#[async_trait]
impl Session for HttpSession {
    async fn get(&self, url: &str) -> Result<Page> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        debug!(status, bytes = body.len(), "Downloaded page");
        Ok(Page { status, body })
    }
}
