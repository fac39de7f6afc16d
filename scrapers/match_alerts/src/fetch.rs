use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{future::Future, num::NonZeroU32, sync::Arc, time::Duration};
use tracing::debug;

use crate::config::ScrapingConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Source of scoring page HTML.
pub trait HtmlFetcher {
    fn fetch_html(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Fetches pages over HTTP, throttled to the configured request rate.
#[derive(Clone)]
pub struct WebFetcher {
    client: reqwest::Client,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl WebFetcher {
    pub fn new(config: &ScrapingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second)
                .ok_or_else(|| anyhow::anyhow!("Invalid requests_per_second value"))?,
        );

        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }
}

impl HtmlFetcher for WebFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        debug!("Fetching {}", url);

        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }
}
