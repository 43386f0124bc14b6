use crate::model::FetchError;
use crate::parser::{self, Strategy};

use super::retry::RetryPolicy;
use super::traits::PriceSource;
use rand::seq::IndexedRandom;
use reqwest::Client;
use reqwest::header;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Markers of a bot-mitigation interstitial rather than product content.
const CHALLENGE_MARKERS: &[&str] = &[
    "captcha",
    "robot check",
    "are you a human",
    "access to this page has been denied",
    "unusual traffic",
];

/// Challenge interstitials are small; scanning the head of the page is enough.
const CHALLENGE_SCAN_BYTES: usize = 20_000;

pub struct PriceFetcher {
    client: Client,
    user_agent_pool: Vec<String>,
    request_delay: Duration,
    retry: RetryPolicy,
}

impl PriceFetcher {
    pub fn new(
        user_agent_pool: Vec<String>,
        request_delay: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            user_agent_pool,
            request_delay,
            retry,
        })
    }

    fn pick_user_agent(&self) -> &str {
        self.user_agent_pool
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or("Mozilla/5.0 (compatible; PriceTracker/1.0)")
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        // One delay per outbound request bounds the per-domain rate.
        sleep(self.request_delay).await;

        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, self.pick_user_agent())
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!("unexpected status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if let Some(marker) = challenge_marker(&body) {
            return Err(FetchError::Blocked(marker.to_string()));
        }
        Ok(body)
    }
}

pub(crate) fn challenge_marker(body: &str) -> Option<&'static str> {
    let head_end = body
        .char_indices()
        .map(|(i, _)| i)
        .find(|i| *i >= CHALLENGE_SCAN_BYTES)
        .unwrap_or(body.len());
    let head = body[..head_end].to_lowercase();
    CHALLENGE_MARKERS.iter().copied().find(|m| head.contains(m))
}

#[async_trait::async_trait]
impl PriceSource for PriceFetcher {
    async fn fetch_price(&self, url: &str) -> Result<f64, FetchError> {
        let strategy = Strategy::for_url(url);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_page(url).await {
                Ok(html) => {
                    debug!(url, ?strategy, "page fetched, extracting price");
                    return match parser::extract_price(&html, strategy) {
                        Some(price) => Ok(price),
                        None => Err(FetchError::Parse),
                    };
                }
                Err(e @ FetchError::Network(_)) if attempt < self.retry.max_attempts => {
                    let backoff = self.retry.backoff();
                    warn!(url, attempt, "fetch failed, retrying in {backoff:?}: {e}");
                    sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_pages_are_recognized() {
        let body = "<html><head><title>Robot Check</title></head><body></body></html>";
        assert_eq!(challenge_marker(body), Some("robot check"));

        let body = "<p>Please complete this CAPTCHA to continue.</p>";
        assert_eq!(challenge_marker(body), Some("captcha"));
    }

    #[test]
    fn product_pages_are_not_flagged() {
        let body = r#"<div class="a-price"><span class="a-offscreen">$12.99</span></div>"#;
        assert_eq!(challenge_marker(body), None);
    }

    #[test]
    fn markers_past_the_scan_window_are_ignored() {
        let body = format!("{}captcha", "x".repeat(CHALLENGE_SCAN_BYTES));
        assert_eq!(challenge_marker(&body), None);
    }

    #[test]
    fn user_agent_comes_from_the_pool() {
        let fetcher = PriceFetcher::new(
            vec!["agent-a".to_string(), "agent-b".to_string()],
            Duration::ZERO,
            RetryPolicy::default(),
        )
        .expect("client");
        for _ in 0..20 {
            let ua = fetcher.pick_user_agent();
            assert!(ua == "agent-a" || ua == "agent-b");
        }
    }
}
