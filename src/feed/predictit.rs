//! PredictIt market data fetcher.
//!
//! One GET against the all-markets endpoint per refresh cycle. The whole
//! document is buffered and parsed at once; any transport, status or parse
//! failure is returned to the caller, which decides whether it is fatal.

use super::{FeedError, Market, MarketData, MarketSource};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::debug;

pub struct FeedClient {
    url: String,
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the full feed document.
    pub async fn fetch(&self) -> Result<MarketData, FeedError> {
        let resp = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FeedError::Status {
                status: resp.status().as_u16(),
            });
        }

        let body = resp.bytes().await?;
        let data: MarketData = serde_json::from_slice(&body)?;

        debug!(
            url = %self.url,
            bytes = body.len(),
            markets = data.markets.len(),
            "fetched market data"
        );

        Ok(data)
    }
}

#[async_trait]
impl MarketSource for FeedClient {
    async fn fetch_markets(&self) -> Result<Vec<Market>, FeedError> {
        Ok(self.fetch().await?.markets)
    }
}
