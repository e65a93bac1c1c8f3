//! Market data feed.
//!
//! Shapes mirror the PredictIt `marketdata/all` document field-for-field so
//! the upstream JSON deserializes without adapters. Only `url` and each
//! contract's `bestBuyNoCost` feed the arbitrage model; the rest is carried
//! for logging and the dashboard.

pub mod predictit;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub use predictit::FeedClient;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed returned status {status}")]
    Status { status: u16 },
    #[error("failed to parse feed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level feed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub markets: Vec<Market>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub image: String,
    /// Empty when the feed omits it; such markets are never alerted on.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub time_stamp: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub date_end: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "price")]
    pub last_trade_price: f64,
    #[serde(default, deserialize_with = "price")]
    pub best_buy_yes_cost: f64,
    #[serde(default, deserialize_with = "price")]
    pub best_buy_no_cost: f64,
    #[serde(default, deserialize_with = "price")]
    pub best_sell_yes_cost: f64,
    #[serde(default, deserialize_with = "price")]
    pub best_sell_no_cost: f64,
    #[serde(default, deserialize_with = "price")]
    pub last_close_price: f64,
    #[serde(default)]
    pub display_order: i64,
}

/// PredictIt sends `null` for prices on contracts with an empty book.
fn price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

impl Contract {
    /// Convenience constructor for a contract known only by its "No" ask.
    pub fn with_no_cost(best_buy_no_cost: f64) -> Self {
        Self {
            best_buy_no_cost,
            ..Self::default()
        }
    }
}

impl Market {
    pub fn new(url: impl Into<String>, contracts: Vec<Contract>) -> Self {
        Self {
            url: url.into(),
            contracts,
            ..Self::default()
        }
    }
}

/// Anything that can produce the current market snapshot.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_markets(&self) -> Result<Vec<Market>, FeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "markets": [
            {
                "id": 7057,
                "name": "Which party will win the 2024 presidential election?",
                "shortName": "Which party wins the presidency?",
                "image": "https://az620379.vo.msecnd.net/images/Markets/7057.png",
                "url": "https://www.predictit.org/markets/detail/7057",
                "contracts": [
                    {
                        "id": 24794,
                        "dateEnd": "N/A",
                        "name": "Democratic",
                        "shortName": "Democratic",
                        "status": "Open",
                        "lastTradePrice": 0.52,
                        "bestBuyYesCost": 0.53,
                        "bestBuyNoCost": 0.48,
                        "bestSellYesCost": 0.52,
                        "bestSellNoCost": 0.47,
                        "lastClosePrice": 0.51,
                        "displayOrder": 0
                    },
                    {
                        "id": 24795,
                        "dateEnd": "N/A",
                        "name": "Libertarian",
                        "shortName": "Libertarian",
                        "status": "Open",
                        "lastTradePrice": 0.01,
                        "bestBuyYesCost": 0.02,
                        "bestBuyNoCost": null,
                        "bestSellYesCost": null,
                        "bestSellNoCost": null,
                        "lastClosePrice": 0.01,
                        "displayOrder": 0
                    }
                ],
                "timeStamp": "2024-03-01T10:00:00.0000000",
                "status": "Open"
            }
        ]
    }"#;

    #[test]
    fn test_parse_predictit_document() {
        let data: MarketData = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(data.markets.len(), 1);
        let market = &data.markets[0];
        assert_eq!(market.id, 7057);
        assert_eq!(market.url, "https://www.predictit.org/markets/detail/7057");
        assert_eq!(market.contracts.len(), 2);
        assert_eq!(market.contracts[0].best_buy_no_cost, 0.48);
        assert_eq!(market.contracts[0].short_name, "Democratic");
    }

    #[test]
    fn test_null_price_reads_as_zero() {
        let data: MarketData = serde_json::from_str(SAMPLE).unwrap();
        let libertarian = &data.markets[0].contracts[1];
        assert_eq!(libertarian.best_buy_no_cost, 0.0);
        assert_eq!(libertarian.best_sell_no_cost, 0.0);
    }

    #[test]
    fn test_missing_markets_key_is_empty() {
        let data: MarketData = serde_json::from_str("{}").unwrap();
        assert!(data.markets.is_empty());
    }

    #[test]
    fn test_market_without_url_does_not_reject_document() {
        let json = r#"{"markets": [
            {"id": 1, "contracts": [{"bestBuyNoCost": 0.5}]},
            {"id": 2, "url": "https://x/2", "contracts": []}
        ]}"#;
        let data: MarketData = serde_json::from_str(json).unwrap();
        assert_eq!(data.markets.len(), 2);
        assert_eq!(data.markets[0].url, "");
        assert_eq!(data.markets[1].url, "https://x/2");
    }
}
