//! Negative-risk arbitrage model.
//!
//! In a multi-outcome market exactly one contract resolves YES, so a basket
//! holding one "No" share on every outcome pays out on all but one leg. When
//! the "No" asks are cheap enough, that basket is profitable whichever outcome
//! wins. This module prices the basket for a fixed stake sized against the
//! most expensive leg and reports the worst- and best-case net profit.

pub mod batch;

use crate::config::StrategyConfig;
use crate::feed::Market;
use serde::{Deserialize, Serialize};

pub use batch::{evaluate_markets, evaluate_markets_with};

/// Sizing and fee inputs for the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegRiskParams {
    /// Total USD committed, sized against the most expensive "No" ask.
    pub stake: f64,
    /// Fee taken from winnings.
    pub fee_rate: f64,
    /// Asks below this are treated as stale placeholders.
    pub min_qualifying_price: f64,
}

impl Default for NegRiskParams {
    fn default() -> Self {
        Self {
            stake: 850.0,
            fee_rate: 0.10,
            min_qualifying_price: 0.01,
        }
    }
}

impl From<&StrategyConfig> for NegRiskParams {
    fn from(cfg: &StrategyConfig) -> Self {
        Self {
            stake: cfg.stake,
            fee_rate: cfg.fee_rate,
            min_qualifying_price: cfg.min_qualifying_price,
        }
    }
}

/// Profitability summary for one market at one point in time.
///
/// Price bounds and profits are `None` when the market has no positive
/// "No" ask at all; such a verdict is never actionable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegRiskVerdict {
    pub contracts_to_buy: u64,
    pub lowest_no_price: Option<f64>,
    pub highest_no_price: Option<f64>,
    pub neg_risk_sum: f64,
    pub least_profit: Option<f64>,
    pub max_profit: Option<f64>,
    pub url: String,
}

impl NegRiskVerdict {
    fn degenerate(url: &str, neg_risk_sum: f64) -> Self {
        Self {
            contracts_to_buy: 0,
            lowest_no_price: None,
            highest_no_price: None,
            neg_risk_sum,
            least_profit: None,
            max_profit: None,
            url: url.to_string(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.least_profit.is_none()
    }

    /// True when the worst case still breaks even or better.
    pub fn has_guaranteed_profit(&self) -> bool {
        matches!(self.least_profit, Some(p) if p >= 0.0)
    }
}

/// Price the "buy every No" basket for one market. Infallible and pure.
pub fn evaluate_market(market: &Market, params: &NegRiskParams) -> NegRiskVerdict {
    let mut highest: Option<f64> = None;
    let mut lowest: Option<f64> = None;
    let mut neg_risk_sum = 0.0;

    for contract in &market.contracts {
        let price = contract.best_buy_no_cost;

        // Zero (or NaN) asks mean "no book", not a free leg.
        if price > 0.0 {
            highest = Some(highest.map_or(price, |h: f64| h.max(price)));
            lowest = Some(lowest.map_or(price, |l: f64| l.min(price)));
        }

        if price >= params.min_qualifying_price {
            neg_risk_sum += 1.0 - price;
        }
    }

    let (Some(highest), Some(lowest)) = (highest, lowest) else {
        return NegRiskVerdict::degenerate(&market.url, neg_risk_sum);
    };

    let contracts_count = params.stake / highest;
    if !contracts_count.is_finite() {
        return NegRiskVerdict::degenerate(&market.url, neg_risk_sum);
    }

    let payout_rate = 1.0 - params.fee_rate;
    let highest_loss = highest * contracts_count;
    let lowest_loss = lowest * contracts_count;

    // Worst case: the most expensive leg is the one that loses.
    let least_profit =
        (neg_risk_sum - (1.0 - highest)) * contracts_count * payout_rate - highest_loss;
    let max_profit = (neg_risk_sum - (1.0 - lowest)) * contracts_count * payout_rate - lowest_loss;

    NegRiskVerdict {
        contracts_to_buy: contracts_count as u64,
        lowest_no_price: Some(lowest),
        highest_no_price: Some(highest),
        neg_risk_sum,
        least_profit: Some(least_profit),
        max_profit: Some(max_profit),
        url: market.url.clone(),
    }
}
