//! Whole-feed evaluation.
//!
//! Each market is priced on its own rayon task. Results are collected into a
//! pre-sized vector where task *i* owns slot *i*, so output order always
//! matches input order no matter which task finishes first. The call returns
//! only after every task has completed.

use super::{evaluate_market, NegRiskParams, NegRiskVerdict};
use crate::feed::Market;
use rayon::prelude::*;
use tracing::debug;

/// Evaluate every market in feed order.
pub fn evaluate_markets(markets: &[Market], params: &NegRiskParams) -> Vec<NegRiskVerdict> {
    evaluate_markets_with(markets, |m| evaluate_market(m, params))
}

/// Same fan-out with a caller-supplied per-market evaluation.
pub fn evaluate_markets_with<F>(markets: &[Market], evaluate: F) -> Vec<NegRiskVerdict>
where
    F: Fn(&Market) -> NegRiskVerdict + Sync + Send,
{
    let mut verdicts = Vec::with_capacity(markets.len());
    markets.par_iter().map(evaluate).collect_into_vec(&mut verdicts);

    debug!(
        markets = markets.len(),
        actionable = verdicts.iter().filter(|v| v.has_guaranteed_profit()).count(),
        "batch evaluated"
    );

    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Contract;
    use rand::Rng;
    use std::time::Duration;

    fn markets(n: usize) -> Vec<Market> {
        (0..n)
            .map(|i| {
                let base = 0.05 + (i % 17) as f64 * 0.05;
                Market::new(
                    format!("https://example.com/markets/{i}"),
                    vec![
                        Contract::with_no_cost(base),
                        Contract::with_no_cost((base + 0.1).min(0.99)),
                        Contract::with_no_cost(0.0),
                    ],
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_feed() {
        assert!(evaluate_markets(&[], &NegRiskParams::default()).is_empty());
    }

    #[test]
    fn test_matches_sequential_evaluation() {
        let input = markets(64);
        let params = NegRiskParams::default();
        let batch = evaluate_markets(&input, &params);
        let sequential: Vec<_> = input.iter().map(|m| evaluate_market(m, &params)).collect();
        assert_eq!(batch, sequential);
    }

    #[test]
    fn test_order_preserved_under_random_completion() {
        let input = markets(48);
        let params = NegRiskParams::default();

        for _ in 0..5 {
            let batch = evaluate_markets_with(&input, |m| {
                let delay = rand::thread_rng().gen_range(0..3_000);
                std::thread::sleep(Duration::from_micros(delay));
                evaluate_market(m, &params)
            });

            assert_eq!(batch.len(), input.len());
            for (market, verdict) in input.iter().zip(&batch) {
                assert_eq!(market.url, verdict.url);
            }
        }
    }
}
