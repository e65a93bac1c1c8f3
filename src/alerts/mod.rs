//! Change-triggered profit alerts.
//!
//! A market alerts when its worst-case profit is non-negative and it either
//! has no earlier verdict to compare against or its least profit moved by
//! more than the relative threshold since that verdict. Earlier verdicts are
//! matched by market URL, so markets that were added, removed or reordered
//! between cycles are compared against themselves only.

pub mod notifier;

use crate::arb::NegRiskVerdict;
use crate::store::SnapshotStore;
use std::collections::HashMap;
use tracing::{error, info};

pub use notifier::{Notifier, NotifyError};

/// Default relative change in least profit that re-triggers an alert.
pub const DEFAULT_MIN_PERCENT_CHANGE: f64 = 0.02;

#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    threshold: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PERCENT_CHANGE)
    }
}

impl ChangeDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Decide a single market. `previous` is that market's last verdict, if any.
    pub fn should_alert(&self, current: &NegRiskVerdict, previous: Option<&NegRiskVerdict>) -> bool {
        let Some(profit) = current.least_profit else {
            return false;
        };
        if profit < 0.0 || profit.is_nan() {
            return false;
        }

        match previous.and_then(|p| p.least_profit) {
            None => true,
            Some(prev) => {
                profit > prev * (1.0 + self.threshold) || profit < prev * (1.0 - self.threshold)
            }
        }
    }

    /// Verdicts from `current` that should alert, in batch order.
    pub fn changed<'a>(
        &self,
        current: &'a [NegRiskVerdict],
        previous: Option<&[NegRiskVerdict]>,
    ) -> Vec<&'a NegRiskVerdict> {
        let by_url: HashMap<&str, &NegRiskVerdict> = previous
            .unwrap_or_default()
            .iter()
            .filter(|v| !v.url.is_empty())
            .map(|v| (v.url.as_str(), v))
            .collect();

        current
            .iter()
            .filter(|v| !v.url.is_empty())
            .filter(|v| self.should_alert(v, by_url.get(v.url.as_str()).copied()))
            .collect()
    }

    /// Render the alert text; empty when nothing qualifies.
    pub fn build_message(
        &self,
        current: &[NegRiskVerdict],
        previous: Option<&[NegRiskVerdict]>,
    ) -> String {
        let changed = self.changed(current, previous);

        for v in &changed {
            info!(
                url = %v.url,
                least_profit = ?v.least_profit,
                max_profit = ?v.max_profit,
                contracts = v.contracts_to_buy,
                "guaranteed profit"
            );
        }

        changed
            .iter()
            .map(|v| format_alert_line(v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One alert line: `<url> has guaranteed profit: <least_profit:.2>`.
pub fn format_alert_line(verdict: &NegRiskVerdict) -> String {
    format!(
        "{} has guaranteed profit: {:.2}",
        verdict.url,
        verdict.least_profit.unwrap_or_default()
    )
}

/// Compare `verdicts` against the stored batch, send the alert when any line
/// qualifies, then store `verdicts` as the next baseline.
///
/// Returns the alert text (empty when nothing qualified). Delivery and write
/// failures are logged only. With no `notifier` the alert is computed and
/// logged but not sent.
pub async fn dispatch_and_persist(
    verdicts: &[NegRiskVerdict],
    detector: &ChangeDetector,
    store: &SnapshotStore,
    notifier: Option<&Notifier>,
) -> String {
    let previous = store.load_previous().await;
    let message = detector.build_message(verdicts, previous.as_deref());

    match notifier {
        Some(n) => match n.send(&message).await {
            Ok(true) => {}
            Ok(false) => info!("no guaranteed-profit changes to report"),
            Err(e) => error!(error = %e, "failed to deliver alert"),
        },
        None if !message.is_empty() => {
            info!(lines = message.lines().count(), "notifications suppressed")
        }
        None => {}
    }

    if let Err(e) = store.save(verdicts).await {
        error!(error = %e, "failed to persist snapshot");
    }

    message
}
