//! Refreshing verdict cache.
//!
//! Holds the most recent verdict batch behind an `Arc` swap. A refresh runs
//! the whole pipeline (fetch, evaluate) without holding any lock and only
//! takes the write lock to swap the finished batch in, so readers see either
//! the previous batch or the new one and never wait on the network.
//!
//! A failed refresh leaves the current batch untouched.

use crate::arb::{evaluate_markets, NegRiskParams, NegRiskVerdict};
use crate::feed::{FeedError, MarketSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A complete batch plus when it was produced.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub verdicts: Arc<Vec<NegRiskVerdict>>,
    /// `None` until the first batch is stored.
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Refresh health counters, served by the dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStats {
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Events emitted by the background refresh loop.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Refreshed { verdicts: Arc<Vec<NegRiskVerdict>> },
    RefreshFailed { error: String },
}

struct RefreshWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct SnapshotCache {
    current: RwLock<Arc<CacheSnapshot>>,
    stats: Mutex<RefreshStats>,
    worker: Mutex<Option<RefreshWorker>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    /// An empty cache; `read()` returns an empty batch until the first replace.
    pub fn new() -> Self {
        Self::from_snapshot(CacheSnapshot::default())
    }

    /// A cache seeded with an already computed batch.
    pub fn with_batch(verdicts: Vec<NegRiskVerdict>) -> Self {
        Self::from_snapshot(CacheSnapshot {
            verdicts: Arc::new(verdicts),
            refreshed_at: Some(Utc::now()),
        })
    }

    fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            stats: Mutex::new(RefreshStats::default()),
            worker: Mutex::new(None),
        }
    }

    /// The current batch.
    pub async fn read(&self) -> Arc<Vec<NegRiskVerdict>> {
        self.current.read().await.verdicts.clone()
    }

    /// The current batch with its timestamp.
    pub async fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.current.read().await.clone()
    }

    pub async fn stats(&self) -> RefreshStats {
        self.stats.lock().await.clone()
    }

    /// Swap in a whole new batch.
    pub async fn replace(&self, verdicts: Vec<NegRiskVerdict>) -> Arc<Vec<NegRiskVerdict>> {
        let verdicts = Arc::new(verdicts);
        let snapshot = Arc::new(CacheSnapshot {
            verdicts: verdicts.clone(),
            refreshed_at: Some(Utc::now()),
        });
        *self.current.write().await = snapshot;
        verdicts
    }

    /// Run one fetch → evaluate → replace cycle.
    pub async fn refresh(
        &self,
        source: &dyn MarketSource,
        params: &NegRiskParams,
    ) -> Result<Arc<Vec<NegRiskVerdict>>, FeedError> {
        let markets = match source.fetch_markets().await {
            Ok(m) => m,
            Err(e) => {
                let mut stats = self.stats.lock().await;
                stats.failures += 1;
                stats.consecutive_failures += 1;
                stats.last_error = Some(e.to_string());
                stats.last_failure_at = Some(Utc::now());
                return Err(e);
            }
        };

        let verdicts = self.replace(evaluate_markets(&markets, params)).await;

        let mut stats = self.stats.lock().await;
        stats.successes += 1;
        stats.consecutive_failures = 0;

        Ok(verdicts)
    }

    /// Start the background refresh loop. The first cycle runs one `period`
    /// after the call, since callers seed the cache at startup.
    pub async fn start(
        self: &Arc<Self>,
        source: Arc<dyn MarketSource>,
        params: NegRiskParams,
        period: Duration,
        events: Option<mpsc::UnboundedSender<CacheEvent>>,
    ) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            warn!("refresh loop already running");
            return;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move {
            cache
                .run_refresh_loop(source, params, period, events, shutdown_rx)
                .await;
        });

        info!(interval_secs = period.as_secs_f64(), "refresh loop started");
        *worker = Some(RefreshWorker { shutdown, handle });
    }

    /// Stop the refresh loop, letting an in-flight cycle finish.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.handle.await {
            warn!(error = %e, "refresh loop ended abnormally");
        }
        info!("refresh loop stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    async fn run_refresh_loop(
        &self,
        source: Arc<dyn MarketSource>,
        params: NegRiskParams,
        period: Duration,
        events: Option<mpsc::UnboundedSender<CacheEvent>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            let event = match self.refresh(source.as_ref(), &params).await {
                Ok(verdicts) => {
                    info!(
                        markets = verdicts.len(),
                        actionable = verdicts.iter().filter(|v| v.has_guaranteed_profit()).count(),
                        "cache refreshed"
                    );
                    CacheEvent::Refreshed { verdicts }
                }
                Err(e) => {
                    warn!(error = %e, "refresh failed, keeping last good batch");
                    CacheEvent::RefreshFailed {
                        error: e.to_string(),
                    }
                }
            };

            if let Some(ref tx) = events {
                if tx.send(event).is_err() {
                    debug!("cache event receiver dropped");
                }
            }
        }
    }
}
