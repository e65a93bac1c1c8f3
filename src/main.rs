use clap::Parser;
use negrisk::alerts::{dispatch_and_persist, ChangeDetector, Notifier};
use negrisk::arb::{evaluate_markets, NegRiskParams};
use negrisk::cache::{CacheEvent, SnapshotCache};
use negrisk::config::Config;
use negrisk::dashboard::{self, DashboardState};
use negrisk::feed::{FeedClient, MarketSource};
use negrisk::store::SnapshotStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Scan prediction markets for negative-risk arbitrage")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "negrisk.toml")]
    config: PathBuf,

    /// Compute and persist as usual but do not send the startup alert.
    #[arg(long)]
    no_notify: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    let _ = dotenvy::dotenv();

    let config_missing = !Path::new(&cli.config).exists();
    let config = if config_missing {
        Config::from_env()
    } else {
        Config::load(&cli.config)?
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("negrisk v{} starting", env!("CARGO_PKG_VERSION"));
    if config_missing {
        info!(path = %cli.config.display(), "no config file found, using env-only config");
    }

    let params = NegRiskParams::from(&config.strategy);
    let detector = ChangeDetector::new(config.alerts.min_percent_change);
    let store = SnapshotStore::new(&config.store.path);
    let notifier = Arc::new(Notifier::new(config.alerts.ntfy_url.clone())?);
    let feed = Arc::new(FeedClient::new(
        config.feed.url.clone(),
        Duration::from_secs(config.feed.timeout_secs),
    )?);

    // --- Startup pass (fatal on fetch failure: there is nothing to serve yet) ---
    info!(url = %feed.url(), "fetching markets");
    let markets = feed.fetch_markets().await?;
    let verdicts = evaluate_markets(&markets, &params);
    info!(
        markets = verdicts.len(),
        actionable = verdicts.iter().filter(|v| v.has_guaranteed_profit()).count(),
        stake = params.stake,
        fee_rate = params.fee_rate,
        "initial batch evaluated"
    );

    let startup_notifier = if cli.no_notify {
        None
    } else {
        Some(notifier.as_ref())
    };
    dispatch_and_persist(&verdicts, &detector, &store, startup_notifier).await;

    // --- Cache + background refresh ---
    let cache = Arc::new(SnapshotCache::with_batch(verdicts));
    let (cache_tx, mut cache_rx) = mpsc::unbounded_channel::<CacheEvent>();
    let source: Arc<dyn MarketSource> = feed.clone();
    cache
        .start(source, params, config.refresh_interval(), Some(cache_tx))
        .await;

    if config.alerts.on_refresh {
        info!("change alerts enabled for every refresh");
    }

    // --- Dashboard ---
    if config.dashboard.enabled {
        let dash_state = DashboardState {
            cache: cache.clone(),
        };
        let bind = config.dashboard.bind.clone();
        let static_dir = config.dashboard.static_dir.clone().map(PathBuf::from);
        tokio::spawn(async move {
            if let Err(e) = dashboard::serve(dash_state, &bind, static_dir).await {
                error!(error = %e, "dashboard server failed");
            }
        });
    } else {
        info!("dashboard disabled (set dashboard.enabled=true in config)");
    }

    info!("entering main event loop - press Ctrl+C to stop");

    loop {
        tokio::select! {
            Some(event) = cache_rx.recv() => {
                match event {
                    CacheEvent::Refreshed { verdicts } => {
                        if config.alerts.on_refresh {
                            let n = if cli.no_notify { None } else { Some(notifier.as_ref()) };
                            dispatch_and_persist(&verdicts, &detector, &store, n).await;
                        }
                    }
                    CacheEvent::RefreshFailed { error } => {
                        warn!(error = %error, "serving previous batch");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    cache.stop().await;
    info!("negrisk stopped");
    Ok(())
}
