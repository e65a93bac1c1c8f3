//! Axum read-only view over the verdict cache.
//!
//! Provides:
//!   GET /                 → HTML table of the cached batch (auto-refresh 30s),
//!                           or the configured static directory
//!   GET /api/negrisk      → JSON array of verdicts in feed order
//!   GET /api/status       → JSON refresh health

use crate::cache::SnapshotCache;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;

/// Shared state for the dashboard routes.
#[derive(Clone)]
pub struct DashboardState {
    pub cache: Arc<SnapshotCache>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    markets: usize,
    actionable: usize,
    degenerate: usize,
    refreshed_at: Option<String>,
    refresh_successes: u64,
    refresh_failures: u64,
    consecutive_failures: u32,
    last_error: Option<String>,
    last_failure_at: Option<String>,
}

/// Build the Axum router. With `static_dir` set, unmatched paths are served
/// from that directory instead of the built-in HTML page.
pub fn build_router(state: DashboardState, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/api/negrisk", get(api_negrisk))
        .route("/api/status", get(api_status));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.route("/", get(dashboard_html)),
    };

    router.with_state(state)
}

/// Start the dashboard server.
pub async fn serve(
    state: DashboardState,
    bind_addr: &str,
    static_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let app = build_router(state, static_dir);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "dashboard listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// --- API Handlers ---

async fn api_negrisk(State(state): State<DashboardState>) -> impl IntoResponse {
    let verdicts = state.cache.read().await;
    Json((*verdicts).clone())
}

async fn api_status(State(state): State<DashboardState>) -> impl IntoResponse {
    let snap = state.cache.snapshot().await;
    let stats = state.cache.stats().await;

    Json(StatusResponse {
        markets: snap.verdicts.len(),
        actionable: snap
            .verdicts
            .iter()
            .filter(|v| v.has_guaranteed_profit())
            .count(),
        degenerate: snap.verdicts.iter().filter(|v| v.is_degenerate()).count(),
        refreshed_at: snap.refreshed_at.map(|t| t.to_rfc3339()),
        refresh_successes: stats.successes,
        refresh_failures: stats.failures,
        consecutive_failures: stats.consecutive_failures,
        last_error: stats.last_error,
        last_failure_at: stats.last_failure_at.map(|t| t.to_rfc3339()),
    })
}

// --- HTML Dashboard ---

fn fmt_price(p: Option<f64>) -> String {
    p.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn fmt_usd(p: Option<f64>) -> String {
    p.map(|v| format!("${:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn dashboard_html(State(state): State<DashboardState>) -> Html<String> {
    let snap = state.cache.snapshot().await;
    let stats = state.cache.stats().await;

    let mut ranked: Vec<_> = snap.verdicts.iter().collect();
    ranked.sort_by(|a, b| {
        let a = a.least_profit.unwrap_or(f64::NEG_INFINITY);
        let b = b.least_profit.unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });

    let rows: String = if ranked.is_empty() {
        "<tr><td colspan=\"7\" style=\"text-align:center;color:#666\">No markets cached yet</td></tr>"
            .to_string()
    } else {
        ranked
            .iter()
            .map(|v| {
                let color = match v.least_profit {
                    Some(p) if p >= 0.0 => "#2ecc71",
                    Some(_) => "#8b949e",
                    None => "#484f58",
                };
                let url = escape(&v.url);
                format!(
                    "<tr><td><a href=\"{url}\">{url}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{:.4}</td><td style=\"color:{color}\">{}</td><td>{}</td></tr>",
                    v.contracts_to_buy,
                    fmt_price(v.lowest_no_price),
                    fmt_price(v.highest_no_price),
                    v.neg_risk_sum,
                    fmt_usd(v.least_profit),
                    fmt_usd(v.max_profit),
                )
            })
            .collect()
    };

    let actionable = snap
        .verdicts
        .iter()
        .filter(|v| v.has_guaranteed_profit())
        .count();
    let refreshed = snap
        .refreshed_at
        .map(|t| t.to_rfc3339().chars().take(19).collect::<String>())
        .unwrap_or_else(|| "never".to_string());
    let health_color = if stats.consecutive_failures == 0 {
        "#2ecc71"
    } else {
        "#e74c3c"
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="30">
<title>Negative Risk</title>
<style>
  * {{ margin: 0; padding: 0; box-sizing: border-box; }}
  body {{ font-family: 'SF Mono', 'Fira Code', monospace; background: #0d1117; color: #c9d1d9; padding: 20px; }}
  h1 {{ color: #58a6ff; margin-bottom: 20px; font-size: 1.4em; }}
  .cards {{ display: flex; gap: 15px; margin-bottom: 20px; flex-wrap: wrap; }}
  .card {{ background: #161b22; border: 1px solid #30363d; border-radius: 8px; padding: 15px 20px; min-width: 160px; }}
  .card .label {{ color: #8b949e; font-size: 0.75em; text-transform: uppercase; letter-spacing: 1px; }}
  .card .value {{ font-size: 1.5em; font-weight: bold; margin-top: 4px; }}
  table {{ width: 100%; border-collapse: collapse; background: #161b22; border: 1px solid #30363d; }}
  th {{ background: #21262d; color: #8b949e; text-align: left; padding: 8px 12px; font-size: 0.8em; text-transform: uppercase; }}
  td {{ padding: 8px 12px; border-top: 1px solid #21262d; font-size: 0.85em; }}
  a {{ color: #58a6ff; text-decoration: none; }}
  .auto {{ color: #484f58; font-size: 0.7em; margin-top: 15px; }}
</style>
</head>
<body>
<h1>Negative Risk Scanner</h1>

<div class="cards">
  <div class="card"><div class="label">Markets</div><div class="value">{markets}</div></div>
  <div class="card"><div class="label">Guaranteed Profit</div><div class="value" style="color:#2ecc71">{actionable}</div></div>
  <div class="card"><div class="label">Last Refresh</div><div class="value" style="font-size:1em">{refreshed}</div></div>
  <div class="card"><div class="label">Failed Refreshes</div><div class="value" style="color:{health_color}">{consecutive}</div></div>
</div>

<table>
  <tr><th>Market</th><th>Contracts</th><th>Lowest No</th><th>Highest No</th><th>Neg Risk</th><th>Least Profit</th><th>Max Profit</th></tr>
  {rows}
</table>

<div class="auto">Auto-refresh 30s | API: /api/negrisk, /api/status</div>
</body>
</html>"#,
        markets = snap.verdicts.len(),
        actionable = actionable,
        refreshed = refreshed,
        health_color = health_color,
        consecutive = stats.consecutive_failures,
        rows = rows,
    );

    Html(html)
}
