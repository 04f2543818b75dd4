use axum::{Json, extract::State};
use serde::Serialize;

use super::AppState;
use crate::monitor::MonitorStatus;

pub async fn home() -> &'static str {
    "Oracle backend is running and serving API routes"
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Health {
    Up {
        ok: bool,
        latest_block: u64,
        wallet: String,
        monitor: MonitorStatus,
    },
    Down {
        ok: bool,
        error: String,
        monitor: MonitorStatus,
    },
}

/// `GET /health`: chain reachability plus the monitor snapshot. A failing
/// chain client is reported in the body, never as a crash.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let monitor = state.monitor.borrow().clone();
    let body = match state.chain.latest_block().await {
        Ok(latest_block) => Health::Up {
            ok: true,
            latest_block,
            wallet: state.wallet.to_checksum(None),
            monitor,
        },
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach chain");
            Health::Down {
                ok: false,
                error: e.to_string(),
                monitor,
            }
        }
    };
    Json(body)
}
