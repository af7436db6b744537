//! `GET /`: dashboard home summary.
//!
//! Fans out to the API for health, sensors and the alert summary in
//! parallel. A failing upstream call is reported in place rather than
//! failing the whole response.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use super::AppState;
use crate::identity::UserDirectory;
use crate::models::AlertSummary;
use crate::realtime::ConnectionState;

// ---

#[derive(Serialize)]
struct Overview {
    api: String,
    realtime: ConnectionState,
    active_sensors: Option<usize>,
    live_sensors: usize,
    alerts: Option<AlertSummary>,
}

pub fn router<D: UserDirectory>() -> Router<AppState<D>> {
    Router::new().route("/", get(handler::<D>))
}

async fn handler<D: UserDirectory>(State(state): State<AppState<D>>) -> Json<Overview> {
    // ---
    let (health, sensors, summary) = tokio::join!(
        state.api.fetch_health(),
        state.api.fetch_sensors(),
        state.api.fetch_alert_summary()
    );

    let api = match health {
        Ok(h) => h.status,
        Err(e) => {
            warn!("API health check failed: {e}");
            e.to_string()
        }
    };

    let active_sensors = sensors
        .map_err(|e| warn!("Failed to load sensors: {e}"))
        .ok()
        .map(|list| list.iter().filter(|s| s.is_active).count());

    let alerts = summary
        .map_err(|e| warn!("Failed to load alert summary: {e}"))
        .ok();

    Json(Overview {
        api,
        realtime: state.hub.state(),
        active_sensors,
        live_sensors: state.board.snapshot().readings.len(),
        alerts,
    })
}
