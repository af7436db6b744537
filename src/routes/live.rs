//! `GET /live/sensors`: the live sensor board and realtime connection state.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::identity::UserDirectory;
use crate::models::{Alert, LiveReading};
use crate::realtime::ConnectionState;

// ---

#[derive(Serialize)]
struct LiveResponse {
    state: ConnectionState,
    connected: bool,
    readings: Vec<LiveReading>,
    alerts: Vec<Alert>,
}

pub fn router<D: UserDirectory>() -> Router<AppState<D>> {
    Router::new().route("/live/sensors", get(handler::<D>))
}

async fn handler<D: UserDirectory>(State(state): State<AppState<D>>) -> Json<LiveResponse> {
    // ---
    let snapshot = state.board.snapshot();
    Json(LiveResponse {
        state: state.hub.state(),
        connected: state.hub.is_connected(),
        readings: snapshot.readings,
        alerts: snapshot.alerts,
    })
}
