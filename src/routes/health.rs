// src/routes/health.rs
//! Console health check endpoint.
//!
//! Defines the `/health` route used by container orchestrators and CI to
//! verify that the console is up. It is merged outside the session gate and
//! never calls the AquaMine API or the identity provider; it only reports
//! the realtime connection state the hub already holds.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::identity::UserDirectory;
use crate::realtime::ConnectionState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    realtime: ConnectionState,
}

/// Handle `GET /health`.
///
/// Always `ok` while the process serves requests; a disconnected realtime
/// feed is reported but does not fail the check.
async fn health<D: UserDirectory>(State(state): State<AppState<D>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        realtime: state.hub.state(),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router<D: UserDirectory>() -> Router<AppState<D>> {
    Router::new().route("/health", get(health::<D>))
}
