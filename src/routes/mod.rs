//! Route gateway (EMBP): assembles every subrouter, applies the session
//! gate, and binds the shared [`AppState`].

use std::sync::Arc;

use axum::{http::StatusCode, middleware, response::IntoResponse, Json, Router};
use serde::Serialize;

use crate::admin::AdminActions;
use crate::api::ApiClient;
use crate::gate::{session_gate, GateState, SessionVerifier};
use crate::identity::UserDirectory;
use crate::realtime::{RealtimeHub, SensorBoard};

mod admin;
mod health;
mod live;
mod overview;
mod pages;
mod session;

// ---

/// State shared by every route.
pub struct AppState<D> {
    pub api: ApiClient,
    pub gate: GateState<D>,
    pub hub: RealtimeHub,
    pub board: SensorBoard,
}

impl<D> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            gate: self.gate.clone(),
            hub: self.hub.clone(),
            board: self.board.clone(),
        }
    }
}

impl<D: UserDirectory> AppState<D> {
    pub fn new(
        api: ApiClient,
        verifier: SessionVerifier,
        admin: AdminActions<D>,
        hub: RealtimeHub,
        board: SensorBoard,
    ) -> Self {
        Self {
            api,
            gate: GateState {
                verifier: Arc::new(verifier),
                admin: Arc::new(admin),
            },
            hub,
            board,
        }
    }

    pub fn admin(&self) -> &AdminActions<D> {
        &self.gate.admin
    }
}

pub fn router<D: UserDirectory>(state: AppState<D>) -> Router {
    // ---
    let gated = Router::<AppState<D>>::new()
        .merge(overview::router::<D>())
        .merge(pages::router::<AppState<D>>())
        .merge(session::router::<AppState<D>>())
        .merge(admin::router::<D>())
        .merge(live::router::<D>())
        .layer(middleware::from_fn_with_state(
            state.gate.clone(),
            session_gate::<D>,
        ));

    // Health stays outside the gate for orchestrator health checks.
    gated
        .merge(health::router::<D>())
        .with_state(state)
}

/// JSON error body, same `{error, detail}` shape the AquaMine API uses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

fn error_response(
    status: StatusCode,
    error: &'static str,
    detail: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error,
            detail: detail.into(),
        }),
    )
        .into_response()
}
