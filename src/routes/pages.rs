//! Landing targets for gate redirects.
//!
//! The dashboard views themselves live elsewhere; these routes only give
//! `/access-pending` and `/not-authorized` a JSON answer so redirected
//! clients know why they ended up there.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct PageStatus {
    status: &'static str,
    detail: &'static str,
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/access-pending", get(access_pending))
        .route("/not-authorized", get(not_authorized))
}

async fn access_pending() -> impl IntoResponse {
    Json(PageStatus {
        status: "pending",
        detail: "Your account is waiting for administrator approval.",
    })
}

async fn not_authorized() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(PageStatus {
            status: "forbidden",
            detail: "You do not have permission to view this page.",
        }),
    )
}
