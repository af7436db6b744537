//! `GET /session`: the verified claims of the current caller.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Extension, Json, Router};
use serde::Serialize;

use super::error_response;
use crate::gate::SessionClaims;

// ---

#[derive(Serialize)]
struct SessionResponse {
    user_id: String,
    email: Option<String>,
    role: Option<&'static str>,
    allowlisted: bool,
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/session", get(handler))
}

async fn handler(claims: Option<Extension<SessionClaims>>) -> impl IntoResponse {
    // ---
    let Some(Extension(claims)) = claims else {
        return error_response(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", "No session");
    };

    Json(SessionResponse {
        role: claims.role().map(|r| r.as_str()),
        allowlisted: claims.is_allowlisted(),
        user_id: claims.sub,
        email: claims.email,
    })
    .into_response()
}
