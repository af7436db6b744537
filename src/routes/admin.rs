//! Admin user-management routes.
//!
//! The listing is a page: non-superadmins are redirected to
//! `/not-authorized`. The mutations are actions and answer with JSON; their
//! role check happens inside [`AdminActions`](crate::admin::AdminActions).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{error_response, AppState};
use crate::admin::AdminError;
use crate::gate::{require_role, SessionClaims};
use crate::identity::{DirectoryError, DirectoryUser, Role, UserDirectory};

// ---

pub fn router<D: UserDirectory>() -> Router<AppState<D>> {
    // ---
    Router::new()
        .route("/admin/users", get(list_users::<D>))
        .route("/admin/users/{user_id}/role", post(set_role::<D>))
        .route("/admin/users/{user_id}/allowlisted", post(set_allowlisted::<D>))
}

#[derive(Debug, Deserialize)]
struct SetRoleBody {
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
struct SetAllowlistedBody {
    allowlisted: bool,
}

#[derive(Serialize)]
struct ActionResponse {
    success: bool,
    user: DirectoryUser,
}

async fn list_users<D: UserDirectory>(
    State(state): State<AppState<D>>,
    claims: Option<Extension<SessionClaims>>,
) -> Response {
    // ---
    let claims = claims.map(|Extension(c)| c);
    let caller = match require_role(claims.as_ref(), Role::Superadmin) {
        Ok(caller) => caller,
        Err(redirect) => return redirect.into_response(),
    };

    match state.admin().list_users(caller).await {
        Ok(users) => Json(users).into_response(),
        Err(e) => admin_error(e),
    }
}

async fn set_role<D: UserDirectory>(
    State(state): State<AppState<D>>,
    Path(user_id): Path<String>,
    claims: Option<Extension<SessionClaims>>,
    Json(body): Json<SetRoleBody>,
) -> Response {
    // ---
    let Some(Extension(caller)) = claims else {
        return admin_error(AdminError::Unauthorized);
    };

    match state.admin().set_role(&caller, &user_id, body.role).await {
        Ok(user) => Json(ActionResponse { success: true, user }).into_response(),
        Err(e) => admin_error(e),
    }
}

async fn set_allowlisted<D: UserDirectory>(
    State(state): State<AppState<D>>,
    Path(user_id): Path<String>,
    claims: Option<Extension<SessionClaims>>,
    Json(body): Json<SetAllowlistedBody>,
) -> Response {
    // ---
    let Some(Extension(caller)) = claims else {
        return admin_error(AdminError::Unauthorized);
    };

    match state
        .admin()
        .set_allowlisted(&caller, &user_id, body.allowlisted)
        .await
    {
        Ok(user) => Json(ActionResponse { success: true, user }).into_response(),
        Err(e) => admin_error(e),
    }
}

fn admin_error(err: AdminError) -> Response {
    // ---
    match err {
        AdminError::Unauthorized => {
            error_response(StatusCode::FORBIDDEN, "UNAUTHORIZED", "superadmin role required")
        }
        AdminError::Directory(DirectoryError::NotFound(id)) => {
            error_response(StatusCode::NOT_FOUND, "USER_NOT_FOUND", format!("No user {id}"))
        }
        AdminError::Directory(e) => {
            error!("Identity provider call failed: {e}");
            error_response(StatusCode::BAD_GATEWAY, "DIRECTORY_ERROR", e.to_string())
        }
    }
}
