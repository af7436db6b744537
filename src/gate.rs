//! Session and role gate for the console's routes.
//!
//! The identity provider issues an HS256 session token (cookie `__session`
//! or a bearer header) carrying `metadata.role` and `metadata.allowlisted`.
//! [`session_gate`] verifies it and applies the redirect policy in
//! [`decide`]; role checks for individual pages go through
//! [`require_role`].

use std::{fmt, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::admin::AdminActions;
use crate::identity::{Role, UserDirectory};

// ---

pub const SESSION_COOKIE: &str = "__session";

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const ACCESS_PENDING_PATH: &str = "/access-pending";
pub const NOT_AUTHORIZED_PATH: &str = "/not-authorized";
pub const HOME_PATH: &str = "/";

const PUBLIC_PREFIXES: [&str; 3] = ["/sign-in", "/login", "/not-authorized"];

const ASSET_EXTENSIONS: [&str; 20] = [
    "html", "htm", "css", "js", "jpg", "jpeg", "webp", "png", "gif", "svg", "ttf", "woff",
    "woff2", "ico", "csv", "doc", "docx", "xls", "xlsx", "zip",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub allowlisted: Option<bool>,
}

/// Verified session token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Provider user id.
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "publicMetadata")]
    pub metadata: SessionMetadata,
}

impl SessionClaims {
    pub fn role(&self) -> Option<Role> {
        self.metadata.role.as_deref().and_then(Role::parse)
    }

    /// Exact match: `superadmin` does not imply `admin`.
    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    pub fn is_allowlisted(&self) -> bool {
        self.metadata.allowlisted == Some(true)
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid session token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionVerifier").finish_non_exhaustive()
    }
}

impl SessionVerifier {
    pub fn hs256(secret: &str) -> Self {
        // ---
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, GateError> {
        Ok(decode::<SessionClaims>(token, &self.key, &self.validation)?.claims)
    }
}

/// Session token from the bearer header, else the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    // ---
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Requests the gate never looks at: API calls, framework internals, and
/// static assets (`.json` is not an asset).
pub fn is_asset_path(path: &str) -> bool {
    // ---
    if path.starts_with("/api") || path.starts_with("/_next") {
        return true;
    }

    let last_segment = path.rsplit('/').next().unwrap_or_default();
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            ext == "webmanifest" || ASSET_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

pub fn is_public_route(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

pub fn is_access_pending_route(path: &str) -> bool {
    path.starts_with(ACCESS_PENDING_PATH)
}

fn is_login_route(path: &str) -> bool {
    path.starts_with("/login")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(&'static str),
}

/// Redirect policy for a non-asset request.
pub fn decide(path: &str, session: Option<&SessionClaims>) -> GateDecision {
    // ---
    let Some(claims) = session else {
        return if is_public_route(path) {
            GateDecision::Allow
        } else {
            GateDecision::Redirect(SIGN_IN_PATH)
        };
    };

    let allowlisted = claims.is_allowlisted();
    if is_login_route(path) {
        return GateDecision::Redirect(if allowlisted { HOME_PATH } else { ACCESS_PENDING_PATH });
    }

    match (allowlisted, is_access_pending_route(path)) {
        (false, false) => GateDecision::Redirect(ACCESS_PENDING_PATH),
        (true, true) => GateDecision::Redirect(HOME_PATH),
        _ => GateDecision::Allow,
    }
}

/// Page-level role check; failing callers go to the not-authorized page.
pub fn require_role(claims: Option<&SessionClaims>, role: Role) -> Result<&SessionClaims, Redirect> {
    match claims {
        Some(c) if c.has_role(role) => Ok(c),
        _ => Err(Redirect::temporary(NOT_AUTHORIZED_PATH)),
    }
}

/// Shared state for [`session_gate`].
pub struct GateState<D> {
    pub verifier: Arc<SessionVerifier>,
    pub admin: Arc<AdminActions<D>>,
}

impl<D> Clone for GateState<D> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            admin: Arc::clone(&self.admin),
        }
    }
}

/// Axum middleware enforcing [`decide`]. Allowed requests carry the
/// verified [`SessionClaims`] as a request extension.
pub async fn session_gate<D: UserDirectory>(
    State(gate): State<GateState<D>>,
    mut request: Request,
    next: Next,
) -> Response {
    // ---
    let path = request.uri().path().to_string();
    if is_asset_path(&path) {
        return next.run(request).await;
    }

    let session = token_from_headers(request.headers()).and_then(|token| {
        gate.verifier
            .verify(&token)
            .map_err(|e| debug!(path = %path, "Rejected session: {e}"))
            .ok()
    });

    if let Some(claims) = session.as_ref() {
        if !claims.is_allowlisted() && !is_login_route(&path) {
            if let Some(email) = claims.email.as_deref() {
                match gate.admin.bootstrap_superadmin(&claims.sub, email).await {
                    Ok(true) => return Redirect::temporary(HOME_PATH).into_response(),
                    Ok(false) => {}
                    Err(e) => error!("Superadmin bootstrap failed: {e}"),
                }
            }
        }
    }

    match decide(&path, session.as_ref()) {
        GateDecision::Redirect(to) => {
            debug!(path = %path, to, "Gate redirect");
            Redirect::temporary(to).into_response()
        }
        GateDecision::Allow => {
            if let Some(claims) = session {
                request.extensions_mut().insert(claims);
            }
            next.run(request).await
        }
    }
}
