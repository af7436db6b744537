//! The console router end to end: session gate, pages, admin actions.

mod common;

use anyhow::Result;
use axum::{
    http::StatusCode as MockStatus,
    routing::get,
    Json, Router,
};
use reqwest::{header, redirect, Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use aquamine_console::identity::Role;
use aquamine_console::{
    routes, AdminActions, ApiClient, AppState, RealtimeHub, ReconnectPolicy, SensorBoard,
    SessionVerifier,
};
use common::{claims, sign, token, user, MemoryDirectory, SIGNING_KEY};

// ---

struct Console {
    base: String,
    http: Client,
    directory: MemoryDirectory,
}

impl Console {
    async fn get(&self, path: &str, session: Option<&str>) -> Result<reqwest::Response> {
        // ---
        let mut request = self.http.get(format!("{}{path}", self.base));
        if let Some(token) = session {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    async fn post(&self, path: &str, session: &str, body: Value) -> Result<reqwest::Response> {
        Ok(self
            .http
            .post(format!("{}{path}", self.base))
            .bearer_auth(session)
            .json(&body)
            .send()
            .await?)
    }
}

async fn serve(app: Router) -> Result<String> {
    // ---
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

/// Mock AquaMine API: healthy, two sensors, a broken alert summary.
async fn mock_api() -> Result<String> {
    // ---
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route(
            "/api/v1/sensors",
            get(|| async {
                Json(json!([
                    {"id": 1, "sensor_id": "PIT-1", "is_active": true},
                    {"id": 2, "sensor_id": "PIT-2", "is_active": false}
                ]))
            }),
        )
        .route(
            "/api/v1/alerts/summary",
            get(|| async { (MockStatus::SERVICE_UNAVAILABLE, "maintenance") }),
        );
    serve(app).await
}

async fn console() -> Result<Console> {
    // ---
    let directory = MemoryDirectory::with_users(vec![
        user("u_root", "root@aquamine.id", json!({"role": "superadmin", "allowlisted": true})),
        user("u_ops", "ops@aquamine.id", json!({"role": "admin", "allowlisted": true})),
        user("u_new", "new@aquamine.id", json!({})),
        user("u_boss", "boss@aquamine.id", json!({})),
    ]);

    let api = ApiClient::new(mock_api().await?);
    let hub = RealtimeHub::new("ws://127.0.0.1:9/ws/realtime", ReconnectPolicy::default());
    let admin = AdminActions::new(directory.clone(), Some("boss@aquamine.id".into()));
    let state = AppState::new(
        api,
        SessionVerifier::hs256(SIGNING_KEY),
        admin,
        hub,
        SensorBoard::default(),
    );

    Ok(Console {
        base: serve(routes::router(state)).await?,
        http: Client::builder().redirect(redirect::Policy::none()).build()?,
        directory,
    })
}

fn location(response: &reqwest::Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn health_is_not_gated() -> Result<()> {
    // ---
    let console = console().await?;
    let response = console.get("/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body, json!({"status": "ok", "realtime": "disconnected"}));
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_go_to_sign_in() -> Result<()> {
    // ---
    let console = console().await?;

    let response = console.get("/live/sensors", None).await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/sign-in"));

    let forged = sign(&claims("u_root", Some("superadmin"), true), "wrong-key");
    let response = console.get("/session", Some(&forged)).await?;
    assert_eq!(location(&response), Some("/sign-in"));

    // Public and asset paths pass straight through to the router.
    assert_eq!(console.get("/sign-in", None).await?.status(), StatusCode::NOT_FOUND);
    assert_eq!(console.get("/logo.png", None).await?.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        console.get("/not-authorized", None).await?.status(),
        StatusCode::FORBIDDEN
    );
    Ok(())
}

#[tokio::test]
async fn pending_user_is_held_at_access_pending() -> Result<()> {
    // ---
    let console = console().await?;
    let pending = token(&claims("u_new", None, false));

    let response = console.get("/live/sensors", Some(&pending)).await?;
    assert_eq!(location(&response), Some("/access-pending"));

    let response = console.get("/access-pending", Some(&pending)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "pending");
    Ok(())
}

#[tokio::test]
async fn allowlisted_user_gets_session_and_live_board() -> Result<()> {
    // ---
    let console = console().await?;
    let ops = token(&claims("u_ops", Some("admin"), true));

    let response = console.get("/access-pending", Some(&ops)).await?;
    assert_eq!(location(&response), Some("/"));

    let response = console
        .http
        .get(format!("{}/session", console.base))
        .header(header::COOKIE, format!("theme=dark; __session={ops}"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let session: Value = response.json().await?;
    assert_eq!(session["user_id"], "u_ops");
    assert_eq!(session["role"], "admin");
    assert_eq!(session["allowlisted"], true);

    let live: Value = console.get("/live/sensors", Some(&ops)).await?.json().await?;
    assert_eq!(live["connected"], false);
    assert_eq!(live["readings"], json!([]));
    Ok(())
}

#[tokio::test]
async fn overview_reports_partial_upstream_failure() -> Result<()> {
    // ---
    let console = console().await?;
    let ops = token(&claims("u_ops", None, true));

    let response = console.get("/", Some(&ops)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let overview: Value = response.json().await?;
    assert_eq!(overview["api"], "ok");
    assert_eq!(overview["active_sensors"], 1);
    assert_eq!(overview["alerts"], Value::Null);
    assert_eq!(overview["realtime"], "disconnected");
    Ok(())
}

#[tokio::test]
async fn admin_pages_require_exact_superadmin() -> Result<()> {
    // ---
    let console = console().await?;
    let ops = token(&claims("u_ops", Some("admin"), true));
    let root = token(&claims("u_root", Some("superadmin"), true));

    let response = console.get("/admin/users", Some(&ops)).await?;
    assert_eq!(location(&response), Some("/not-authorized"));

    let response = console.get("/admin/users", Some(&root)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let users: Vec<Value> = response.json().await?;
    assert_eq!(users.len(), 4);

    let response = console
        .post("/admin/users/u_new/allowlisted", &ops, json!({"allowlisted": true}))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(console.directory.updates(), 0);
    Ok(())
}

#[tokio::test]
async fn superadmin_mutations_reach_directory() -> Result<()> {
    // ---
    let console = console().await?;
    let root = token(&claims("u_root", Some("superadmin"), true));

    let response = console
        .post("/admin/users/u_new/allowlisted", &root, json!({"allowlisted": true}))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["success"], true);

    let response = console
        .post("/admin/users/u_new/role", &root, json!({"role": "admin"}))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let promoted = console.directory.find("u_new").unwrap();
    assert_eq!(promoted.role(), Some(Role::Admin));
    assert!(promoted.is_allowlisted());

    let response = console
        .post("/admin/users/u_new/role", &root, json!({"role": null}))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(console.directory.find("u_new").unwrap().role(), None);

    let response = console
        .post("/admin/users/u_ghost/role", &root, json!({"role": "admin"}))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn configured_email_is_bootstrapped_on_first_visit() -> Result<()> {
    // ---
    let console = console().await?;
    let mut first_visit = claims("u_boss", None, false);
    first_visit.email = Some("boss@aquamine.id".into());

    // Drop the existing superadmin so bootstrap is unlocked.
    console.directory.users.lock().unwrap().retain(|u| u.id != "u_root");

    let response = console.get("/live/sensors", Some(&token(&first_visit))).await?;
    assert_eq!(location(&response), Some("/"));

    let boss = console.directory.find("u_boss").unwrap();
    assert_eq!(boss.role(), Some(Role::Superadmin));
    assert!(boss.is_allowlisted());

    // A second pending user with the same email stays pending.
    let mut twin = claims("u_new", None, false);
    twin.email = Some("boss@aquamine.id".into());
    let response = console.get("/live/sensors", Some(&token(&twin))).await?;
    assert_eq!(location(&response), Some("/access-pending"));
    Ok(())
}
