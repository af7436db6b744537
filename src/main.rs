//! Application entry point for the `aquamine-console` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Checking that the AquaMine API answers its health check
//! - Creating the shared realtime hub and attaching the live sensor board
//! - Mounting all routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `IDP_SECRET_KEY` (**required**) – identity provider management API key
//! - `SESSION_SIGNING_KEY` (**required**) – session token verification key
//! - `CONSOLE_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `CONSOLE_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See [`aquamine_console::config`] for the full list.
use std::{env, io};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use aquamine_console::{
    config, routes, AdminActions, ApiClient, AppState, ClerkDirectory, RealtimeHub, SensorBoard,
    SessionVerifier,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let api = ApiClient::new(&cfg.api_base_url);
    match api.fetch_health().await {
        Ok(health) => tracing::info!("AquaMine API at {} is {}", cfg.api_base_url, health.status),
        Err(e) => tracing::warn!("AquaMine API at {} not healthy yet: {}", cfg.api_base_url, e),
    }

    let hub = RealtimeHub::new(cfg.realtime_url(), cfg.reconnect_policy());
    let board = SensorBoard::default();

    // Held for the process lifetime; keeps the realtime connection open.
    let _board_feed = board.attach(&hub);

    let directory = ClerkDirectory::new(&cfg.idp_api_url, &cfg.idp_secret_key);
    let admin = AdminActions::new(directory, cfg.superadmin_email.clone());
    let verifier = SessionVerifier::hs256(&cfg.session_signing_key);

    let state = AppState::new(api, verifier, admin, hub, board);
    let app = routes::router(state);

    tracing::info!("Listening on {}", cfg.bind_addr);

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `CONSOLE_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `CONSOLE_LOG_LEVEL` env var
///
/// Call once at startup, before any logging macros run.
fn init_tracing() {
    // ---
    let span_events = match env::var("CONSOLE_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to CONSOLE_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("CONSOLE_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn,tungstenite=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
