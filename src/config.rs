//! Configuration loader for the `aquamine-console` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing else in the crate reads `env::var`
//! directly; other modules receive the values they need from [`Config`].
//!
use std::{env, net::SocketAddr, time::Duration};

use anyhow::{anyhow, Result};

use crate::realtime::ReconnectPolicy;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional integer environment variable with no default.
macro_rules! parse_env_opt_u32 {
    ($var_name:expr) => {
        env::var($var_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable, falling back to a default.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// AquaMine REST API base URL (no trailing slash).
    pub api_base_url: String,

    /// WebSocket base URL; the realtime path is appended to it.
    pub ws_base_url: String,

    /// Identity provider management API base URL.
    pub idp_api_url: String,

    /// Identity provider secret key for the management API.
    pub idp_secret_key: String,

    /// HMAC key used to verify session tokens.
    pub session_signing_key: String,

    /// Email that may claim the superadmin role while none exists.
    pub superadmin_email: Option<String>,

    /// Delay before the first reconnect attempt, in seconds.
    pub reconnect_delay_secs: u32,

    /// Upper bound on the reconnect delay, in seconds.
    pub reconnect_max_delay_secs: u32,

    /// Factor applied to the delay after each failed attempt.
    pub reconnect_multiplier: u32,

    /// Consecutive reconnect attempts before giving up; `None` retries forever.
    pub reconnect_max_attempts: Option<u32>,

    /// Address the console HTTP server binds to.
    pub bind_addr: SocketAddr,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `IDP_SECRET_KEY` – identity provider management API key
/// - `SESSION_SIGNING_KEY` – session token verification key
///
/// Optional:
/// - `API_BASE_URL` – REST API base (default: `http://localhost:8181`)
/// - `WS_BASE_URL` – WebSocket base (default: `ws://localhost:8000`)
/// - `IDP_API_URL` – identity provider API (default: `https://api.clerk.com`)
/// - `SUPERADMIN_EMAIL` – bootstrap superadmin email (default: unset)
/// - `RECONNECT_DELAY_SECS` – reconnect delay (default: 5)
/// - `RECONNECT_MAX_DELAY_SECS` – reconnect delay cap (default: the delay)
/// - `RECONNECT_MULTIPLIER` – backoff factor (default: 1, i.e. fixed delay)
/// - `RECONNECT_MAX_ATTEMPTS` – retry limit (default: unlimited)
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let idp_secret_key = require_env!("IDP_SECRET_KEY");
    let session_signing_key = require_env!("SESSION_SIGNING_KEY");

    let api_base_url = trim_base(env_or!("API_BASE_URL", "http://localhost:8181"));
    let ws_base_url = trim_base(env_or!("WS_BASE_URL", "ws://localhost:8000"));
    let idp_api_url = trim_base(env_or!("IDP_API_URL", "https://api.clerk.com"));

    let superadmin_email = env::var("SUPERADMIN_EMAIL")
        .ok()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());

    let reconnect_delay_secs = parse_env_u32!("RECONNECT_DELAY_SECS", 5);
    let reconnect_max_delay_secs = parse_env_u32!("RECONNECT_MAX_DELAY_SECS", reconnect_delay_secs);
    let reconnect_multiplier = parse_env_u32!("RECONNECT_MULTIPLIER", 1);
    let reconnect_max_attempts = parse_env_opt_u32!("RECONNECT_MAX_ATTEMPTS");

    let bind_addr = env_or!("BIND_ADDR", "0.0.0.0:8080")
        .parse::<SocketAddr>()
        .map_err(|e| anyhow!("Invalid BIND_ADDR: {}", e))?;

    Ok(Config {
        api_base_url,
        ws_base_url,
        idp_api_url,
        idp_secret_key,
        session_signing_key,
        superadmin_email,
        reconnect_delay_secs,
        reconnect_max_delay_secs,
        reconnect_multiplier,
        reconnect_max_attempts,
        bind_addr,
    })
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

impl Config {
    /// Full URL of the realtime WebSocket endpoint.
    pub fn realtime_url(&self) -> String {
        format!("{}/ws/realtime", self.ws_base_url)
    }

    /// Reconnect policy assembled from the `RECONNECT_*` settings.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        // ---
        let delay = Duration::from_secs(u64::from(self.reconnect_delay_secs));
        let max_delay = Duration::from_secs(u64::from(
            self.reconnect_max_delay_secs.max(self.reconnect_delay_secs),
        ));

        ReconnectPolicy {
            initial_delay: delay,
            max_delay,
            multiplier: self.reconnect_multiplier.max(1),
            max_attempts: self.reconnect_max_attempts,
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Secrets are masked; everything else is printed as loaded.
    pub fn log_config(&self) {
        // ---
        let attempts = self
            .reconnect_max_attempts
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  API_BASE_URL        : {}", self.api_base_url);
        tracing::info!("  WS_BASE_URL         : {}", self.ws_base_url);
        tracing::info!("  IDP_API_URL         : {}", self.idp_api_url);
        tracing::info!("  IDP_SECRET_KEY      : {}", mask_secret(&self.idp_secret_key));
        tracing::info!("  SESSION_SIGNING_KEY : {}", mask_secret(&self.session_signing_key));
        tracing::info!("  SUPERADMIN_EMAIL    : {}", self.superadmin_email.as_deref().unwrap_or("(unset)"));
        tracing::info!(
            "  RECONNECT           : {}s (x{}, max {}s), attempts {}",
            self.reconnect_delay_secs,
            self.reconnect_multiplier,
            self.reconnect_max_delay_secs,
            attempts
        );
        tracing::info!("  BIND_ADDR           : {}", self.bind_addr);
    }
}

/// Keep a short prefix so operators can tell keys apart without leaking them.
fn mask_secret(secret: &str) -> String {
    // ---
    let prefix: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{prefix}****")
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn sample_config() -> Config {
        Config {
            api_base_url: "http://localhost:8181".into(),
            ws_base_url: "ws://localhost:8000".into(),
            idp_api_url: "https://api.clerk.com".into(),
            idp_secret_key: "sk_test_abcdefgh".into(),
            session_signing_key: "signing".into(),
            superadmin_email: None,
            reconnect_delay_secs: 5,
            reconnect_max_delay_secs: 5,
            reconnect_multiplier: 1,
            reconnect_max_attempts: None,
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
        }
    }

    #[test]
    fn test_realtime_url() {
        assert_eq!(sample_config().realtime_url(), "ws://localhost:8000/ws/realtime");
    }

    #[test]
    fn test_default_policy_is_fixed_five_seconds_forever() {
        // ---
        let policy = sample_config().reconnect_policy();
        assert_eq!(policy.initial_delay, Duration::from_secs(5));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert_eq!(policy.multiplier, 1);
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn test_max_delay_never_below_initial() {
        // ---
        let mut cfg = sample_config();
        cfg.reconnect_delay_secs = 10;
        cfg.reconnect_max_delay_secs = 2;
        cfg.reconnect_multiplier = 0;
        let policy = cfg.reconnect_policy();
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert_eq!(policy.multiplier, 1);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret("sk_test_abcdefgh"), "sk_t****");
    }

    #[test]
    fn test_trim_base() {
        assert_eq!(trim_base("http://api/".into()), "http://api");
    }
}
