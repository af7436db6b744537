//! `aquamine-console`: operator-side client stack for the AquaMine
//! Acid Mine Drainage monitoring API.
//!
//! - [`realtime`] – shared WebSocket connection, frame fan-out, live board
//! - [`api`] – typed REST client
//! - [`gate`] – session verification and redirect policy
//! - [`identity`] / [`admin`] – user directory and superadmin actions
//! - [`validation`] / [`notifications`] – client-side rules
//! - [`routes`] – the console's own HTTP surface
//!
//! Modules follow the Explicit Module Boundary Pattern (EMBP): each exposes
//! a small public surface and the commonly used types are re-exported here.

pub mod admin;
pub mod api;
pub mod config;
pub mod gate;
pub mod identity;
pub mod models;
pub mod notifications;
pub mod realtime;
pub mod routes;
pub mod validation;

pub use admin::{AdminActions, AdminError};
pub use api::{ApiClient, ApiError, ChatSession};
pub use config::Config;
pub use gate::{SessionClaims, SessionVerifier};
pub use identity::{ClerkDirectory, DirectoryUser, Role, UserDirectory};
pub use realtime::{ConnectionState, RealtimeHub, ReconnectPolicy, SensorBoard};
pub use routes::AppState;
