//! Realtime client for `/ws/realtime`.
//!
//! Gateway for the realtime submodules (EMBP): frame decoding, the socket
//! transport, the shared reference-counted hub, and the live sensor board
//! built on top of it.

mod board;
mod frame;
mod hub;
mod transport;

pub use board::{BoardSnapshot, SensorBoard, DEFAULT_ALERT_CAPACITY};
pub use frame::{FrameError, RealtimeEvent, RealtimeMessage};
pub use hub::{ConnectionState, Handler, RealtimeHub, ReconnectPolicy, Subscription};
pub use transport::{Connector, FrameStream, RealtimeError, WsConnector};
