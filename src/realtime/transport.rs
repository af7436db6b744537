//! Socket transport behind the realtime hub.
//!
//! The hub only needs "connect, then yield text frames until the connection
//! ends". [`WsConnector`] provides that over tokio-tungstenite; tests plug in
//! their own [`Connector`].

use std::pin::Pin;

use futures_util::{future::BoxFuture, future::ready, Stream, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

// ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connection error: {0}")]
    Stream(String),

    #[error("closed by server: {0}")]
    Closed(String),
}

/// Text frames from one connection. The stream ends, or yields an error,
/// when the connection is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, RealtimeError>> + Send>>;

pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<FrameStream, RealtimeError>>;
}

/// WebSocket connector. Dropping the returned stream closes the socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<FrameStream, RealtimeError>> {
        // ---
        let url = url.to_string();
        Box::pin(async move {
            let (ws, response) = connect_async(url.as_str())
                .await
                .map_err(|e| RealtimeError::Connect(e.to_string()))?;
            debug!(status = response.status().as_u16(), "WebSocket handshake complete");

            let frames = ws.filter_map(|msg| {
                ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    // Non-UTF-8 payloads fail JSON decoding downstream and get dropped there.
                    Ok(Message::Binary(bytes)) => {
                        Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    Ok(Message::Close(frame)) => Some(Err(RealtimeError::Closed(
                        frame.map_or_else(|| "no reason".to_string(), |f| f.reason.to_string()),
                    ))),
                    Ok(_) => None,
                    Err(e) => Some(Err(RealtimeError::Stream(e.to_string()))),
                })
            });

            Ok(Box::pin(frames) as FrameStream)
        })
    }
}
