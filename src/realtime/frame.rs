//! Realtime frame decoding.
//!
//! Frames are JSON objects `{"type": ..., "timestamp": ..., "data": {...}}`.
//! `reading` and `alert` are decoded into typed events; any other type is
//! kept as raw JSON so new server-side event kinds pass through untouched.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{timestamp, Alert, LiveReading};

// ---

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not a valid JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Reading(LiveReading),
    Alert(Alert),
    Other { kind: String, data: Value },
}

impl RealtimeEvent {
    pub fn kind(&self) -> &str {
        match self {
            RealtimeEvent::Reading(_) => "reading",
            RealtimeEvent::Alert(_) => "alert",
            RealtimeEvent::Other { kind, .. } => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeMessage {
    /// Server send time, when the frame carries a parseable one.
    pub timestamp: Option<DateTime<Utc>>,
    pub event: RealtimeEvent,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    data: Value,
}

impl RealtimeMessage {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        // ---
        let raw: RawFrame = serde_json::from_str(text)?;
        let timestamp = raw.timestamp.as_deref().and_then(timestamp::parse);

        let event = match raw.kind.as_str() {
            "reading" => serde_json::from_value(raw.data)
                .map(RealtimeEvent::Reading)
                .map_err(|source| FrameError::Payload {
                    kind: "reading",
                    source,
                })?,
            "alert" => serde_json::from_value(raw.data)
                .map(RealtimeEvent::Alert)
                .map_err(|source| FrameError::Payload {
                    kind: "alert",
                    source,
                })?,
            _ => RealtimeEvent::Other {
                kind: raw.kind,
                data: raw.data,
            },
        };

        Ok(Self { timestamp, event })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_reading_frame() {
        // ---
        let msg = RealtimeMessage::parse(
            r#"{"type":"reading","timestamp":"2025-03-26T18:45:00.120000","data":{"sensor_id":"S1","ph":3.1,"turbidity":12.0,"temperature":26.0}}"#,
        )
        .unwrap();

        assert!(msg.timestamp.is_some());
        match msg.event {
            RealtimeEvent::Reading(r) => {
                assert_eq!(r.sensor_id, "S1");
                assert_eq!(r.ph, Some(3.1));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_alert_frame() {
        // ---
        let msg = RealtimeMessage::parse(
            r#"{"type":"alert","data":{"id":9,"sensor_id":1,"severity":"critical","created_at":"2025-03-26T18:45:00Z"}}"#,
        )
        .unwrap();
        assert_eq!(msg.event.kind(), "alert");
        assert_eq!(msg.timestamp, None);
    }

    #[test]
    fn test_unknown_type_is_kept() {
        // ---
        let msg = RealtimeMessage::parse(r#"{"type":"forecast","data":{"n":1}}"#).unwrap();
        match msg.event {
            RealtimeEvent::Other { kind, data } => {
                assert_eq!(kind, "forecast");
                assert_eq!(data["n"], 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        // ---
        assert!(matches!(RealtimeMessage::parse("not json"), Err(FrameError::Json(_))));
        assert!(matches!(RealtimeMessage::parse(r#"{"data":{}}"#), Err(FrameError::Json(_))));
        assert!(matches!(
            RealtimeMessage::parse(r#"{"type":"reading","data":{"ph":7}}"#),
            Err(FrameError::Payload { kind: "reading", .. })
        ));
    }
}
