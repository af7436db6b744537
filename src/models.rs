//! Data models exchanged with the AquaMine API.
//!
//! Field names follow the API's JSON bodies. Timestamps coming from the API
//! are not always offset-qualified, so they go through [`timestamp`], which
//! reads naive values as UTC.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Live reading pushed over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    // ---
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub sensor_id: String,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub turbidity: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Alert severity. Unrecognized values read as [`Severity::Info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert record owned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    // ---
    pub id: i64,
    pub sensor_id: i64,
    pub severity: Severity,
    #[serde(default)]
    pub previous_state: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
}

impl Alert {
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }
}

/// Filters for `GET /api/v1/alerts`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Body of `POST /api/v1/alerts/{id}/acknowledge`.
#[derive(Debug, Serialize)]
pub struct AcknowledgeRequest<'a> {
    pub acknowledged_by: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total_alerts: u32,
    pub warning_count: u32,
    pub critical_count: u32,
    pub unacknowledged_count: u32,
    #[serde(default)]
    pub max_severity: Option<Severity>,
}

/// Sensor registered with the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    // ---
    pub id: i64,
    pub sensor_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub is_active: bool,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Historical reading stored by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    // ---
    pub id: i64,
    pub sensor_id: i64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub turbidity: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub battery_voltage: Option<f64>,
    #[serde(default)]
    pub signal_strength: Option<i32>,
}

/// Filters for `GET /api/v1/sensors/{id}/readings`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReadingsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Per-user notification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    // ---
    pub user_id: String,
    pub notifications_enabled: bool,
    pub notify_critical: bool,
    pub notify_warning: bool,
    pub notify_info: bool,
    #[serde(default)]
    pub quiet_hours_start: Option<String>,
    #[serde(default)]
    pub quiet_hours_end: Option<String>,
    pub timezone: String,
    pub refresh_interval_seconds: u32,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub last_notification_seen_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

/// Partial settings update. `None` leaves a field untouched; for the
/// nullable fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserSettingsUpdate {
    // ---
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_critical: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_warning: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_info: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet_hours_start: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet_hours_end: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_notification_seen_at: Option<Option<DateTime<Utc>>>,
}

/// Notification recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    // ---
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub is_active: bool,
    pub notify_warning: bool,
    pub notify_critical: bool,
}

/// Recipient form as entered by an operator. Blank contact fields mean
/// "not provided".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientForm {
    // ---
    pub name: String,
    pub phone: String,
    pub email: String,
    pub is_active: bool,
    pub notify_warning: bool,
    pub notify_critical: bool,
}

impl Default for RecipientForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            email: String::new(),
            is_active: true,
            notify_warning: true,
            notify_critical: true,
        }
    }
}

impl From<&Recipient> for RecipientForm {
    fn from(r: &Recipient) -> Self {
        Self {
            name: r.name.clone(),
            phone: r.phone.clone().unwrap_or_default(),
            email: r.email.clone().unwrap_or_default(),
            is_active: r.is_active,
            notify_warning: r.notify_warning,
            notify_critical: r.notify_critical,
        }
    }
}

/// Wire body for recipient create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientPayload {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub notify_warning: bool,
    pub notify_critical: bool,
}

impl RecipientForm {
    pub fn to_payload(&self) -> RecipientPayload {
        // ---
        let blank_to_none = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };

        RecipientPayload {
            name: self.name.trim().to_string(),
            phone: blank_to_none(&self.phone),
            email: blank_to_none(&self.email),
            is_active: self.is_active,
            notify_warning: self.notify_warning,
            notify_critical: self.notify_critical,
        }
    }
}

/// Detection box in image pixel coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

/// Yellow Boy severity reported by the CV model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CvSeverity {
    None,
    Mild,
    Moderate,
    Severe,
}

/// Result of `POST /api/v1/cv/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAnalysis")]
pub struct AnalysisResponse {
    // ---
    pub detected: bool,
    pub confidence: f64,
    pub severity: CvSeverity,
    pub bbox: Option<BoundingBox>,
    pub bboxes: Vec<BoundingBox>,
    pub latency_ms: u64,
    pub warnings: Vec<String>,
    pub model_version: String,
    pub image_width: u32,
    pub image_height: u32,
}

/// The API may omit `detected`; it is then derived from the severity.
#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    detected: Option<bool>,
    confidence: f64,
    severity: CvSeverity,
    #[serde(default)]
    bbox: Option<BoundingBox>,
    #[serde(default)]
    bboxes: Vec<BoundingBox>,
    latency_ms: u64,
    #[serde(default)]
    warnings: Vec<String>,
    model_version: String,
    image_width: u32,
    image_height: u32,
}

impl From<RawAnalysis> for AnalysisResponse {
    fn from(raw: RawAnalysis) -> Self {
        Self {
            detected: raw.detected.unwrap_or(raw.severity != CvSeverity::None),
            confidence: raw.confidence,
            severity: raw.severity,
            bbox: raw.bbox,
            bboxes: raw.bboxes,
            latency_ms: raw.latency_ms,
            warnings: raw.warnings,
            model_version: raw.model_version,
            image_width: raw.image_width,
            image_height: raw.image_height,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub session_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Forecastable water-quality parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastParameter {
    Ph,
    Turbidity,
    Temperature,
}

impl ForecastParameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastParameter::Ph => "ph",
            ForecastParameter::Turbidity => "turbidity",
            ForecastParameter::Temperature => "temperature",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub sensor_id: String,
    pub parameter: String,
    pub predicted: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub forecasts: Vec<ForecastPoint>,
    pub horizon_days: u32,
    pub data_points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqItem {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqResponse {
    pub items: Vec<FaqItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorEnvelope {
    /// `detail` when present and non-empty, else `error`.
    pub fn message(&self) -> Option<&str> {
        // ---
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.is_empty())
        }
        non_empty(&self.detail).or_else(|| non_empty(&self.error))
    }
}

/// Timestamp parsing that accepts RFC 3339 and naive ISO 8601 (read as UTC).
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        // ---
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
            None => Ok(None),
        }
    }
}

/// Sensor identifiers arrive as numbers or strings depending on the source.
mod flexible_id {
    use serde::{de::Error, Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!("invalid sensor id: {other}"))),
        }
    }
}
