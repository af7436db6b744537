//! Typed client for the AquaMine REST API.
//!
//! Every call is a single best-effort round trip: no retries, no timeouts,
//! no caching. Non-2xx responses are turned into [`ApiError::Server`] with
//! the message taken from the API's `{error, detail}` envelope.

use reqwest::{multipart, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    AcknowledgeRequest, Alert, AlertQuery, AlertSummary, AnalysisResponse, ChatRequest,
    ChatResponse, ErrorEnvelope, FaqItem, FaqResponse, ForecastParameter, ForecastResponse,
    HealthStatus, ReadingsQuery, Recipient, RecipientForm, Sensor, StoredReading, UserSettings,
    UserSettingsUpdate,
};
use crate::validation::{validate_recipient, validate_settings_update, ValidationError};

// ---

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response; `message` is what the UI shows.
    #[error("{message}")]
    Server { status: StatusCode, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Client for one API deployment. Cheap to clone; clones share the
/// connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // --- computer vision and chat

    /// Upload an image for Yellow Boy detection.
    pub async fn analyze_image(
        &self,
        image: Vec<u8>,
        file_name: &str,
        mime: &str,
    ) -> Result<AnalysisResponse, ApiError> {
        // ---
        let part = multipart::Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new().part("file", part);

        self.send(self.http.post(self.url("/api/v1/cv/analyze")).multipart(form))
            .await
    }

    pub async fn send_chat_message(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<ChatResponse, ApiError> {
        // ---
        let body = ChatRequest {
            message,
            session_id,
        };
        self.send(self.http.post(self.url("/api/v1/chat")).json(&body))
            .await
    }

    // --- settings

    pub async fn fetch_settings(&self, user_id: &str) -> Result<UserSettings, ApiError> {
        // ---
        let url = self.url(&format!("/api/v1/settings/{user_id}"));
        self.send(self.http.get(url).header("x-user-id", user_id))
            .await
    }

    /// Validates the update locally; an invalid update never reaches the API.
    pub async fn update_settings(
        &self,
        user_id: &str,
        update: &UserSettingsUpdate,
    ) -> Result<UserSettings, ApiError> {
        // ---
        validate_settings_update(update)?;

        let url = self.url(&format!("/api/v1/settings/{user_id}"));
        self.send(self.http.patch(url).header("x-user-id", user_id).json(update))
            .await
    }

    // --- alerts

    pub async fn fetch_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>, ApiError> {
        self.send(self.http.get(self.url("/api/v1/alerts")).query(query))
            .await
    }

    pub async fn acknowledge_alert(
        &self,
        alert_id: i64,
        acknowledged_by: &str,
    ) -> Result<Alert, ApiError> {
        // ---
        let url = self.url(&format!("/api/v1/alerts/{alert_id}/acknowledge"));
        self.send(self.http.post(url).json(&AcknowledgeRequest { acknowledged_by }))
            .await
    }

    pub async fn fetch_alert_summary(&self) -> Result<AlertSummary, ApiError> {
        self.send(self.http.get(self.url("/api/v1/alerts/summary")))
            .await
    }

    // --- sensors and forecasts

    pub async fn fetch_sensors(&self) -> Result<Vec<Sensor>, ApiError> {
        self.send(self.http.get(self.url("/api/v1/sensors"))).await
    }

    pub async fn fetch_sensor_readings(
        &self,
        sensor_id: i64,
        query: &ReadingsQuery,
    ) -> Result<Vec<StoredReading>, ApiError> {
        // ---
        let url = self.url(&format!("/api/v1/sensors/{sensor_id}/readings"));
        self.send(self.http.get(url).query(query)).await
    }

    pub async fn fetch_forecast(
        &self,
        sensor_id: i64,
        parameter: ForecastParameter,
    ) -> Result<ForecastResponse, ApiError> {
        // ---
        let url = self.url(&format!("/api/v1/forecast/{sensor_id}"));
        self.send(self.http.get(url).query(&[("parameter", parameter.as_str())]))
            .await
    }

    // --- recipients

    pub async fn fetch_recipients(&self) -> Result<Vec<Recipient>, ApiError> {
        self.send(self.http.get(self.url("/api/v1/recipients")))
            .await
    }

    pub async fn create_recipient(&self, form: &RecipientForm) -> Result<Recipient, ApiError> {
        // ---
        validate_recipient(form)?;
        self.send(
            self.http
                .post(self.url("/api/v1/recipients"))
                .json(&form.to_payload()),
        )
        .await
    }

    pub async fn update_recipient(
        &self,
        recipient_id: i64,
        form: &RecipientForm,
    ) -> Result<Recipient, ApiError> {
        // ---
        validate_recipient(form)?;
        let url = self.url(&format!("/api/v1/recipients/{recipient_id}"));
        self.send(self.http.patch(url).json(&form.to_payload()))
            .await
    }

    pub async fn delete_recipient(&self, recipient_id: i64) -> Result<(), ApiError> {
        // ---
        let url = self.url(&format!("/api/v1/recipients/{recipient_id}"));
        let response = self.http.delete(url).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    // --- misc

    /// Liveness of the API. Failures carry a fixed message rather than the
    /// error envelope.
    pub async fn fetch_health(&self) -> Result<HealthStatus, ApiError> {
        // ---
        let response = self.http.get(self.url("/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Server {
                status,
                message: format!("Health check failed: {}", status_line(status)),
            });
        }
        decode(response).await
    }

    pub async fn fetch_faq(&self) -> Result<Vec<FaqItem>, ApiError> {
        let faq: FaqResponse = self.send(self.http.get(self.url("/api/v1/help/faq"))).await?;
        Ok(faq.items)
    }

    // ---

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        // ---
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {} -> {}", response.url().path(), status.as_u16(), status_line(status));

        if !status.is_success() {
            return Err(error_from_response(response).await);
        }
        decode(response).await
    }
}

/// One chat conversation. Every message carries the same session id, a
/// fresh UUID v4 per conversation.
#[derive(Debug, Clone)]
pub struct ChatSession {
    api: ApiClient,
    id: String,
}

impl ChatSession {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            id: Uuid::new_v4().to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sends the trimmed message. Blank input is not sent and yields `None`.
    pub async fn send(&self, message: &str) -> Result<Option<ChatResponse>, ApiError> {
        // ---
        let message = message.trim();
        if message.is_empty() {
            return Ok(None);
        }
        self.api.send_chat_message(message, &self.id).await.map(Some)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Build the error for a non-2xx response from its `{error, detail}` body,
/// falling back to the status line when the body is not a usable envelope.
async fn error_from_response(response: reqwest::Response) -> ApiError {
    // ---
    let status = response.status();
    let fallback = format!("Server returned {}", status_line(status));

    let message = match response.bytes().await {
        Ok(body) => serde_json::from_slice::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.message().map(str::to_string))
            .unwrap_or(fallback),
        Err(_) => fallback,
    };

    ApiError::Server { status, message }
}

fn status_line(status: StatusCode) -> String {
    format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or(""))
        .trim_end()
        .to_string()
}
