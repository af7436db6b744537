//! Notification badge state: unread/new counts, quiet hours, and the
//! polling loop that keeps alerts and settings fresh.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, Timelike, Utc};
use futures_util::future::join_all;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{Alert, AlertQuery, UserSettings, UserSettingsUpdate};

// ---

/// Polling interval used until settings have been loaded.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Parse an `HH:MM` (or `HH:MM:SS`) wall-clock time.
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Whether `now` falls inside the quiet-hours window.
///
/// Both bounds are inclusive and `now` is compared at minute precision. A
/// window whose start is not before its end wraps past midnight. A missing
/// or unparseable bound disables quiet hours.
pub fn is_quiet_hours(start: Option<&str>, end: Option<&str>, now: NaiveTime) -> bool {
    // ---
    let (Some(start), Some(end)) = (start.and_then(parse_clock), end.and_then(parse_clock)) else {
        return false;
    };
    let now = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now);

    if start < end {
        now >= start && now <= end
    } else {
        now >= start || now <= end
    }
}

/// Alerts that nobody has acknowledged yet.
pub fn unread_count(alerts: &[Alert]) -> usize {
    alerts.iter().filter(|a| !a.is_acknowledged()).count()
}

/// Alerts raised after the user last opened the notification list. Every
/// alert counts as new when the list has never been opened.
pub fn new_count(alerts: &[Alert], last_seen: Option<DateTime<Utc>>) -> usize {
    match last_seen {
        Some(seen) => alerts.iter().filter(|a| a.created_at > seen).count(),
        None => alerts.len(),
    }
}

/// Western Indonesia Time, UTC+7.
fn wib() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap_or_else(|| unreachable!())
}

/// `dd/mm/yyyy HH:MM WIB`
pub fn format_wib(at: DateTime<Utc>) -> String {
    format!("{} WIB", at.with_timezone(&wib()).format("%d/%m/%Y %H:%M"))
}

/// `d/m HH:MM WIB`
pub fn format_wib_short(at: DateTime<Utc>) -> String {
    format!("{} WIB", at.with_timezone(&wib()).format("%-d/%-m %H:%M"))
}

/// Snapshot of what the notification badge needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    pub alerts: Vec<Alert>,
    pub settings: Option<UserSettings>,
}

impl NotificationState {
    pub fn unread_count(&self) -> usize {
        unread_count(&self.alerts)
    }

    pub fn new_count(&self) -> usize {
        new_count(
            &self.alerts,
            self.settings.as_ref().and_then(|s| s.last_notification_seen_at),
        )
    }

    pub fn is_quiet_at(&self, now: NaiveTime) -> bool {
        self.settings.as_ref().is_some_and(|s| {
            is_quiet_hours(s.quiet_hours_start.as_deref(), s.quiet_hours_end.as_deref(), now)
        })
    }

    /// The "new" badge is suppressed during quiet hours.
    pub fn show_new_badge(&self, now: NaiveTime) -> bool {
        self.new_count() > 0 && !self.is_quiet_at(now)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.settings
            .as_ref()
            .map_or(DEFAULT_REFRESH_INTERVAL, |s| {
                Duration::from_secs(u64::from(s.refresh_interval_seconds))
            })
    }

    /// Put a live alert at the head of the list, replacing an older copy.
    pub fn push_live_alert(&mut self, alert: Alert) {
        self.alerts.retain(|a| a.id != alert.id);
        self.alerts.insert(0, alert);
    }
}

/// Notification list for one user, backed by the API.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    api: ApiClient,
    user_id: String,
    state: NotificationState,
}

impl NotificationCenter {
    pub fn new(api: ApiClient, user_id: impl Into<String>) -> Self {
        Self {
            api,
            user_id: user_id.into(),
            state: NotificationState::default(),
        }
    }

    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut NotificationState {
        &mut self.state
    }

    /// Fetch alerts and settings concurrently and overwrite local state.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        // ---
        let query = AlertQuery::default();
        let (alerts, settings) = tokio::join!(
            self.api.fetch_alerts(&query),
            self.api.fetch_settings(&self.user_id)
        );
        // Both or neither: a failed half leaves the previous state intact.
        let (alerts, settings) = (alerts?, settings?);
        self.state.alerts = alerts;
        self.state.settings = Some(settings);
        debug!(
            user_id = %self.user_id,
            unread = self.state.unread_count(),
            new = self.state.new_count(),
            "Notifications refreshed"
        );
        Ok(())
    }

    /// Record that the user opened the list now, then reload settings.
    pub async fn mark_seen(&mut self, now: DateTime<Utc>) -> Result<(), ApiError> {
        // ---
        let update = UserSettingsUpdate {
            last_notification_seen_at: Some(Some(now)),
            ..Default::default()
        };
        self.api.update_settings(&self.user_id, &update).await?;
        self.state.settings = Some(self.api.fetch_settings(&self.user_id).await?);
        Ok(())
    }

    pub async fn mark_read(&mut self, alert_id: i64) -> Result<(), ApiError> {
        self.api.acknowledge_alert(alert_id, &self.user_id).await?;
        self.refresh().await
    }

    /// Acknowledge every unread alert concurrently, then reload.
    pub async fn mark_all_read(&mut self) -> Result<(), ApiError> {
        // ---
        let unread: Vec<i64> = self
            .state
            .alerts
            .iter()
            .filter(|a| !a.is_acknowledged())
            .map(|a| a.id)
            .collect();

        let results = join_all(
            unread
                .iter()
                .map(|id| self.api.acknowledge_alert(*id, &self.user_id)),
        )
        .await;

        for result in results {
            if let Err(e) = result {
                warn!(user_id = %self.user_id, "Failed to acknowledge alert: {e}");
                return Err(e);
            }
        }
        self.refresh().await
    }

    /// Refresh on the settings' polling interval until `stop` fires or its
    /// sender is dropped. Failed refreshes are logged and retried on the
    /// next tick.
    pub async fn poll(&mut self, mut stop: oneshot::Receiver<()>) {
        // ---
        loop {
            if let Err(e) = self.refresh().await {
                warn!(user_id = %self.user_id, "Notification refresh failed: {e}");
            }

            let interval = self.state.refresh_interval();
            tokio::select! {
                _ = &mut stop => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!(user_id = %self.user_id, "Notification polling stopped");
    }
}
