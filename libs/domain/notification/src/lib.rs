// [libs/domain/notification/src/lib.rs]
//! Minimal notification dispatch interface used by the telemetry router to
//! hand a regulated-incident alert to whatever carries it the rest of the
//! way (Slack, PagerDuty, email — all external collaborators). The
//! telemetry router depends only on `NotificationDispatcher`; everything
//! past the webhook POST belongs to a system outside this core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tracing::{instrument, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationSeverity {
    Info,
    Warning,
    Critical,
}

/// A single unit of outbound communication, generated by the telemetry
/// router when a compliance incident is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub severity: NotificationSeverity,
    pub title: String,
    pub message: String,
    /// Set when the notification originates from a compliance incident, so
    /// the recipient can cross-reference it.
    pub incident_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn for_incident(incident_number: &str, severity: NotificationSeverity, title: &str, message: &str) -> Self {
        Self {
            notification_id: uuid::Uuid::new_v4().to_string(),
            severity,
            title: title.to_string(),
            message: message.to_string(),
            incident_number: Some(incident_number.to_string()),
            created_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("NOTIFICATION_TRANSPORT_FAULT: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("NOTIFICATION_REJECTED: endpoint responded {0}")]
    Rejected(u16),
}

/// Dependency-injection seam between the telemetry router and whatever
/// carries a notification the rest of the way. Callers hold a
/// `Vec<Arc<dyn NotificationDispatcher>>` and fan out to all configured
/// sinks; an empty vector is a legal no-op configuration.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotificationError>>;
}

/// Posts the notification as JSON to a single configured webhook URL
/// (`SLACK_WEBHOOK_URL` or `ALERT_WEBHOOK_URL`). This is the
/// dispatch interface itself, not a transport abstraction over multiple
/// channels — one instance per configured URL.
pub struct WebhookNotificationDispatcher {
    webhook_url: String,
    http: reqwest::Client,
}

impl WebhookNotificationDispatcher {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }
}

impl NotificationDispatcher for WebhookNotificationDispatcher {
    fn dispatch<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotificationError>> {
        Box::pin(self.do_dispatch(notification))
    }
}

impl WebhookNotificationDispatcher {
    #[instrument(skip(self, notification), fields(notification_id = %notification.notification_id))]
    async fn do_dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        let response = self.http.post(&self.webhook_url).json(notification).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "notification webhook rejected dispatch");
            return Err(NotificationError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Discards every notification. Used when no webhook is configured, so
/// callers never need to special-case "no dispatcher".
#[derive(Default)]
pub struct NullNotificationDispatcher;

impl NotificationDispatcher for NullNotificationDispatcher {
    fn dispatch<'a>(&'a self, _notification: &'a Notification) -> BoxFuture<'a, Result<(), NotificationError>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_dispatcher_always_succeeds() {
        let dispatcher = NullNotificationDispatcher;
        let notification = Notification::for_incident("EHR-2026-0001", NotificationSeverity::Critical, "t", "m");
        assert!(dispatcher.dispatch(&notification).await.is_ok());
    }
}



