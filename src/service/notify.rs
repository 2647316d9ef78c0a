//! User-facing notifications: one per finished action, error or success.

use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Mutex;
use std::time::Duration;

use rmcp::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::service::utils::error_message;

/// How long a notification stays visible.
pub const NOTIFICATION_DURATION: Duration = Duration::from_secs(4);

/// Oldest notifications are dropped past this many.
const MAX_BUFFERED: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, JsonSchema, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, JsonSchema, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    /// Display duration in milliseconds
    pub duration_ms: u64,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            duration_ms: NOTIFICATION_DURATION.as_millis() as u64,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.created_at + self.duration_ms as i64
    }
}

pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str) -> Notification;

    fn notify_success(&self, message: &str) -> Notification;
}

/// Short message for an error: its serialized `reason`, else its Display form.
pub fn display_message<E: Serialize + Display>(error: &E) -> String {
    error_message(error).unwrap_or_else(|| error.to_string())
}

/// Buffers recent notifications and mirrors them to the log.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    buffer: Mutex<VecDeque<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, notification: Notification) -> Notification {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if buffer.len() == MAX_BUFFERED {
            buffer.pop_front();
        }
        buffer.push_back(notification.clone());
        notification
    }

    /// Notifications still visible now. Expired ones are discarded.
    pub fn active(&self) -> Vec<Notification> {
        self.active_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn active_at(&self, now_ms: i64) -> Vec<Notification> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.retain(|n| !n.is_expired_at(now_ms));
        buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NotificationCenter {
    fn notify_error(&self, message: &str) -> Notification {
        tracing::error!("Notification: {}", message);
        self.push(Notification::new(Severity::Error, message))
    }

    fn notify_success(&self, message: &str) -> Notification {
        tracing::info!("Notification: {}", message);
        self.push(Notification::new(Severity::Success, message))
    }
}
