//! Notification dispatcher contract
//!
//! Fire-and-forget: the dispatcher never mutates core state and a
//! dispatcher failure must not roll back the transition that fired it,
//! so `notify` is infallible from the caller's point of view.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use shared::models::{Notification, NotificationKind};
use shared::types::new_entity_id;

/// Receives lifecycle events and fires user-facing messages
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(
        &self,
        recipient_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        metadata: Option<serde_json::Value>,
    );
}

/// Default dispatcher: structured log line per notification
#[derive(Debug, Default)]
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn notify(
        &self,
        recipient_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        _metadata: Option<serde_json::Value>,
    ) {
        tracing::info!(
            recipient = recipient_id,
            kind = ?kind,
            title,
            message,
            "notification dispatched"
        );
    }
}

/// Test dispatcher that records every notification
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, recipient_id: &str) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn notify(
        &self,
        recipient_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        metadata: Option<serde_json::Value>,
    ) {
        self.sent.lock().push(Notification {
            id: new_entity_id(),
            recipient_id: recipient_id.to_string(),
            kind,
            title: title.to_string(),
            message: message.to_string(),
            metadata,
            read: false,
            created_at: Utc::now(),
        });
    }
}
