//! Notification model
//!
//! Lifecycle events fan out to recipients through the notification
//! dispatcher; delivery is fire-and-forget and never blocks core state.

use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of user-facing notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    OrderCreated,
    OrderStatus,
    ShippingUpdate,
    DeliveryConfirmation,
    QuotationRequested,
    QuotationSubmitted,
    QuotationStatus,
    JobSiteInvitation,
    JobSiteUpdate,
    PaymentStatus,
    SubscriptionStatus,
}

/// Notification entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: EntityId,
    pub recipient_id: EntityId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
