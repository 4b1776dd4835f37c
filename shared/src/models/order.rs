//! Order model
//!
//! A buyer's request for goods at a job site, tracked from creation
//! through routing, quotation selection, shipping and delivery.

use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Draft,
    Pending,
    PendingPayment,
    PaymentFailed,
    PendingQuotations,
    QuotationsReceived,
    QuotationSelected,
    Shipping,
    PartiallyDelivered,
    Delivered,
    Canceled,
}

impl OrderStatus {
    /// Terminal statuses admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Canceled)
    }

    /// Delivery recording is only allowed in these statuses
    pub fn is_deliverable(&self) -> bool {
        matches!(self, Self::Shipping | Self::PartiallyDelivered)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::PendingQuotations => "PENDING_QUOTATIONS",
            Self::QuotationsReceived => "QUOTATIONS_RECEIVED",
            Self::QuotationSelected => "QUOTATION_SELECTED",
            Self::Shipping => "SHIPPING",
            Self::PartiallyDelivered => "PARTIALLY_DELIVERED",
            Self::Delivered => "DELIVERED",
            Self::Canceled => "CANCELED",
        };
        write!(f, "{}", s)
    }
}

/// Payment lifecycle status for orders with `require_payment`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

/// Order line item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub quantity: i32,
    /// Unit of measure (e.g. "m", "kg", "unit")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Price per unit in currency unit (zero until priced by a supplier quote)
    pub unit_price: f64,
    /// Line total in currency unit
    pub total_price: f64,
    /// Quantity delivered so far, never exceeds `quantity`
    pub delivered_quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_delivery_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderItem {
    /// Create an unpriced item
    pub fn new(name: impl Into<String>, quantity: i32, unit: Option<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit,
            description: None,
            unit_price: 0.0,
            total_price: 0.0,
            delivered_quantity: 0,
            last_delivery_date: None,
            notes: None,
        }
    }

    /// Quantity still to be delivered
    pub fn remaining_quantity(&self) -> i32 {
        self.quantity - self.delivered_quantity
    }

    pub fn is_fully_delivered(&self) -> bool {
        self.delivered_quantity >= self.quantity
    }
}

/// One entry in the append-only status history log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderStatusEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A single delivered line within a delivery record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveredItem {
    /// Index into `Order::items`
    pub item_index: usize,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A delivery event against an order (possibly partial)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryRecord {
    pub date: DateTime<Utc>,
    pub delivered_items: Vec<DeliveredItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_partial: bool,
}

/// Display snapshot of a completed payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentDetails {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: EntityId,
    pub job_site_id: EntityId,
    pub buyer_profile_id: EntityId,
    pub items: Vec<OrderItem>,
    pub required_delivery_date: DateTime<Utc>,
    pub status: OrderStatus,
    /// Append-only, monotonically non-decreasing in timestamp;
    /// the last entry always matches `status`
    pub status_history: Vec<OrderStatusEntry>,
    /// Append-only log of delivery events
    pub delivery_records: Vec<DeliveryRecord>,
    pub invited_suppliers: Vec<EntityId>,
    /// Quotations raised against this order
    pub quotations: Vec<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_quotation_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Subtotal in currency unit
    pub subtotal: f64,
    /// Tax in currency unit
    pub tax: f64,
    /// Total in currency unit
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_url: Option<String>,
    pub require_payment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    /// Opaque id of the payment intent at the payment collaborator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_details: Option<PaymentDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Append a history entry and move to `status`
    pub fn push_status(&mut self, status: OrderStatus, notes: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.status_history.push(OrderStatusEntry {
            status,
            timestamp: now,
            notes,
        });
        self.updated_at = now;
    }

    /// True when every item is fully delivered
    pub fn is_fully_delivered(&self) -> bool {
        self.items.iter().all(OrderItem::is_fully_delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(!OrderStatus::Shipping.is_terminal());
    }

    #[test]
    fn test_item_delivery_accounting() {
        let mut item = OrderItem::new("Pipe", 10, Some("m".into()));
        assert_eq!(item.remaining_quantity(), 10);
        assert!(!item.is_fully_delivered());
        item.delivered_quantity = 10;
        assert!(item.is_fully_delivered());
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&OrderStatus::PendingQuotations).unwrap();
        assert_eq!(json, "\"PENDING_QUOTATIONS\"");
    }
}
