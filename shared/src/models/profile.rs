//! Buyer profile, subscription and usage models

use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Inactive,
    PastDue,
    PendingCancellation,
}

/// Usage counter gated by the quota ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageCounter {
    Orders,
    Quotations,
}

impl UsageCounter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Quotations => "quotations",
        }
    }
}

impl std::fmt::Display for UsageCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Plan terms attached to a profile for the current subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub plan_id: EntityId,
    pub status: SubscriptionStatus,
    /// ISO currency code (lowercase, e.g. "usd")
    pub currency: String,
    /// Recurring fee in currency unit
    pub subscription_fee: f64,
    /// Orders included per billing period
    pub included_orders: u32,
    /// Quotations included per billing period
    pub included_quotations: u32,
    /// Cost per order beyond the included allowance
    pub price_per_extra_order: f64,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Included allowance for a counter
    pub fn included(&self, counter: UsageCounter) -> u32 {
        match counter {
            UsageCounter::Orders => self.included_orders,
            UsageCounter::Quotations => self.included_quotations,
        }
    }
}

/// Billing-period usage counters
///
/// One live record per profile per billing period; reset atomically
/// with subscription renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionUsage {
    pub billing_period_start: DateTime<Utc>,
    pub billing_period_end: DateTime<Utc>,
    pub orders_used: u32,
    pub quotations_used: u32,
    pub extra_orders_used: u32,
    /// Accumulated extra-order cost in currency unit
    pub extra_orders_cost: f64,
    /// Running bill for the period in currency unit
    pub current_bill: f64,
}

impl SubscriptionUsage {
    /// Fresh usage record for a new billing period
    pub fn new_period(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            billing_period_start: start,
            billing_period_end: end,
            orders_used: 0,
            quotations_used: 0,
            extra_orders_used: 0,
            extra_orders_cost: 0.0,
            current_bill: 0.0,
        }
    }

    pub fn used(&self, counter: UsageCounter) -> u32 {
        match counter {
            UsageCounter::Orders => self.orders_used,
            UsageCounter::Quotations => self.quotations_used,
        }
    }

    pub fn used_mut(&mut self, counter: UsageCounter) -> &mut u32 {
        match counter {
            UsageCounter::Orders => &mut self.orders_used,
            UsageCounter::Quotations => &mut self.quotations_used,
        }
    }
}

/// Per-profile behaviour preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePreferences {
    /// When set, new orders start in PENDING_PAYMENT and require a
    /// successful payment before entering the quotation flow
    #[serde(default)]
    pub require_order_payment: bool,
}

/// Buyer profile entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: EntityId,
    pub company_name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub preferences: ProfilePreferences,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
    pub subscription_usage: SubscriptionUsage,
    pub created_at: DateTime<Utc>,
}
