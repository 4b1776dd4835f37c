//! Quotation model
//!
//! A buyer's pricing request fanned out to invited suppliers, holding
//! the set of competing supplier quotes and the selection outcome.

use super::order::OrderItem;
use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quotation status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    #[default]
    Draft,
    Pending,
    SentToSuppliers,
    ReceivedQuotes,
    Accepted,
    Rejected,
    Expired,
}

impl QuotationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Expired)
    }
}

/// Supplier quote status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierQuoteStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// One supplier's priced bid against a quotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierQuote {
    pub supplier_id: EntityId,
    pub items: Vec<OrderItem>,
    /// Subtotal in currency unit
    pub subtotal: f64,
    /// Tax in currency unit
    pub tax: f64,
    /// Total in currency unit
    pub total: f64,
    pub delivery_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: SupplierQuoteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Unguessable token the supplier used to submit
    pub submission_token: String,
    pub submission_expiry: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Uploaded document reference (external object storage)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Quotation entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quotation {
    pub id: EntityId,
    pub job_site_id: EntityId,
    pub buyer_profile_id: EntityId,
    pub items: Vec<OrderItem>,
    pub valid_until: DateTime<Utc>,
    pub status: QuotationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub invited_suppliers: Vec<EntityId>,
    pub supplier_quotes: Vec<SupplierQuote>,
    /// Linked order, when the quotation was raised from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_supplier_id: Option<EntityId>,
    /// Whether the buyer (rather than the operator) decides bids
    pub is_self_managed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    /// The accepted supplier quote, if any (at most one can exist)
    pub fn accepted_quote(&self) -> Option<&SupplierQuote> {
        self.supplier_quotes
            .iter()
            .find(|q| q.status == SupplierQuoteStatus::Accepted)
    }

    /// True when every submitted quote has been rejected (and at least one exists)
    pub fn all_quotes_rejected(&self) -> bool {
        !self.supplier_quotes.is_empty()
            && self
                .supplier_quotes
                .iter()
                .all(|q| q.status == SupplierQuoteStatus::Rejected)
    }

    pub fn quote_for_supplier(&self, supplier_id: &str) -> Option<&SupplierQuote> {
        self.supplier_quotes
            .iter()
            .find(|q| q.supplier_id == supplier_id)
    }

    pub fn quote_for_supplier_mut(&mut self, supplier_id: &str) -> Option<&mut SupplierQuote> {
        self.supplier_quotes
            .iter_mut()
            .find(|q| q.supplier_id == supplier_id)
    }
}
