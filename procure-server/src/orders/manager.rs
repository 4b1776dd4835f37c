//! OrderManager - order lifecycle command processing
//!
//! # Operation flow
//!
//! ```text
//! create(cmd)
//!     ├─ 1. Validate items and job-site access
//!     ├─ 2. Atomically consume order quota
//!     ├─ 3. Persist the order (DRAFT flow skipped: orders start live)
//!     ├─ 4. Request a payment intent when payment-gated
//!     └─ 5. Signal the notification dispatcher (fire-and-forget)
//! ```
//!
//! Mutations on an existing order go through `Collection::mutate`, which
//! serializes writers per entity and discards drafts on error, so a
//! failing operation never leaves an order half-updated.

use super::transitions::is_valid_transition;
use crate::collaborators::{
    CollaboratorError, FileStore, NotificationDispatcher, PaymentGateway, PaymentIntent,
};
use crate::config::Config;
use crate::money;
use crate::store::{Store, StoreError};
use crate::subscription::{LedgerError, QuotaLedger};
use chrono::{DateTime, Utc};
use shared::error::{AppError, ErrorCode};
use shared::models::{
    DeliveryRecord, NotificationKind, Order, OrderItem, OrderStatus, PaymentDetails,
    PaymentStatus, UsageCounter,
};
use shared::types::{new_entity_id, EntityId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Order lifecycle errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error("job site not found: {0}")]
    JobSiteNotFound(String),

    #[error(transparent)]
    Quota(#[from] LedgerError),

    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order must be in shipping or partially delivered status, was {0}")]
    DeliveryNotAllowed(OrderStatus),

    #[error("delivered quantity exceeds ordered quantity for item {index}")]
    DeliveryExceedsOrder { index: usize },

    #[error("delivery item index {index} out of range (order has {len} items)")]
    DeliveryItemOutOfRange { index: usize, len: usize },

    #[error("{0}")]
    Validation(String),

    #[error("supplier not found: {0}")]
    SupplierNotFound(String),

    #[error("supplier is not active: {0}")]
    SupplierInactive(String),

    #[error("order is referenced by a quotation")]
    HasQuotations,

    #[error("payment intent already exists for this order")]
    PaymentIntentExists,

    #[error("no order references payment intent {0}")]
    PaymentNotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    External(#[from] CollaboratorError),
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => {
                AppError::new(ErrorCode::OrderNotFound).with_detail("id", id)
            }
            OrderError::JobSiteNotFound(id) => {
                AppError::new(ErrorCode::JobSiteNotFound).with_detail("id", id)
            }
            OrderError::Quota(e) => e.into(),
            OrderError::InvalidTransition { from, to } => {
                AppError::new(ErrorCode::InvalidTransition)
                    .with_detail("from", from.to_string())
                    .with_detail("to", to.to_string())
            }
            OrderError::DeliveryNotAllowed(status) => {
                AppError::new(ErrorCode::DeliveryNotAllowed)
                    .with_detail("status", status.to_string())
            }
            OrderError::DeliveryExceedsOrder { index } => {
                AppError::new(ErrorCode::DeliveryExceedsOrder)
                    .with_detail("item_index", index as u64)
            }
            OrderError::DeliveryItemOutOfRange { index, len } => {
                AppError::new(ErrorCode::DeliveryItemOutOfRange)
                    .with_detail("item_index", index as u64)
                    .with_detail("item_count", len as u64)
            }
            OrderError::Validation(msg) => AppError::validation(msg),
            OrderError::SupplierNotFound(id) => {
                AppError::new(ErrorCode::SupplierNotFound).with_detail("id", id)
            }
            OrderError::SupplierInactive(id) => {
                AppError::new(ErrorCode::SupplierInactive).with_detail("id", id)
            }
            OrderError::HasQuotations => AppError::new(ErrorCode::OrderHasQuotations),
            OrderError::PaymentIntentExists => AppError::new(ErrorCode::PaymentIntentExists),
            OrderError::PaymentNotFound(id) => {
                AppError::new(ErrorCode::PaymentNotFound).with_detail("intent_id", id)
            }
            OrderError::Storage(e) => e.into(),
            OrderError::External(e) => e.into(),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

/// Command to create a new order
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub buyer_profile_id: EntityId,
    pub job_site_id: EntityId,
    pub items: Vec<OrderItem>,
    pub required_delivery_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Dashboard counters over the order book
#[derive(Debug, Clone, PartialEq)]
pub struct QuickLookups {
    pub total_orders: usize,
    pub shipping: usize,
    pub delivered: usize,
    /// Sum of order totals in currency unit
    pub total_value: f64,
}

/// Order lifecycle manager
pub struct OrderManager {
    store: Arc<Store>,
    ledger: QuotaLedger,
    payments: Arc<dyn PaymentGateway>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    files: Arc<dyn FileStore>,
    config: Arc<Config>,
}

impl OrderManager {
    pub fn new(
        store: Arc<Store>,
        ledger: QuotaLedger,
        payments: Arc<dyn PaymentGateway>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        files: Arc<dyn FileStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            ledger,
            payments,
            dispatcher,
            files,
            config,
        }
    }

    /// Create an order for a buyer against a job site.
    ///
    /// The quota ledger is consulted first; pricing fields start zeroed
    /// and are filled later by the quotation flow. Payment-gated buyers
    /// get a PENDING_PAYMENT order plus a payment intent.
    pub async fn create(&self, cmd: CreateOrder) -> OrderResult<Order> {
        money::validate_items(&cmd.items).map_err(|e| OrderError::Validation(e.message))?;

        let job_site = self
            .store
            .job_sites
            .get(&cmd.job_site_id)
            .ok_or_else(|| OrderError::JobSiteNotFound(cmd.job_site_id.clone()))?;
        if !job_site.has_buyer(&cmd.buyer_profile_id) {
            return Err(OrderError::JobSiteNotFound(cmd.job_site_id.clone()));
        }

        let profile = self
            .store
            .profiles
            .get(&cmd.buyer_profile_id)
            .ok_or_else(|| {
                OrderError::Quota(LedgerError::ProfileNotFound(cmd.buyer_profile_id.clone()))
            })?;
        let require_payment = profile.preferences.require_order_payment;

        self.ledger
            .try_consume(&cmd.buyer_profile_id, UsageCounter::Orders)?;

        let now = Utc::now();
        let initial = if require_payment {
            OrderStatus::PendingPayment
        } else {
            OrderStatus::Pending
        };
        let mut order = Order {
            id: new_entity_id(),
            job_site_id: cmd.job_site_id,
            buyer_profile_id: cmd.buyer_profile_id.clone(),
            items: cmd
                .items
                .into_iter()
                .map(|mut item| {
                    item.unit_price = 0.0;
                    item.total_price = 0.0;
                    item.delivered_quantity = 0;
                    item.last_delivery_date = None;
                    item
                })
                .collect(),
            required_delivery_date: cmd.required_delivery_date,
            status: initial,
            status_history: Vec::new(),
            delivery_records: Vec::new(),
            invited_suppliers: Vec::new(),
            quotations: Vec::new(),
            selected_quotation_id: None,
            notes: cmd.notes,
            subtotal: 0.0,
            tax: 0.0,
            total: 0.0,
            invoice_url: None,
            require_payment,
            payment_status: require_payment.then_some(PaymentStatus::Pending),
            payment_intent_id: None,
            paid_at: None,
            payment_details: None,
            created_at: now,
            updated_at: now,
        };
        order.push_status(initial, Some("Order created".into()), now);

        if let Err(e) = self.store.orders.insert(order.id.clone(), order.clone()) {
            // Creation failed after the quota was consumed; hand the unit back
            let _ = self.ledger.release(&cmd.buyer_profile_id, UsageCounter::Orders);
            return Err(e.into());
        }
        tracing::info!(order = %order.id, buyer = %order.buyer_profile_id, status = %order.status, "order created");

        if require_payment {
            let intent = self.create_payment_intent(&order.id).await?;
            order.payment_intent_id = Some(intent.id);
        }

        self.dispatcher
            .notify(
                &order.buyer_profile_id,
                NotificationKind::OrderCreated,
                "Order created",
                &format!("Order {} was created", order.id),
                None,
            )
            .await;

        Ok(order)
    }

    /// Fetch an order scoped to its owning buyer
    pub fn find_by_id(&self, order_id: &str, buyer_profile_id: &str) -> OrderResult<Order> {
        self.store
            .orders
            .get(order_id)
            .filter(|o| o.buyer_profile_id == buyer_profile_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    /// All orders for a buyer, newest first
    pub fn find_all(&self, buyer_profile_id: &str) -> Vec<Order> {
        let mut orders = self
            .store
            .orders
            .filter(|o| o.buyer_profile_id == buyer_profile_id);
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Search a buyer's orders by item-name term, status and date range
    pub fn search(
        &self,
        buyer_profile_id: &str,
        term: Option<&str>,
        status: Option<OrderStatus>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<Order> {
        let term = term.map(str::to_lowercase);
        self.store.orders.filter(|o| {
            if o.buyer_profile_id != buyer_profile_id {
                return false;
            }
            if let Some(status) = status {
                if o.status != status {
                    return false;
                }
            }
            if let (Some(start), Some(end)) = (start, end) {
                if o.created_at < start || o.created_at > end {
                    return false;
                }
            }
            if let Some(term) = &term {
                let in_items = o
                    .items
                    .iter()
                    .any(|i| i.name.to_lowercase().contains(term));
                let in_notes = o
                    .notes
                    .as_ref()
                    .is_some_and(|n| n.to_lowercase().contains(term));
                if !in_items && !in_notes {
                    return false;
                }
            }
            true
        })
    }

    /// Dashboard counters, optionally restricted to a date range
    pub fn quick_lookups(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> QuickLookups {
        let orders = self.store.orders.filter(|o| match (start, end) {
            (Some(start), Some(end)) => o.created_at >= start && o.created_at <= end,
            _ => true,
        });
        QuickLookups {
            total_orders: orders.len(),
            shipping: orders
                .iter()
                .filter(|o| o.status == OrderStatus::Shipping)
                .count(),
            delivered: orders
                .iter()
                .filter(|o| o.status == OrderStatus::Delivered)
                .count(),
            total_value: money::round2(orders.iter().map(|o| o.total).sum()),
        }
    }

    /// Delete a buyer's order; refused while a quotation references it
    pub fn remove(&self, order_id: &str, buyer_profile_id: &str) -> OrderResult<()> {
        let order = self.find_by_id(order_id, buyer_profile_id)?;
        let referenced = !order.quotations.is_empty()
            || self
                .store
                .quotations
                .find(|q| q.order_id.as_deref() == Some(order_id))
                .is_some();
        if referenced {
            return Err(OrderError::HasQuotations);
        }
        self.store.orders.remove(order_id);
        Ok(())
    }

    /// Route a PENDING order to suppliers for quotation.
    ///
    /// All supplier ids must resolve to active suppliers before any state
    /// changes; routing is atomic. Each invited supplier is signalled once.
    pub async fn route_to_suppliers(
        &self,
        order_id: &str,
        supplier_ids: &[EntityId],
    ) -> OrderResult<Order> {
        if supplier_ids.is_empty() {
            return Err(OrderError::Validation(
                "at least one supplier is required".into(),
            ));
        }
        for id in supplier_ids {
            let supplier = self
                .store
                .suppliers
                .get(id)
                .ok_or_else(|| OrderError::SupplierNotFound(id.clone()))?;
            if !supplier.active {
                return Err(OrderError::SupplierInactive(id.clone()));
            }
        }

        let order = self.store.orders.mutate(order_id, |order| {
            if order.status != OrderStatus::Pending {
                return Err(OrderError::InvalidTransition {
                    from: order.status,
                    to: OrderStatus::PendingQuotations,
                });
            }
            order.invited_suppliers = supplier_ids.to_vec();
            order.push_status(
                OrderStatus::PendingQuotations,
                Some(format!("Order routed to {} suppliers", supplier_ids.len())),
                Utc::now(),
            );
            Ok(order.clone())
        })?;

        for supplier_id in supplier_ids {
            self.dispatcher
                .notify(
                    supplier_id,
                    NotificationKind::QuotationRequested,
                    "Quotation requested",
                    &format!("You have been invited to quote order {}", order_id),
                    None,
                )
                .await;
        }
        tracing::info!(order = order_id, suppliers = supplier_ids.len(), "order routed to suppliers");

        Ok(order)
    }

    /// Move an order to `new_status`, appending one history entry.
    ///
    /// A same-status call is a no-op; anything else is validated against
    /// the transition table.
    pub async fn update_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        notes: Option<String>,
    ) -> OrderResult<Order> {
        let order = self.store.orders.mutate(order_id, |order| {
            if order.status == new_status {
                return Ok(order.clone());
            }
            if !is_valid_transition(order.status, new_status) {
                return Err(OrderError::InvalidTransition {
                    from: order.status,
                    to: new_status,
                });
            }
            let notes =
                notes.clone().or_else(|| Some(format!("Status changed to {}", new_status)));
            order.push_status(new_status, notes, Utc::now());
            Ok(order.clone())
        })?;

        self.dispatcher
            .notify(
                &order.buyer_profile_id,
                NotificationKind::OrderStatus,
                "Order status updated",
                &format!("Order {} is now {}", order_id, order.status),
                None,
            )
            .await;

        Ok(order)
    }

    /// Cancel an order from any non-terminal state
    pub async fn cancel(&self, order_id: &str, notes: Option<String>) -> OrderResult<Order> {
        self.update_status(order_id, OrderStatus::Canceled, notes)
            .await
    }

    /// Record a delivery against a SHIPPING or PARTIALLY_DELIVERED order.
    ///
    /// The whole batch is validated before any item is applied: one
    /// out-of-range index or overflowing quantity rejects the call and
    /// no quantities change. The record itself is always appended (even
    /// net-zero) and exactly one history entry reflects the resulting
    /// status.
    pub async fn record_delivery(
        &self,
        order_id: &str,
        record: DeliveryRecord,
    ) -> OrderResult<Order> {
        let order = self.store.orders.mutate(order_id, |order| {
            if !order.status.is_deliverable() {
                return Err(OrderError::DeliveryNotAllowed(order.status));
            }

            let mut deltas = vec![0i64; order.items.len()];
            for delivered in &record.delivered_items {
                if delivered.quantity < 0 {
                    return Err(OrderError::Validation(
                        "delivered quantity must be non-negative".into(),
                    ));
                }
                if delivered.item_index >= order.items.len() {
                    return Err(OrderError::DeliveryItemOutOfRange {
                        index: delivered.item_index,
                        len: order.items.len(),
                    });
                }
                deltas[delivered.item_index] += i64::from(delivered.quantity);
            }
            for (index, delta) in deltas.iter().enumerate() {
                let item = &order.items[index];
                if i64::from(item.delivered_quantity) + delta > i64::from(item.quantity) {
                    return Err(OrderError::DeliveryExceedsOrder { index });
                }
            }

            for delivered in &record.delivered_items {
                let item = &mut order.items[delivered.item_index];
                item.delivered_quantity += delivered.quantity;
                item.last_delivery_date = Some(record.date);
            }
            order.delivery_records.push(record.clone());

            let now = Utc::now();
            if order.is_fully_delivered() {
                order.push_status(OrderStatus::Delivered, Some("All items delivered".into()), now);
            } else {
                order.push_status(
                    OrderStatus::PartiallyDelivered,
                    Some("Partial delivery recorded".into()),
                    now,
                );
            }
            Ok(order.clone())
        })?;

        self.dispatcher
            .notify(
                &order.buyer_profile_id,
                NotificationKind::DeliveryConfirmation,
                "Delivery recorded",
                &format!("Order {} is now {}", order_id, order.status),
                None,
            )
            .await;

        Ok(order)
    }

    /// Attach an invoice document to an order via the file store
    pub async fn upload_invoice(
        &self,
        order_id: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> OrderResult<Order> {
        if !self.store.orders.contains(order_id) {
            return Err(OrderError::NotFound(order_id.to_string()));
        }
        // External call first; the order is touched only on success
        let url = self.files.put(bytes, content_type).await?;
        self.store.orders.mutate(order_id, |order| {
            order.invoice_url = Some(url.clone());
            order.updated_at = Utc::now();
            Ok(order.clone())
        })
    }

    /// Request a payment intent for an order, keyed by its total in
    /// minor units. Fails if the order already references an intent.
    pub async fn create_payment_intent(&self, order_id: &str) -> OrderResult<PaymentIntent> {
        let order = self
            .store
            .orders
            .get(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        if order.payment_intent_id.is_some() {
            return Err(OrderError::PaymentIntentExists);
        }

        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), order_id.to_string());
        let intent = self
            .payments
            .create_intent(money::minor_units(order.total), &self.config.currency, metadata)
            .await?;

        self.store.orders.mutate(order_id, |order| {
            if order.payment_intent_id.is_some() {
                return Err(OrderError::PaymentIntentExists);
            }
            order.payment_intent_id = Some(intent.id.clone());
            order.updated_at = Utc::now();
            Ok(())
        })?;

        Ok(intent)
    }

    /// Handle a successful payment event for the order referencing
    /// `intent_id`, snapshotting payment details and moving to PENDING.
    pub async fn handle_payment_success(&self, intent_id: &str) -> OrderResult<Order> {
        let order = self
            .store
            .order_by_payment_intent(intent_id)
            .ok_or_else(|| OrderError::PaymentNotFound(intent_id.to_string()))?;

        // External reads complete before any local state changes
        let intent = self.payments.retrieve_intent(intent_id).await?;
        let method = match &intent.payment_method_id {
            Some(id) => Some(self.payments.retrieve_payment_method(id).await?),
            None => None,
        };

        let order = self.store.orders.mutate(&order.id, |order| {
            if !is_valid_transition(order.status, OrderStatus::Pending) {
                return Err(OrderError::InvalidTransition {
                    from: order.status,
                    to: OrderStatus::Pending,
                });
            }
            let now = Utc::now();
            order.payment_status = Some(PaymentStatus::Completed);
            order.paid_at = Some(now);
            order.payment_details = method.as_ref().map(|m| PaymentDetails {
                method: m.kind.clone(),
                last4: m.last4.clone(),
                brand: m.brand.clone(),
                receipt_url: intent.receipt_url.clone(),
            });
            order.push_status(OrderStatus::Pending, Some("Payment completed".into()), now);
            Ok(order.clone())
        })?;

        self.dispatcher
            .notify(
                &order.buyer_profile_id,
                NotificationKind::PaymentStatus,
                "Payment completed",
                &format!("Payment for order {} was completed", order.id),
                None,
            )
            .await;

        Ok(order)
    }

    /// Handle a failed payment event for the order referencing `intent_id`
    pub async fn handle_payment_failure(&self, intent_id: &str) -> OrderResult<Order> {
        let order = self
            .store
            .order_by_payment_intent(intent_id)
            .ok_or_else(|| OrderError::PaymentNotFound(intent_id.to_string()))?;

        let order = self.store.orders.mutate(&order.id, |order| {
            if !is_valid_transition(order.status, OrderStatus::PaymentFailed) {
                return Err(OrderError::InvalidTransition {
                    from: order.status,
                    to: OrderStatus::PaymentFailed,
                });
            }
            order.payment_status = Some(PaymentStatus::Failed);
            order.push_status(
                OrderStatus::PaymentFailed,
                Some("Payment failed".into()),
                Utc::now(),
            );
            Ok(order.clone())
        })?;

        self.dispatcher
            .notify(
                &order.buyer_profile_id,
                NotificationKind::PaymentStatus,
                "Payment failed",
                &format!("Payment for order {} failed", order.id),
                None,
            )
            .await;

        Ok(order)
    }
}
