//! QuotationEngine - bidding over buyer pricing requests
//!
//! A quotation starts as a buyer DRAFT, is fanned out to invited
//! suppliers, collects competing supplier quotes and ends with exactly
//! one accepted quote (or all rejected). Acceptance of one quote does
//! not auto-reject its siblings; they stay PENDING until decided.
//!
//! Every mutation goes through `Collection::mutate`, so concurrent
//! submissions and decisions on the same quotation are serialized and a
//! failing operation leaves the quotation untouched.

use crate::collaborators::{CollaboratorError, FileStore, NotificationDispatcher};
use crate::config::Config;
use crate::money;
use crate::orders::is_valid_transition;
use crate::store::{Store, StoreError};
use crate::subscription::{LedgerError, QuotaLedger};
use chrono::{DateTime, Duration, Utc};
use shared::error::{AppError, ErrorCode};
use shared::models::{
    NotificationKind, OrderItem, OrderStatus, Quotation, QuotationStatus, SupplierQuote,
    SupplierQuoteStatus, UsageCounter,
};
use shared::types::{generate_token, new_entity_id, EntityId};
use std::sync::Arc;
use thiserror::Error;

/// Token length (bytes of entropy) for supplier submission tokens
const SUBMISSION_TOKEN_BYTES: usize = 16;

/// Quotation engine errors
#[derive(Debug, Error)]
pub enum QuotationError {
    #[error("quotation not found: {0}")]
    NotFound(String),

    #[error("job site not found: {0}")]
    JobSiteNotFound(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error(transparent)]
    Quota(#[from] LedgerError),

    #[error("supplier not found: {0}")]
    SupplierNotFound(String),

    #[error("supplier is not active: {0}")]
    SupplierInactive(String),

    #[error("supplier {0} was not invited to this quotation")]
    NotInvited(String),

    #[error("supplier {0} already submitted a quote")]
    AlreadySubmitted(String),

    #[error("no quote from supplier {0} on this quotation")]
    QuoteNotFound(String),

    #[error("quote from supplier {0} was already decided")]
    QuoteAlreadyDecided(String),

    #[error("quotation is not self-managed")]
    NotSelfManaged,

    #[error("quotation is not in draft status, was {0:?}")]
    NotDraft(QuotationStatus),

    #[error("quotation already has an accepted quote")]
    AlreadyAccepted,

    #[error("quotation has supplier quotes and cannot be removed")]
    HasQuotes,

    #[error("quotation is no longer open for submissions")]
    SubmissionExpired,

    #[error("invalid order transition: {from} -> {to}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    External(#[from] CollaboratorError),
}

impl From<QuotationError> for AppError {
    fn from(err: QuotationError) -> Self {
        match err {
            QuotationError::NotFound(id) => {
                AppError::new(ErrorCode::QuotationNotFound).with_detail("id", id)
            }
            QuotationError::JobSiteNotFound(id) => {
                AppError::new(ErrorCode::JobSiteNotFound).with_detail("id", id)
            }
            QuotationError::OrderNotFound(id) => {
                AppError::new(ErrorCode::OrderNotFound).with_detail("id", id)
            }
            QuotationError::Quota(e) => e.into(),
            QuotationError::SupplierNotFound(id) => {
                AppError::new(ErrorCode::SupplierNotFound).with_detail("id", id)
            }
            QuotationError::SupplierInactive(id) => {
                AppError::new(ErrorCode::SupplierInactive).with_detail("id", id)
            }
            QuotationError::NotInvited(id) => {
                AppError::permission_denied("supplier was not invited to this quotation")
                    .with_detail("supplier_id", id)
            }
            QuotationError::AlreadySubmitted(id) => {
                AppError::conflict("supplier already submitted a quote")
                    .with_detail("supplier_id", id)
            }
            QuotationError::QuoteNotFound(id) => {
                AppError::new(ErrorCode::SupplierQuoteNotFound).with_detail("supplier_id", id)
            }
            QuotationError::QuoteAlreadyDecided(id) => {
                AppError::new(ErrorCode::QuoteAlreadyDecided).with_detail("supplier_id", id)
            }
            QuotationError::NotSelfManaged => AppError::new(ErrorCode::NotSelfManaged),
            QuotationError::NotDraft(status) => AppError::new(ErrorCode::QuotationNotDraft)
                .with_detail("status", format!("{status:?}")),
            QuotationError::AlreadyAccepted => AppError::new(ErrorCode::QuotationAlreadyAccepted),
            QuotationError::HasQuotes => AppError::new(ErrorCode::QuotationHasQuotes),
            QuotationError::SubmissionExpired => AppError::new(ErrorCode::SubmissionExpired),
            QuotationError::InvalidOrderTransition { from, to } => {
                AppError::new(ErrorCode::InvalidTransition)
                    .with_detail("from", from.to_string())
                    .with_detail("to", to.to_string())
            }
            QuotationError::Validation(msg) => AppError::validation(msg),
            QuotationError::Storage(e) => e.into(),
            QuotationError::External(e) => e.into(),
        }
    }
}

pub type QuotationResult<T> = Result<T, QuotationError>;

/// Command to create a new quotation
#[derive(Debug, Clone)]
pub struct CreateQuotation {
    pub buyer_profile_id: EntityId,
    pub job_site_id: EntityId,
    pub items: Vec<OrderItem>,
    pub valid_until: DateTime<Utc>,
    pub notes: Option<String>,
    /// Order to link the quotation to, when raised from one
    pub order_id: Option<EntityId>,
    pub is_self_managed: bool,
}

/// Partial update of a DRAFT quotation
#[derive(Debug, Clone, Default)]
pub struct UpdateQuotation {
    pub items: Option<Vec<OrderItem>>,
    /// Replaces the invitee list; the quotation has not been sent yet
    pub invited_suppliers: Option<Vec<EntityId>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// A supplier's priced submission against a quotation
#[derive(Debug, Clone)]
pub struct AddSupplierQuote {
    pub supplier_id: EntityId,
    /// Priced line items; totals are recomputed server-side
    pub items: Vec<OrderItem>,
    pub delivery_date: DateTime<Utc>,
    pub notes: Option<String>,
    /// Already-uploaded quote document, when the supplier attached one
    pub file_url: Option<String>,
}

/// Quotation and bidding engine
pub struct QuotationEngine {
    store: Arc<Store>,
    ledger: QuotaLedger,
    dispatcher: Arc<dyn NotificationDispatcher>,
    files: Arc<dyn FileStore>,
    config: Arc<Config>,
}

impl QuotationEngine {
    pub fn new(
        store: Arc<Store>,
        ledger: QuotaLedger,
        dispatcher: Arc<dyn NotificationDispatcher>,
        files: Arc<dyn FileStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            ledger,
            dispatcher,
            files,
            config,
        }
    }

    /// Create a DRAFT quotation for a buyer against a job site.
    ///
    /// Consumes one unit of the quotation quota. When `order_id` is
    /// given, the quotation is linked to the buyer's order both ways.
    pub fn create(&self, cmd: CreateQuotation) -> QuotationResult<Quotation> {
        money::validate_items(&cmd.items).map_err(|e| QuotationError::Validation(e.message))?;

        let job_site = self
            .store
            .job_sites
            .get(&cmd.job_site_id)
            .ok_or_else(|| QuotationError::JobSiteNotFound(cmd.job_site_id.clone()))?;
        if !job_site.has_buyer(&cmd.buyer_profile_id) {
            return Err(QuotationError::JobSiteNotFound(cmd.job_site_id.clone()));
        }
        if let Some(order_id) = &cmd.order_id {
            let linked = self
                .store
                .orders
                .get(order_id)
                .filter(|o| o.buyer_profile_id == cmd.buyer_profile_id);
            if linked.is_none() {
                return Err(QuotationError::OrderNotFound(order_id.clone()));
            }
        }

        self.ledger
            .try_consume(&cmd.buyer_profile_id, UsageCounter::Quotations)?;

        let now = Utc::now();
        let quotation = Quotation {
            id: new_entity_id(),
            job_site_id: cmd.job_site_id,
            buyer_profile_id: cmd.buyer_profile_id.clone(),
            items: cmd
                .items
                .into_iter()
                .map(|mut item| {
                    item.total_price = money::line_total(item.quantity, item.unit_price);
                    item
                })
                .collect(),
            valid_until: cmd.valid_until,
            status: QuotationStatus::Draft,
            notes: cmd.notes,
            invited_suppliers: Vec::new(),
            supplier_quotes: Vec::new(),
            order_id: cmd.order_id.clone(),
            selected_supplier_id: None,
            is_self_managed: cmd.is_self_managed,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self
            .store
            .quotations
            .insert(quotation.id.clone(), quotation.clone())
        {
            let _ = self
                .ledger
                .release(&cmd.buyer_profile_id, UsageCounter::Quotations);
            return Err(e.into());
        }

        if let Some(order_id) = &cmd.order_id {
            self.store.orders.mutate(order_id, |order| {
                order.quotations.push(quotation.id.clone());
                order.updated_at = now;
                Ok::<_, StoreError>(())
            })?;
        }
        tracing::info!(quotation = %quotation.id, buyer = %quotation.buyer_profile_id, "quotation created");

        Ok(quotation)
    }

    /// Fetch a quotation scoped to its owning buyer
    pub fn find_by_id(
        &self,
        quotation_id: &str,
        buyer_profile_id: &str,
    ) -> QuotationResult<Quotation> {
        self.store
            .quotations
            .get(quotation_id)
            .filter(|q| q.buyer_profile_id == buyer_profile_id)
            .ok_or_else(|| QuotationError::NotFound(quotation_id.to_string()))
    }

    /// Resolve a supplier's submission by its token.
    ///
    /// Tokens are checked at use-time: an expired one is refused even
    /// though the quote it references still exists.
    pub fn find_by_submission_token(
        &self,
        token: &str,
    ) -> QuotationResult<(Quotation, SupplierQuote)> {
        let quotation = self
            .store
            .quotation_by_submission_token(token)
            .ok_or_else(|| QuotationError::NotFound(token.to_string()))?;
        let quote = quotation
            .supplier_quotes
            .iter()
            .find(|q| q.submission_token == token)
            .cloned()
            .ok_or_else(|| QuotationError::NotFound(token.to_string()))?;
        if Utc::now() > quote.submission_expiry {
            return Err(QuotationError::SubmissionExpired);
        }
        Ok((quotation, quote))
    }

    /// All quotations for a buyer, newest first
    pub fn find_all(&self, buyer_profile_id: &str) -> Vec<Quotation> {
        let mut quotations = self
            .store
            .quotations
            .filter(|q| q.buyer_profile_id == buyer_profile_id);
        quotations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        quotations
    }

    /// Update a DRAFT quotation's items, invitees, validity and notes.
    ///
    /// Line totals are recomputed from quantity and unit price.
    pub fn update(
        &self,
        quotation_id: &str,
        buyer_profile_id: &str,
        update: UpdateQuotation,
    ) -> QuotationResult<Quotation> {
        if let Some(items) = &update.items {
            money::validate_items(items).map_err(|e| QuotationError::Validation(e.message))?;
        }
        if let Some(supplier_ids) = &update.invited_suppliers {
            for id in supplier_ids {
                let supplier = self
                    .store
                    .suppliers
                    .get(id)
                    .ok_or_else(|| QuotationError::SupplierNotFound(id.clone()))?;
                if !supplier.active {
                    return Err(QuotationError::SupplierInactive(id.clone()));
                }
            }
        }
        self.find_by_id(quotation_id, buyer_profile_id)?;

        self.store.quotations.mutate(quotation_id, |quotation| {
            if quotation.status != QuotationStatus::Draft {
                return Err(QuotationError::NotDraft(quotation.status));
            }
            if let Some(supplier_ids) = update.invited_suppliers.clone() {
                quotation.invited_suppliers = supplier_ids;
            }
            if let Some(items) = update.items.clone() {
                quotation.items = items
                    .into_iter()
                    .map(|mut item| {
                        item.total_price = money::line_total(item.quantity, item.unit_price);
                        item
                    })
                    .collect();
            }
            if let Some(valid_until) = update.valid_until {
                quotation.valid_until = valid_until;
            }
            if let Some(notes) = update.notes.clone() {
                quotation.notes = Some(notes);
            }
            quotation.updated_at = Utc::now();
            Ok(quotation.clone())
        })
    }

    /// Toggle buyer self-management on a DRAFT quotation
    pub fn set_self_managed(
        &self,
        quotation_id: &str,
        buyer_profile_id: &str,
        is_self_managed: bool,
    ) -> QuotationResult<Quotation> {
        self.find_by_id(quotation_id, buyer_profile_id)?;
        self.store.quotations.mutate(quotation_id, |quotation| {
            if quotation.status != QuotationStatus::Draft {
                return Err(QuotationError::NotDraft(quotation.status));
            }
            quotation.is_self_managed = is_self_managed;
            quotation.updated_at = Utc::now();
            Ok(quotation.clone())
        })
    }

    /// Fan a DRAFT quotation out to suppliers.
    ///
    /// All supplier ids must resolve to active suppliers before any
    /// state changes. Each invited supplier is signalled once.
    pub async fn send_to_suppliers(
        &self,
        quotation_id: &str,
        buyer_profile_id: &str,
        supplier_ids: &[EntityId],
    ) -> QuotationResult<Quotation> {
        if supplier_ids.is_empty() {
            return Err(QuotationError::Validation(
                "at least one supplier is required".into(),
            ));
        }
        for id in supplier_ids {
            let supplier = self
                .store
                .suppliers
                .get(id)
                .ok_or_else(|| QuotationError::SupplierNotFound(id.clone()))?;
            if !supplier.active {
                return Err(QuotationError::SupplierInactive(id.clone()));
            }
        }
        self.find_by_id(quotation_id, buyer_profile_id)?;

        let quotation = self.store.quotations.mutate(quotation_id, |quotation| {
            if quotation.status != QuotationStatus::Draft {
                return Err(QuotationError::NotDraft(quotation.status));
            }
            quotation.invited_suppliers = supplier_ids.to_vec();
            quotation.status = QuotationStatus::SentToSuppliers;
            quotation.updated_at = Utc::now();
            Ok(quotation.clone())
        })?;

        for supplier_id in supplier_ids {
            self.dispatcher
                .notify(
                    supplier_id,
                    NotificationKind::QuotationRequested,
                    "Quotation requested",
                    &format!("You have been invited to quote quotation {}", quotation_id),
                    None,
                )
                .await;
        }
        tracing::info!(
            quotation = quotation_id,
            suppliers = supplier_ids.len(),
            "quotation sent to suppliers"
        );

        Ok(quotation)
    }

    /// Record a supplier's priced quote.
    ///
    /// Only invited suppliers may submit, once each, while the quotation
    /// is still open. Subtotal, tax and total are computed server-side
    /// from the submitted line items. The first submission moves the
    /// quotation (and any linked order) to RECEIVED_QUOTES.
    pub async fn add_supplier_quote(
        &self,
        quotation_id: &str,
        quote: AddSupplierQuote,
    ) -> QuotationResult<Quotation> {
        money::validate_items(&quote.items).map_err(|e| QuotationError::Validation(e.message))?;

        let now = Utc::now();
        let items: Vec<OrderItem> = quote
            .items
            .into_iter()
            .map(|mut item| {
                item.total_price = money::line_total(item.quantity, item.unit_price);
                item
            })
            .collect();
        let subtotal = money::subtotal(&items);
        let tax = money::tax(subtotal, self.config.tax_rate);
        let total = money::round2(subtotal + tax);

        let quotation = self.store.quotations.mutate(quotation_id, |quotation| {
            if !matches!(
                quotation.status,
                QuotationStatus::SentToSuppliers | QuotationStatus::ReceivedQuotes
            ) {
                return Err(QuotationError::SubmissionExpired);
            }
            if now > quotation.valid_until {
                return Err(QuotationError::SubmissionExpired);
            }
            if !quotation
                .invited_suppliers
                .iter()
                .any(|id| id == &quote.supplier_id)
            {
                return Err(QuotationError::NotInvited(quote.supplier_id.clone()));
            }
            if quotation.quote_for_supplier(&quote.supplier_id).is_some() {
                return Err(QuotationError::AlreadySubmitted(quote.supplier_id.clone()));
            }

            quotation.supplier_quotes.push(SupplierQuote {
                supplier_id: quote.supplier_id.clone(),
                items: items.clone(),
                subtotal,
                tax,
                total,
                delivery_date: quote.delivery_date,
                notes: quote.notes.clone(),
                status: SupplierQuoteStatus::Pending,
                rejection_reason: None,
                submission_token: generate_token(SUBMISSION_TOKEN_BYTES),
                submission_expiry: now + Duration::days(self.config.quote_submission_days),
                submitted_at: Some(now),
                file_url: quote.file_url.clone(),
                created_at: now,
            });
            if quotation.status == QuotationStatus::SentToSuppliers {
                quotation.status = QuotationStatus::ReceivedQuotes;
            }
            quotation.updated_at = now;
            Ok(quotation.clone())
        })?;

        if let Some(order_id) = &quotation.order_id {
            self.store.orders.mutate(order_id, |order| {
                if order.status == OrderStatus::PendingQuotations {
                    order.push_status(
                        OrderStatus::QuotationsReceived,
                        Some("First supplier quote received".into()),
                        now,
                    );
                }
                Ok::<_, StoreError>(())
            })?;
        }

        self.dispatcher
            .notify(
                &quotation.buyer_profile_id,
                NotificationKind::QuotationSubmitted,
                "Quote received",
                &format!(
                    "Supplier {} submitted a quote on quotation {}",
                    quote.supplier_id, quotation_id
                ),
                None,
            )
            .await;

        Ok(quotation)
    }

    /// Accept one supplier's quote on a self-managed quotation.
    ///
    /// Moves the quotation to ACCEPTED and records the winning supplier.
    /// Sibling quotes are left PENDING. A linked order receives the
    /// winning prices and moves to QUOTATION_SELECTED.
    pub async fn accept_supplier_quote(
        &self,
        quotation_id: &str,
        buyer_profile_id: &str,
        supplier_id: &str,
    ) -> QuotationResult<Quotation> {
        self.find_by_id(quotation_id, buyer_profile_id)?;

        let quotation = self.store.quotations.mutate(quotation_id, |quotation| {
            if !quotation.is_self_managed {
                return Err(QuotationError::NotSelfManaged);
            }
            if quotation.status == QuotationStatus::Accepted {
                return Err(QuotationError::AlreadyAccepted);
            }
            let quote = quotation
                .quote_for_supplier_mut(supplier_id)
                .ok_or_else(|| QuotationError::QuoteNotFound(supplier_id.to_string()))?;
            if quote.status != SupplierQuoteStatus::Pending {
                return Err(QuotationError::QuoteAlreadyDecided(supplier_id.to_string()));
            }
            quote.status = SupplierQuoteStatus::Accepted;
            quotation.selected_supplier_id = Some(supplier_id.to_string());
            quotation.status = QuotationStatus::Accepted;
            quotation.updated_at = Utc::now();
            Ok(quotation.clone())
        })?;

        if let Some(order_id) = &quotation.order_id {
            let winning = quotation
                .accepted_quote()
                .ok_or_else(|| QuotationError::QuoteNotFound(supplier_id.to_string()))?
                .clone();
            self.store.orders.mutate(order_id, |order| {
                if !is_valid_transition(order.status, OrderStatus::QuotationSelected) {
                    return Err(QuotationError::InvalidOrderTransition {
                        from: order.status,
                        to: OrderStatus::QuotationSelected,
                    });
                }
                order.selected_quotation_id = Some(quotation.id.clone());
                order.items = winning.items.clone();
                order.subtotal = winning.subtotal;
                order.tax = winning.tax;
                order.total = winning.total;
                order.push_status(
                    OrderStatus::QuotationSelected,
                    Some(format!("Quote from supplier {} accepted", supplier_id)),
                    Utc::now(),
                );
                Ok(())
            })?;
        }

        self.dispatcher
            .notify(
                supplier_id,
                NotificationKind::QuotationStatus,
                "Quote accepted",
                &format!("Your quote on quotation {} was accepted", quotation_id),
                None,
            )
            .await;
        tracing::info!(quotation = quotation_id, supplier = supplier_id, "supplier quote accepted");

        Ok(quotation)
    }

    /// Reject one supplier's quote on a self-managed quotation.
    ///
    /// When the last pending quote is rejected the quotation itself
    /// moves to REJECTED.
    pub async fn reject_supplier_quote(
        &self,
        quotation_id: &str,
        buyer_profile_id: &str,
        supplier_id: &str,
        reason: Option<String>,
    ) -> QuotationResult<Quotation> {
        self.find_by_id(quotation_id, buyer_profile_id)?;

        let quotation = self.store.quotations.mutate(quotation_id, |quotation| {
            if !quotation.is_self_managed {
                return Err(QuotationError::NotSelfManaged);
            }
            let quote = quotation
                .quote_for_supplier_mut(supplier_id)
                .ok_or_else(|| QuotationError::QuoteNotFound(supplier_id.to_string()))?;
            if quote.status != SupplierQuoteStatus::Pending {
                return Err(QuotationError::QuoteAlreadyDecided(supplier_id.to_string()));
            }
            quote.status = SupplierQuoteStatus::Rejected;
            quote.rejection_reason = reason.clone();
            if quotation.all_quotes_rejected() {
                quotation.status = QuotationStatus::Rejected;
            }
            quotation.updated_at = Utc::now();
            Ok(quotation.clone())
        })?;

        self.dispatcher
            .notify(
                supplier_id,
                NotificationKind::QuotationStatus,
                "Quote rejected",
                &format!("Your quote on quotation {} was rejected", quotation_id),
                None,
            )
            .await;

        Ok(quotation)
    }

    /// Operator path: set a quotation's status directly.
    ///
    /// Refuses to overwrite an ACCEPTED quotation; the selection outcome
    /// is final. ACCEPTED itself is only reachable through quote
    /// acceptance, never by a direct status write, so a quotation with
    /// no winning quote can never read as accepted. A same-status call
    /// is a no-op.
    pub async fn update_status(
        &self,
        quotation_id: &str,
        new_status: QuotationStatus,
    ) -> QuotationResult<Quotation> {
        let quotation = self.store.quotations.mutate(quotation_id, |quotation| {
            if quotation.status == new_status {
                return Ok(quotation.clone());
            }
            if quotation.status == QuotationStatus::Accepted {
                return Err(QuotationError::AlreadyAccepted);
            }
            if new_status == QuotationStatus::Accepted && quotation.accepted_quote().is_none() {
                return Err(QuotationError::Validation(
                    "quotation cannot be marked accepted without an accepted supplier quote"
                        .into(),
                ));
            }
            quotation.status = new_status;
            quotation.updated_at = Utc::now();
            Ok(quotation.clone())
        })?;

        self.dispatcher
            .notify(
                &quotation.buyer_profile_id,
                NotificationKind::QuotationStatus,
                "Quotation status updated",
                &format!("Quotation {} is now {:?}", quotation_id, quotation.status),
                None,
            )
            .await;

        Ok(quotation)
    }

    /// Delete a buyer's quotation; only a DRAFT with no supplier quotes
    /// may be removed. A linked order drops its reference.
    pub fn remove(&self, quotation_id: &str, buyer_profile_id: &str) -> QuotationResult<()> {
        let quotation = self.find_by_id(quotation_id, buyer_profile_id)?;
        if quotation.status != QuotationStatus::Draft {
            return Err(QuotationError::NotDraft(quotation.status));
        }
        if !quotation.supplier_quotes.is_empty() {
            return Err(QuotationError::HasQuotes);
        }

        if let Some(order_id) = &quotation.order_id {
            self.store.orders.mutate(order_id, |order| {
                order.quotations.retain(|id| id != quotation_id);
                order.updated_at = Utc::now();
                Ok::<_, StoreError>(())
            })?;
        }
        self.store.quotations.remove(quotation_id);
        Ok(())
    }

    /// Attach a supplier's quote document via the file store
    pub async fn attach_quote_document(
        &self,
        quotation_id: &str,
        supplier_id: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> QuotationResult<Quotation> {
        let quotation = self
            .store
            .quotations
            .get(quotation_id)
            .ok_or_else(|| QuotationError::NotFound(quotation_id.to_string()))?;
        if quotation.quote_for_supplier(supplier_id).is_none() {
            return Err(QuotationError::QuoteNotFound(supplier_id.to_string()));
        }

        // External call first; the quotation is touched only on success
        let url = self.files.put(bytes, content_type).await?;
        self.store.quotations.mutate(quotation_id, |quotation| {
            let quote = quotation
                .quote_for_supplier_mut(supplier_id)
                .ok_or_else(|| QuotationError::QuoteNotFound(supplier_id.to_string()))?;
            quote.file_url = Some(url.clone());
            quotation.updated_at = Utc::now();
            Ok(quotation.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryFileStore, RecordingDispatcher};
    use shared::models::{
        JobSite, JobSiteStatus, Order, Profile, ProfilePreferences, Subscription,
        SubscriptionStatus, SubscriptionUsage, Supplier, SupplierContact,
    };

    struct Fixture {
        engine: QuotationEngine,
        store: Arc<Store>,
        dispatcher: Arc<RecordingDispatcher>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(Store::new());
        let ledger = QuotaLedger::new(store.clone());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let engine = QuotationEngine::new(
            store.clone(),
            ledger,
            dispatcher.clone(),
            Arc::new(InMemoryFileStore::default()),
            Arc::new(Config::default()),
        );

        let now = Utc::now();
        let mut usage = SubscriptionUsage::new_period(now, now + Duration::days(30));
        usage.quotations_used = 0;
        store
            .profiles
            .insert(
                "buyer",
                Profile {
                    id: "buyer".into(),
                    company_name: "Acme Construction".into(),
                    email: "buyer@acme.example".into(),
                    is_admin: false,
                    preferences: ProfilePreferences::default(),
                    subscription: Some(Subscription {
                        plan_id: "plan_basic".into(),
                        status: SubscriptionStatus::Active,
                        currency: "usd".into(),
                        subscription_fee: 49.0,
                        included_orders: 10,
                        included_quotations: 2,
                        price_per_extra_order: 5.0,
                        start_date: now,
                        end_date: None,
                    }),
                    subscription_usage: usage,
                    created_at: now,
                },
            )
            .unwrap();
        store
            .job_sites
            .insert(
                "site",
                JobSite {
                    id: "site".into(),
                    name: "Main Street Build".into(),
                    owner_profile_id: "buyer".into(),
                    address: None,
                    buyers: vec!["buyer".into()],
                    status: JobSiteStatus::Active,
                    created_at: now,
                },
            )
            .unwrap();
        for id in ["s1", "s2", "s3"] {
            store
                .suppliers
                .insert(
                    id,
                    Supplier {
                        id: id.into(),
                        company_name: format!("Supplier {id}"),
                        contact: SupplierContact {
                            name: "Sales".into(),
                            email: format!("sales@{id}.example"),
                            title: None,
                        },
                        active: true,
                        categories: vec![],
                        created_at: now,
                    },
                )
                .unwrap();
        }

        Fixture {
            engine,
            store,
            dispatcher,
        }
    }

    fn line(name: &str, quantity: i32, unit_price: f64) -> OrderItem {
        let mut item = OrderItem::new(name, quantity, Some("unit".into()));
        item.unit_price = unit_price;
        item
    }

    fn create_cmd() -> CreateQuotation {
        CreateQuotation {
            buyer_profile_id: "buyer".into(),
            job_site_id: "site".into(),
            items: vec![line("Cement", 10, 0.0)],
            valid_until: Utc::now() + Duration::days(14),
            notes: None,
            order_id: None,
            is_self_managed: true,
        }
    }

    async fn quotation_with_quotes(f: &Fixture, suppliers: &[&str]) -> Quotation {
        let q = f.engine.create(create_cmd()).unwrap();
        let ids: Vec<EntityId> = suppliers.iter().map(|s| (*s).to_string()).collect();
        f.engine
            .send_to_suppliers(&q.id, "buyer", &ids)
            .await
            .unwrap();
        for supplier in suppliers {
            f.engine
                .add_supplier_quote(
                    &q.id,
                    AddSupplierQuote {
                        supplier_id: (*supplier).to_string(),
                        items: vec![line("Cement", 10, 12.5)],
                        delivery_date: Utc::now() + Duration::days(7),
                        notes: None,
                        file_url: None,
                    },
                )
                .await
                .unwrap();
        }
        f.store.quotations.get(&q.id).unwrap()
    }

    #[test]
    fn test_create_consumes_quotation_quota() {
        let f = fixture();
        f.engine.create(create_cmd()).unwrap();
        f.engine.create(create_cmd()).unwrap();

        // Plan includes 2 quotations; the third must be refused
        let err = f.engine.create(create_cmd()).unwrap_err();
        assert!(matches!(
            err,
            QuotationError::Quota(LedgerError::QuotaExceeded {
                counter: UsageCounter::Quotations
            })
        ));
    }

    #[tokio::test]
    async fn test_send_to_suppliers_requires_draft() {
        let f = fixture();
        let q = f.engine.create(create_cmd()).unwrap();
        let suppliers = vec!["s1".to_string()];
        let sent = f
            .engine
            .send_to_suppliers(&q.id, "buyer", &suppliers)
            .await
            .unwrap();
        assert_eq!(sent.status, QuotationStatus::SentToSuppliers);
        assert_eq!(f.dispatcher.sent_to("s1").len(), 1);

        let err = f
            .engine
            .send_to_suppliers(&q.id, "buyer", &suppliers)
            .await
            .unwrap_err();
        assert!(matches!(err, QuotationError::NotDraft(_)));
    }

    #[tokio::test]
    async fn test_uninvited_supplier_cannot_submit() {
        let f = fixture();
        let q = f.engine.create(create_cmd()).unwrap();
        f.engine
            .send_to_suppliers(&q.id, "buyer", &["s1".to_string()])
            .await
            .unwrap();

        let err = f
            .engine
            .add_supplier_quote(
                &q.id,
                AddSupplierQuote {
                    supplier_id: "s2".into(),
                    items: vec![line("Cement", 10, 12.5)],
                    delivery_date: Utc::now() + Duration::days(7),
                    notes: None,
                    file_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QuotationError::NotInvited(_)));
    }

    #[tokio::test]
    async fn test_quote_totals_and_status_on_first_submission() {
        let f = fixture();
        let q = quotation_with_quotes(&f, &["s1"]).await;
        assert_eq!(q.status, QuotationStatus::ReceivedQuotes);

        let quote = q.quote_for_supplier("s1").unwrap();
        assert_eq!(quote.subtotal, 125.0);
        assert_eq!(quote.tax, 12.5);
        assert_eq!(quote.total, 137.5);
        assert!(quote.submitted_at.is_some());
        assert_eq!(quote.submission_token.len(), SUBMISSION_TOKEN_BYTES * 2);
        // Buyer gets a submission signal
        assert_eq!(f.dispatcher.sent_to("buyer").len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_refused() {
        let f = fixture();
        let q = quotation_with_quotes(&f, &["s1"]).await;
        let err = f
            .engine
            .add_supplier_quote(
                &q.id,
                AddSupplierQuote {
                    supplier_id: "s1".into(),
                    items: vec![line("Cement", 10, 11.0)],
                    delivery_date: Utc::now() + Duration::days(7),
                    notes: None,
                    file_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QuotationError::AlreadySubmitted(_)));
    }

    #[tokio::test]
    async fn test_accept_leaves_siblings_pending() {
        let f = fixture();
        let q = quotation_with_quotes(&f, &["s1", "s2", "s3"]).await;
        let accepted = f
            .engine
            .accept_supplier_quote(&q.id, "buyer", "s2")
            .await
            .unwrap();

        assert_eq!(accepted.status, QuotationStatus::Accepted);
        assert_eq!(accepted.selected_supplier_id.as_deref(), Some("s2"));
        assert_eq!(
            accepted.quote_for_supplier("s1").unwrap().status,
            SupplierQuoteStatus::Pending
        );
        assert_eq!(
            accepted.quote_for_supplier("s3").unwrap().status,
            SupplierQuoteStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_second_accept_is_refused() {
        let f = fixture();
        let q = quotation_with_quotes(&f, &["s1", "s2"]).await;
        f.engine
            .accept_supplier_quote(&q.id, "buyer", "s1")
            .await
            .unwrap();

        let err = f
            .engine
            .accept_supplier_quote(&q.id, "buyer", "s2")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotationError::AlreadyAccepted));
    }

    #[tokio::test]
    async fn test_rejecting_last_quote_rejects_quotation() {
        let f = fixture();
        let q = quotation_with_quotes(&f, &["s1", "s2", "s3"]).await;

        for supplier in ["s1", "s2"] {
            let after = f
                .engine
                .reject_supplier_quote(&q.id, "buyer", supplier, Some("too expensive".into()))
                .await
                .unwrap();
            assert_eq!(after.status, QuotationStatus::ReceivedQuotes);
        }
        let after = f
            .engine
            .reject_supplier_quote(&q.id, "buyer", "s3", None)
            .await
            .unwrap();
        assert_eq!(after.status, QuotationStatus::Rejected);
        assert!(after.all_quotes_rejected());
    }

    #[tokio::test]
    async fn test_operator_update_cannot_overwrite_accepted() {
        let f = fixture();
        let q = quotation_with_quotes(&f, &["s1"]).await;
        f.engine
            .accept_supplier_quote(&q.id, "buyer", "s1")
            .await
            .unwrap();

        let err = f
            .engine
            .update_status(&q.id, QuotationStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, QuotationError::AlreadyAccepted));
    }

    #[tokio::test]
    async fn test_operator_cannot_mark_accepted_without_winning_quote() {
        let f = fixture();
        let q = quotation_with_quotes(&f, &["s1", "s2"]).await;

        let err = f
            .engine
            .update_status(&q.id, QuotationStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, QuotationError::Validation(_)));

        let after = f.store.quotations.get(&q.id).unwrap();
        assert_eq!(after.status, QuotationStatus::ReceivedQuotes);
        assert!(after.selected_supplier_id.is_none());
    }

    #[tokio::test]
    async fn test_submission_token_resolves_until_expiry() {
        let f = fixture();
        let q = f.engine.create(create_cmd()).unwrap();
        f.engine
            .send_to_suppliers(&q.id, "buyer", &["s1".to_string()])
            .await
            .unwrap();
        f.engine
            .add_supplier_quote(
                &q.id,
                AddSupplierQuote {
                    supplier_id: "s1".into(),
                    items: vec![line("Cement", 10, 12.5)],
                    delivery_date: Utc::now() + Duration::days(7),
                    notes: None,
                    file_url: Some("https://files.example/quote.pdf".into()),
                },
            )
            .await
            .unwrap();
        let token = f
            .store
            .quotations
            .get(&q.id)
            .unwrap()
            .quote_for_supplier("s1")
            .unwrap()
            .submission_token
            .clone();

        let (found, quote) = f.engine.find_by_submission_token(&token).unwrap();
        assert_eq!(found.id, q.id);
        assert_eq!(quote.supplier_id, "s1");
        assert_eq!(
            quote.file_url.as_deref(),
            Some("https://files.example/quote.pdf")
        );

        let err = f.engine.find_by_submission_token("deadbeef").unwrap_err();
        assert!(matches!(err, QuotationError::NotFound(_)));

        // Expiry is checked when the token is used, not when it is minted
        f.store
            .quotations
            .mutate(&q.id, |quotation| {
                quotation
                    .quote_for_supplier_mut("s1")
                    .ok_or_else(|| StoreError::NotFound("s1".into()))?
                    .submission_expiry = Utc::now() - Duration::hours(1);
                Ok::<_, StoreError>(())
            })
            .unwrap();
        let err = f.engine.find_by_submission_token(&token).unwrap_err();
        assert!(matches!(err, QuotationError::SubmissionExpired));
    }

    #[test]
    fn test_update_replaces_invitee_list_on_draft() {
        let f = fixture();
        let q = f.engine.create(create_cmd()).unwrap();

        let updated = f
            .engine
            .update(
                &q.id,
                "buyer",
                UpdateQuotation {
                    invited_suppliers: Some(vec!["s1".into(), "s2".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            updated.invited_suppliers,
            vec!["s1".to_string(), "s2".to_string()]
        );

        let err = f
            .engine
            .update(
                &q.id,
                "buyer",
                UpdateQuotation {
                    invited_suppliers: Some(vec!["ghost".into()]),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, QuotationError::SupplierNotFound(_)));

        f.store
            .suppliers
            .mutate("s3", |s| {
                s.active = false;
                Ok::<_, StoreError>(())
            })
            .unwrap();
        let err = f
            .engine
            .update(
                &q.id,
                "buyer",
                UpdateQuotation {
                    invited_suppliers: Some(vec!["s3".into()]),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, QuotationError::SupplierInactive(_)));
    }

    #[tokio::test]
    async fn test_not_self_managed_blocks_buyer_decisions() {
        let f = fixture();
        let q = f.engine.create(create_cmd()).unwrap();
        f.engine.set_self_managed(&q.id, "buyer", false).unwrap();
        f.engine
            .send_to_suppliers(&q.id, "buyer", &["s1".to_string()])
            .await
            .unwrap();
        f.engine
            .add_supplier_quote(
                &q.id,
                AddSupplierQuote {
                    supplier_id: "s1".into(),
                    items: vec![line("Cement", 10, 12.5)],
                    delivery_date: Utc::now() + Duration::days(7),
                    notes: None,
                    file_url: None,
                },
            )
            .await
            .unwrap();

        let err = f
            .engine
            .accept_supplier_quote(&q.id, "buyer", "s1")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotationError::NotSelfManaged));
    }

    #[tokio::test]
    async fn test_remove_refused_with_quotes() {
        let f = fixture();
        let q = quotation_with_quotes(&f, &["s1"]).await;
        let err = f.engine.remove(&q.id, "buyer").unwrap_err();
        // Not draft anymore once sent, regardless of quotes
        assert!(matches!(err, QuotationError::NotDraft(_)));

        let draft = f.engine.create(create_cmd()).unwrap();
        f.engine.remove(&draft.id, "buyer").unwrap();
        assert!(f.store.quotations.get(&draft.id).is_none());
    }

    #[tokio::test]
    async fn test_linked_order_receives_winning_prices() {
        let f = fixture();
        let now = Utc::now();
        let order = Order {
            id: "ord1".into(),
            job_site_id: "site".into(),
            buyer_profile_id: "buyer".into(),
            items: vec![line("Cement", 10, 0.0)],
            required_delivery_date: now + Duration::days(30),
            status: OrderStatus::PendingQuotations,
            status_history: Vec::new(),
            delivery_records: Vec::new(),
            invited_suppliers: Vec::new(),
            quotations: Vec::new(),
            selected_quotation_id: None,
            notes: None,
            subtotal: 0.0,
            tax: 0.0,
            total: 0.0,
            invoice_url: None,
            require_payment: false,
            payment_status: None,
            payment_intent_id: None,
            paid_at: None,
            payment_details: None,
            created_at: now,
            updated_at: now,
        };
        f.store.orders.insert("ord1", order).unwrap();

        let mut cmd = create_cmd();
        cmd.order_id = Some("ord1".into());
        let q = f.engine.create(cmd).unwrap();
        assert_eq!(
            f.store.orders.get("ord1").unwrap().quotations,
            vec![q.id.clone()]
        );

        f.engine
            .send_to_suppliers(&q.id, "buyer", &["s1".to_string()])
            .await
            .unwrap();
        f.engine
            .add_supplier_quote(
                &q.id,
                AddSupplierQuote {
                    supplier_id: "s1".into(),
                    items: vec![line("Cement", 10, 12.5)],
                    delivery_date: now + Duration::days(7),
                    notes: None,
                    file_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            f.store.orders.get("ord1").unwrap().status,
            OrderStatus::QuotationsReceived
        );

        f.engine
            .accept_supplier_quote(&q.id, "buyer", "s1")
            .await
            .unwrap();
        let order = f.store.orders.get("ord1").unwrap();
        assert_eq!(order.status, OrderStatus::QuotationSelected);
        assert_eq!(order.selected_quotation_id.as_deref(), Some(q.id.as_str()));
        assert_eq!(order.subtotal, 125.0);
        assert_eq!(order.tax, 12.5);
        assert_eq!(order.total, 137.5);
    }
}
