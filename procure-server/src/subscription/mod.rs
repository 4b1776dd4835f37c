//! Subscription quota ledger
//!
//! Gates order and quotation creation against the per-billing-period
//! allowances of the buyer's plan. `try_consume` performs the check and
//! the increment inside a single store-entry mutation, so concurrent
//! creators at the quota boundary cannot overshoot the limit.
//! Billing-period rollover is triggered by subscription renewal, not by
//! the ledger itself.

use crate::store::{Store, StoreError};
use chrono::{DateTime, Utc};
use shared::error::{AppError, ErrorCode};
use shared::models::{Profile, SubscriptionStatus, SubscriptionUsage, UsageCounter};
use std::sync::Arc;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("{counter} quota exceeded for current subscription period")]
    QuotaExceeded { counter: UsageCounter },

    #[error("profile {0} has no active subscription")]
    NoActiveSubscription(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => LedgerError::ProfileNotFound(id),
            other => LedgerError::ProfileNotFound(other.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ProfileNotFound(id) => {
                AppError::with_message(ErrorCode::ProfileNotFound, format!("Profile {} not found", id))
            }
            LedgerError::QuotaExceeded { counter } => AppError::quota_exceeded(counter.name()),
            LedgerError::NoActiveSubscription(id) => {
                AppError::new(ErrorCode::NoActiveSubscription).with_detail("profile", id)
            }
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// The quota ledger: a gate, not a ledger of money
#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<Store>,
}

impl QuotaLedger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    fn active_allowance(profile: &Profile, counter: UsageCounter) -> Option<u32> {
        profile
            .subscription
            .as_ref()
            .filter(|s| s.status == SubscriptionStatus::Active)
            .map(|s| s.included(counter))
    }

    /// Non-binding quota check: returns `false` (not an error) when the
    /// counter is exhausted or no active subscription exists, so callers
    /// decide whether to block or degrade.
    pub fn check_quota(&self, profile_id: &str, counter: UsageCounter) -> LedgerResult<bool> {
        let profile = self
            .store
            .profiles
            .get(profile_id)
            .ok_or_else(|| LedgerError::ProfileNotFound(profile_id.to_string()))?;
        let Some(included) = Self::active_allowance(&profile, counter) else {
            return Ok(false);
        };
        Ok(profile.subscription_usage.used(counter) < included)
    }

    /// Unconditional usage increment (display/accounting callers)
    pub fn update_usage(
        &self,
        profile_id: &str,
        counter: UsageCounter,
        delta: u32,
    ) -> LedgerResult<Profile> {
        self.store.profiles.mutate(profile_id, |profile| {
            *profile.subscription_usage.used_mut(counter) += delta;
            Ok::<_, LedgerError>(profile.clone())
        })
    }

    /// Atomic check-and-consume: increments the counter only if usage is
    /// still below the included allowance, all under the entry lock.
    ///
    /// Creation flows call this before persisting the new entity.
    pub fn try_consume(&self, profile_id: &str, counter: UsageCounter) -> LedgerResult<()> {
        self.store.profiles.mutate(profile_id, |profile| {
            let Some(included) = Self::active_allowance(profile, counter) else {
                return Err(LedgerError::QuotaExceeded { counter });
            };
            let used = profile.subscription_usage.used_mut(counter);
            if *used >= included {
                return Err(LedgerError::QuotaExceeded { counter });
            }
            *used += 1;
            Ok(())
        })
    }

    /// Release one unit of a counter, e.g. when entity creation fails
    /// after the quota was consumed.
    pub fn release(&self, profile_id: &str, counter: UsageCounter) -> LedgerResult<()> {
        self.store.profiles.mutate(profile_id, |profile| {
            let used = profile.subscription_usage.used_mut(counter);
            *used = used.saturating_sub(1);
            Ok::<_, LedgerError>(())
        })
    }

    /// Start a new billing period, zeroing all period counters.
    ///
    /// Invoked by subscription renewal.
    pub fn reset_billing_period(
        &self,
        profile_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LedgerResult<Profile> {
        self.store.profiles.mutate(profile_id, |profile| {
            profile.subscription_usage = SubscriptionUsage::new_period(start, end);
            tracing::info!(profile = profile_id, %start, %end, "billing period reset");
            Ok::<_, LedgerError>(profile.clone())
        })
    }
}
