//! Order status transition table
//!
//! The transition graph is enforced centrally: every status change goes
//! through [`is_valid_transition`] so no caller can push an order into
//! an unreachable state.

use shared::models::OrderStatus;

/// Whether `from -> to` is a permitted order status transition
///
/// `Canceled` is reachable from any non-terminal state. `Delivered` and
/// `Canceled` are terminal. Same-status "transitions" are not valid;
/// callers treat them as no-ops before consulting the table.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    if from == to {
        return false;
    }
    if from.is_terminal() {
        return false;
    }
    if to == Canceled {
        return true;
    }

    matches!(
        (from, to),
        (Draft, Pending)
            | (Draft, PendingPayment)
            | (PendingPayment, Pending)
            | (PendingPayment, PaymentFailed)
            | (PaymentFailed, Pending)
            | (Pending, PendingQuotations)
            | (PendingQuotations, QuotationsReceived)
            | (QuotationsReceived, QuotationSelected)
            | (QuotationSelected, Shipping)
            | (Shipping, PartiallyDelivered)
            | (Shipping, Delivered)
            | (PartiallyDelivered, Shipping)
            | (PartiallyDelivered, Delivered)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::OrderStatus::*;

    #[test]
    fn test_happy_path_chain() {
        let chain = [
            Pending,
            PendingQuotations,
            QuotationsReceived,
            QuotationSelected,
            Shipping,
            PartiallyDelivered,
            Delivered,
        ];
        for pair in chain.windows(2) {
            assert!(
                is_valid_transition(pair[0], pair[1]),
                "{:?} -> {:?} should be valid",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_payment_gating() {
        assert!(is_valid_transition(Draft, PendingPayment));
        assert!(is_valid_transition(PendingPayment, PaymentFailed));
        assert!(is_valid_transition(PendingPayment, Pending));
        assert!(is_valid_transition(PaymentFailed, Pending));
        // Payment-gated orders cannot jump into the quotation flow
        assert!(!is_valid_transition(PendingPayment, PendingQuotations));
        assert!(!is_valid_transition(PaymentFailed, PendingQuotations));
    }

    #[test]
    fn test_partial_delivery_oscillation() {
        assert!(is_valid_transition(Shipping, PartiallyDelivered));
        assert!(is_valid_transition(PartiallyDelivered, Shipping));
    }

    #[test]
    fn test_cancel_from_non_terminal_only() {
        assert!(is_valid_transition(Pending, Canceled));
        assert!(is_valid_transition(Shipping, Canceled));
        assert!(!is_valid_transition(Delivered, Canceled));
        assert!(!is_valid_transition(Canceled, Pending));
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!is_valid_transition(Pending, Shipping));
        assert!(!is_valid_transition(Draft, Delivered));
        assert!(!is_valid_transition(PendingQuotations, QuotationSelected));
    }

    #[test]
    fn test_same_status_is_not_a_transition() {
        assert!(!is_valid_transition(Shipping, Shipping));
    }
}
