//! Money calculation utilities using rust_decimal for precision
//!
//! All calculations are done using `Decimal` internally, then converted to
//! `f64` for storage/serialization. Item validation lives here so every
//! creation and update path shares the same bounds.

use rust_decimal::prelude::*;
use shared::error::{AppError, ErrorCode};
use shared::models::OrderItem;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed unit price per item
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per item
const MAX_QUANTITY: i32 = 999_999;

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::with_message(
            ErrorCode::ValidationFailed,
            format!("{} must be a finite number, got {}", field_name, value),
        ));
    }
    Ok(())
}

/// Round a monetary value to 2 decimal places, half-up
pub fn round2(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| {
            d.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
                .to_f64()
                .unwrap_or(value)
        })
        .unwrap_or(value)
}

/// Convert a currency amount to minor units (cents), rounded half-up
pub fn minor_units(amount: f64) -> i64 {
    Decimal::from_f64(amount)
        .map(|d| {
            (d * Decimal::from(100))
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

/// Line total for an item: `quantity * unit_price`, rounded
pub fn line_total(quantity: i32, unit_price: f64) -> f64 {
    let q = Decimal::from(quantity);
    let p = Decimal::from_f64(unit_price).unwrap_or_default();
    (q * p)
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Sum of item line totals, rounded
pub fn subtotal(items: &[OrderItem]) -> f64 {
    let sum = items
        .iter()
        .fold(Decimal::ZERO, |acc, item| {
            acc + Decimal::from_f64(item.total_price).unwrap_or_default()
        });
    sum.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Tax on a subtotal at the given fractional rate, rounded
pub fn tax(subtotal: f64, rate: f64) -> f64 {
    let s = Decimal::from_f64(subtotal).unwrap_or_default();
    let r = Decimal::from_f64(rate).unwrap_or_default();
    (s * r)
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Validate an order item before persisting
pub fn validate_item(item: &OrderItem) -> Result<(), AppError> {
    if item.name.trim().is_empty() {
        return Err(AppError::validation("item name must not be empty"));
    }
    if item.quantity <= 0 {
        return Err(AppError::with_message(
            ErrorCode::ValidationFailed,
            format!("quantity must be positive, got {}", item.quantity),
        ));
    }
    if item.quantity > MAX_QUANTITY {
        return Err(AppError::with_message(
            ErrorCode::ValueOutOfRange,
            format!(
                "quantity exceeds maximum allowed ({}), got {}",
                MAX_QUANTITY, item.quantity
            ),
        ));
    }
    require_finite(item.unit_price, "unit_price")?;
    if item.unit_price < 0.0 {
        return Err(AppError::with_message(
            ErrorCode::ValidationFailed,
            format!("unit_price must be non-negative, got {}", item.unit_price),
        ));
    }
    if item.unit_price > MAX_PRICE {
        return Err(AppError::with_message(
            ErrorCode::ValueOutOfRange,
            format!(
                "unit_price exceeds maximum allowed ({}), got {}",
                MAX_PRICE, item.unit_price
            ),
        ));
    }
    require_finite(item.total_price, "total_price")?;
    Ok(())
}

/// Validate a batch of items, rejecting empty batches
pub fn validate_items(items: &[OrderItem]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::validation("at least one item is required"));
    }
    for item in items {
        validate_item(item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(1.005), 1.01);
        assert_eq!(round2(1.004), 1.0);
        assert_eq!(round2(2.675), 2.68);
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(minor_units(10.0), 1000);
        assert_eq!(minor_units(10.005), 1001);
        assert_eq!(minor_units(0.1 + 0.2), 30);
    }

    #[test]
    fn test_line_total_precision() {
        // 3 * 0.1 must not accumulate binary float error
        assert_eq!(line_total(3, 0.1), 0.3);
        assert_eq!(line_total(7, 19.99), 139.93);
    }

    #[test]
    fn test_subtotal_and_tax() {
        let mut a = OrderItem::new("Pipe", 10, Some("m".into()));
        a.unit_price = 2.5;
        a.total_price = 25.0;
        let mut b = OrderItem::new("Cement", 4, Some("bag".into()));
        b.unit_price = 7.5;
        b.total_price = 30.0;

        let items = vec![a, b];
        assert_eq!(subtotal(&items), 55.0);
        assert_eq!(tax(55.0, 0.10), 5.5);
    }

    #[test]
    fn test_validate_item_rejects_bad_values() {
        let mut item = OrderItem::new("Pipe", 0, None);
        assert!(validate_item(&item).is_err());

        item.quantity = 5;
        item.unit_price = f64::NAN;
        assert!(validate_item(&item).is_err());

        item.unit_price = -1.0;
        assert!(validate_item(&item).is_err());

        item.unit_price = 3.0;
        item.total_price = 15.0;
        assert!(validate_item(&item).is_ok());
    }

    #[test]
    fn test_validate_items_rejects_empty() {
        assert!(validate_items(&[]).is_err());
    }
}
