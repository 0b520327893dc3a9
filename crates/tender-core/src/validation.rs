//! # Validation Module
//!
//! Input checks run before anything is allocated.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Cart building (outside the engine)                           │
//! │  ├── Product lookup, price freezing                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: begin_payment / apply_payment                                │
//! │  └── THIS MODULE: quantities, prices, rates, ids, amounts              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Post-allocation invariants (orchestrator)                    │
//! │  └── conservation, derived tax, ledger balance                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{LineItem, TaxRate};
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a non-negative amount (prices, CRV, discounts).
///
/// ## Example
/// ```rust
/// use tender_core::money::Money;
/// use tender_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("price", Money::from_cents(0)).is_ok());
/// assert!(validate_non_negative("price", Money::from_cents(-1)).is_err());
/// ```
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate (0% to 100%).
pub fn validate_tax_rate(rate: TaxRate) -> ValidationResult<()> {
    if rate.percent() < Decimal::ZERO || rate.percent() > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Line Validators
// =============================================================================

/// Validates a single line item.
///
/// ## Rules
/// - Id must not be empty
/// - Quantity 1..=999
/// - Price, discount and CRV non-negative; discount not above price
/// - Tax rate 0-100%
/// - WIC-approved lines carry a category
pub fn validate_line(line: &LineItem) -> ValidationResult<()> {
    if line.id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "line id".to_string(),
        });
    }

    validate_quantity(line.quantity)?;
    validate_non_negative("unit_price", line.unit_price)?;
    validate_non_negative("discount_per_unit", line.discount_per_unit)?;
    validate_non_negative("crv_per_unit", line.crv_per_unit)?;

    if line.discount_per_unit > line.unit_price {
        return Err(ValidationError::OutOfRange {
            field: "discount_per_unit".to_string(),
            min: 0,
            max: line.unit_price.cents(),
        });
    }

    validate_tax_rate(line.tax_rate)?;

    if line.is_wic_approved
        && line
            .wic_category
            .as_deref()
            .map_or(true, |c| c.trim().is_empty())
    {
        return Err(ValidationError::Required {
            field: format!("wic_category for line {}", line.id),
        });
    }

    Ok(())
}

/// Validates the whole transaction handed to `begin_payment`.
///
/// ## Rules
/// - At most MAX_LINE_ITEMS (100) lines
/// - Line ids are unique
/// - Every line passes [`validate_line`]
pub fn validate_lines(lines: &[LineItem]) -> ValidationResult<()> {
    if lines.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "line items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        validate_line(line)?;
        if !seen.insert(line.id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "line id".to_string(),
                value: line.id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn milk() -> LineItem {
        LineItem::new("1", "Milk", 1, Money::from_cents(429))
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(Money::from_cents(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_payment_amount(Money::from_cents(-100)).is_err());
    }

    #[test]
    fn test_validate_tax_rate() {
        assert!(validate_tax_rate(TaxRate::zero()).is_ok());
        assert!(validate_tax_rate(TaxRate::from_percent(dec!(9.375))).is_ok());
        assert!(validate_tax_rate(TaxRate::from_percent(dec!(100))).is_ok());
        assert!(validate_tax_rate(TaxRate::from_percent(dec!(100.01))).is_err());
        assert!(validate_tax_rate(TaxRate::from_percent(dec!(-1))).is_err());
    }

    #[test]
    fn test_validate_line() {
        assert!(validate_line(&milk()).is_ok());

        let blank_id = LineItem::new(" ", "Milk", 1, Money::from_cents(429));
        assert!(validate_line(&blank_id).is_err());

        let over_discount = milk().with_discount(Money::from_cents(500));
        assert!(validate_line(&over_discount).is_err());

        let mut no_category = milk().wic_approved("milk");
        no_category.wic_category = None;
        assert!(validate_line(&no_category).is_err());
    }

    #[test]
    fn test_validate_lines_rejects_duplicate_ids() {
        let lines = vec![milk(), milk()];
        assert_eq!(
            validate_lines(&lines),
            Err(ValidationError::Duplicate {
                field: "line id".to_string(),
                value: "1".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_lines_size_limit() {
        let lines: Vec<LineItem> = (0..=MAX_LINE_ITEMS)
            .map(|i| LineItem::new(i.to_string(), "Gum", 1, Money::from_cents(99)))
            .collect();
        assert!(validate_lines(&lines).is_err());
        assert!(validate_lines(&lines[..MAX_LINE_ITEMS]).is_ok());
    }
}
