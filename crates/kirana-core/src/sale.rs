//! # Sale Rules
//!
//! Totals, payment status, numbering and credit bookkeeping for a sale.
//!
//! ## Checkout Math
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line_total   = unit_price × qty − line discount %                      │
//! │  subtotal     = Σ line_total                                            │
//! │  discount     = subtotal × sale discount %                              │
//! │  tax (VAT)    = (subtotal − discount) × 13%                             │
//! │  total        = subtotal − discount + tax                               │
//! │                                                                         │
//! │  paid ≥ total        → paid                                             │
//! │  paid = 0 < total    → pending                                          │
//! │  otherwise           → partial                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are always recomputed here from catalogue prices; amounts a
//! client sends are never trusted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{OrderStatus, PaymentMethod, PaymentStatus, Sale, TaxRate};
use crate::validation::{validate_percentage_bps, validate_quantity, validate_sale_size};

// =============================================================================
// Lines and Totals
// =============================================================================

/// A priced sale line, ready for totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Money,
    pub quantity: i64,
    /// Line discount in basis points.
    pub discount_bps: u32,
}

impl PricedLine {
    /// Gross amount less the line discount.
    ///
    /// ## Errors
    /// - [`CoreError::AmountTooLarge`] when price × quantity overflows
    pub fn line_total(&self) -> CoreResult<Money> {
        self.unit_price
            .checked_multiply_quantity(self.quantity)
            .map(|gross| gross.apply_percentage_discount(self.discount_bps))
            .ok_or(CoreError::AmountTooLarge)
    }
}

/// Computed totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl SaleTotals {
    /// Computes totals for priced lines.
    ///
    /// ## Errors
    /// - [`CoreError::EmptySale`] with no lines
    /// - [`CoreError::SaleTooLarge`] / [`CoreError::QuantityTooLarge`] on limits
    /// - [`CoreError::AmountTooLarge`] when an amount overflows
    /// - [`CoreError::Validation`] for bad quantities or percentages
    ///
    /// ## Example
    /// ```rust
    /// use kirana_core::money::Money;
    /// use kirana_core::sale::{PricedLine, SaleTotals};
    /// use kirana_core::types::TaxRate;
    ///
    /// let lines = [PricedLine { unit_price: Money::from_paisa(5_000), quantity: 2, discount_bps: 0 }];
    /// let totals = SaleTotals::compute(&lines, 1_000, TaxRate::from_bps(1_300)).unwrap();
    /// assert_eq!(totals.subtotal.paisa(), 10_000);
    /// assert_eq!(totals.discount.paisa(), 1_000);
    /// assert_eq!(totals.tax.paisa(), 1_170);
    /// assert_eq!(totals.total.paisa(), 10_170);
    /// ```
    pub fn compute(lines: &[PricedLine], discount_bps: u32, vat: TaxRate) -> CoreResult<Self> {
        if lines.is_empty() {
            return Err(CoreError::EmptySale);
        }
        if validate_sale_size(lines.len()).is_err() {
            return Err(CoreError::SaleTooLarge {
                max: crate::MAX_SALE_ITEMS,
            });
        }

        for line in lines {
            if line.quantity > crate::MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: line.quantity,
                    max: crate::MAX_ITEM_QUANTITY,
                });
            }
            validate_quantity(line.quantity)?;
            validate_percentage_bps("line discount", line.discount_bps as i64)?;
        }
        validate_percentage_bps("discount", discount_bps as i64)?;

        let mut subtotal = Money::zero();
        for line in lines {
            subtotal = subtotal
                .checked_add(line.line_total()?)
                .ok_or(CoreError::AmountTooLarge)?;
        }
        let discount = subtotal.percentage_amount(discount_bps);
        let taxable = subtotal - discount;
        let tax = taxable.calculate_tax(vat);
        let total = taxable.checked_add(tax).ok_or(CoreError::AmountTooLarge)?;

        Ok(SaleTotals {
            subtotal,
            discount,
            tax,
            total,
        })
    }
}

// =============================================================================
// Payment
// =============================================================================

impl PaymentStatus {
    /// Derives the payment status from what was paid against the total.
    pub fn from_amounts(total: Money, paid: Money) -> Self {
        if paid >= total {
            PaymentStatus::Paid
        } else if paid.is_zero() {
            PaymentStatus::Pending
        } else {
            PaymentStatus::Partial
        }
    }
}

/// Change to hand back; never negative.
#[inline]
pub fn change_due(total: Money, paid: Money) -> Money {
    (paid - total).non_negative()
}

// =============================================================================
// Credit Bookkeeping
// =============================================================================

/// Amount to add to a customer's credit when a sale is recorded or edited.
///
/// Returns `None` when there is no registered customer, nothing is owed,
/// or a purchase entry for the sale already exists.
pub fn credit_to_record(has_customer: bool, due: Money, already_recorded: bool) -> Option<Money> {
    if !has_customer || already_recorded || !due.is_positive() {
        return None;
    }
    Some(due)
}

/// Amount of credit to reverse when a sale is returned or cancelled.
///
/// A credit sale reverses its whole total, whatever was paid on it since.
/// Any other sale reverses what it left unpaid (total − paid). The caller
/// clamps the reversal at the customer's balance.
pub fn credit_reversal(sale: &Sale) -> Option<Money> {
    if sale.customer_id.is_none() {
        return None;
    }
    let owed = match (sale.payment_method, sale.payment_status) {
        (PaymentMethod::Credit, _) => sale.total(),
        (_, PaymentStatus::Partial | PaymentStatus::Pending) => sale.due(),
        _ => Money::zero(),
    };
    owed.is_positive().then_some(owed)
}

/// Amount of credit to reverse when a completed sale is deleted.
///
/// Only credit sales are reversed, by their whole total.
pub fn deletion_reversal(sale: &Sale) -> Option<Money> {
    if sale.customer_id.is_none() || sale.payment_method != PaymentMethod::Credit {
        return None;
    }
    let total = sale.total();
    total.is_positive().then_some(total)
}

/// New credit balance after a reversal, clamped at zero.
#[inline]
pub fn reduce_credit(current: Money, reversal: Money) -> Money {
    (current - reversal).non_negative()
}

/// Parses a credit payment typed in by shop staff.
///
/// ## Errors
/// - "Enter a valid payment amount." when the text is not an amount
/// - "Payment amount must be greater than zero." for zero or negative
pub fn parse_payment_amount(input: &str) -> CoreResult<Money> {
    let amount: Money = input
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidPaymentAmount {
            reason: "Enter a valid payment amount.".to_string(),
        })?;

    if !amount.is_positive() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: "Payment amount must be greater than zero.".to_string(),
        });
    }
    Ok(amount)
}

/// Checks that a sale can move from `Completed` to `target`.
pub fn ensure_transition(sale: &Sale, target: OrderStatus) -> CoreResult<()> {
    if sale.order_status == OrderStatus::Completed && target != OrderStatus::Completed {
        return Ok(());
    }
    Err(CoreError::InvalidSaleStatus {
        sale_number: sale.sale_number.clone(),
        current_status: sale.order_status.as_str().to_string(),
    })
}

// =============================================================================
// Numbering
// =============================================================================

/// Sale number, e.g. `SAL2024031500042`.
pub fn sale_number(at: DateTime<Utc>, id: i64) -> String {
    format!("SAL{}{:05}", at.format("%Y%m%d"), id)
}

/// Receipt number, e.g. `REC2024031500042`.
pub fn receipt_number(at: DateTime<Utc>, id: i64) -> String {
    format!("REC{}{:05}", at.format("%Y%m%d"), id)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CustomerType;
    use chrono::TimeZone;

    fn line(price: i64, qty: i64, discount_bps: u32) -> PricedLine {
        PricedLine {
            unit_price: Money::from_paisa(price),
            quantity: qty,
            discount_bps,
        }
    }

    fn sale(total: i64, paid: i64, method: PaymentMethod) -> Sale {
        let now = Utc::now();
        Sale {
            id: 1,
            sale_number: "SAL2024010100001".to_string(),
            receipt_number: "REC2024010100001".to_string(),
            customer_id: Some(4),
            irregular_customer_id: None,
            customer_type: CustomerType::Regular,
            cashier_id: None,
            subtotal_paisa: total,
            discount_bps: 0,
            discount_paisa: 0,
            tax_paisa: 0,
            total_paisa: total,
            payment_method: method,
            paid_paisa: paid,
            payment_status: PaymentStatus::from_amounts(
                Money::from_paisa(total),
                Money::from_paisa(paid),
            ),
            order_status: OrderStatus::Completed,
            notes: None,
            is_printed: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_line_total_with_discount() {
        assert_eq!(line(2_500, 4, 0).line_total().unwrap().paisa(), 10_000);
        assert_eq!(line(2_500, 4, 500).line_total().unwrap().paisa(), 9_500);
    }

    #[test]
    fn test_totals_apply_vat_after_discount() {
        let totals =
            SaleTotals::compute(&[line(10_000, 1, 0), line(5_000, 2, 0)], 0, TaxRate::default())
                .unwrap();
        assert_eq!(totals.subtotal.paisa(), 20_000);
        assert_eq!(totals.discount.paisa(), 0);
        assert_eq!(totals.tax.paisa(), 2_600);
        assert_eq!(totals.total.paisa(), 22_600);
    }

    #[test]
    fn test_totals_reject_bad_input() {
        let vat = TaxRate::default();
        assert!(matches!(
            SaleTotals::compute(&[], 0, vat),
            Err(CoreError::EmptySale)
        ));
        assert!(matches!(
            SaleTotals::compute(&[line(100, 1000, 0)], 0, vat),
            Err(CoreError::QuantityTooLarge { .. })
        ));
        assert!(matches!(
            SaleTotals::compute(&[line(100, 0, 0)], 0, vat),
            Err(CoreError::Validation(_))
        ));
        assert!(SaleTotals::compute(&[line(100, 1, 0)], 10_001, vat).is_err());
        let many = vec![line(100, 1, 0); 101];
        assert!(matches!(
            SaleTotals::compute(&many, 0, vat),
            Err(CoreError::SaleTooLarge { .. })
        ));
    }

    #[test]
    fn test_totals_reject_overflowing_amounts() {
        let vat = TaxRate::default();
        let huge = PricedLine {
            unit_price: "50000000000000000".parse().unwrap(),
            quantity: 2,
            discount_bps: 0,
        };
        assert!(matches!(huge.line_total(), Err(CoreError::AmountTooLarge)));
        assert!(matches!(
            SaleTotals::compute(&[huge], 0, vat),
            Err(CoreError::AmountTooLarge)
        ));

        let near_max = line(i64::MAX / 2 + 1, 1, 0);
        assert!(matches!(
            SaleTotals::compute(&[near_max, near_max], 0, vat),
            Err(CoreError::AmountTooLarge)
        ));
        assert!(matches!(
            SaleTotals::compute(&[line(i64::MAX - 10, 1, 0)], 0, vat),
            Err(CoreError::AmountTooLarge)
        ));
    }

    #[test]
    fn test_payment_status() {
        let total = Money::from_paisa(1_000);
        assert_eq!(PaymentStatus::from_amounts(total, total), PaymentStatus::Paid);
        assert_eq!(
            PaymentStatus::from_amounts(total, Money::from_paisa(1_500)),
            PaymentStatus::Paid
        );
        assert_eq!(
            PaymentStatus::from_amounts(total, Money::from_paisa(400)),
            PaymentStatus::Partial
        );
        assert_eq!(
            PaymentStatus::from_amounts(total, Money::zero()),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_change_due() {
        let total = Money::from_paisa(1_000);
        assert_eq!(change_due(total, Money::from_paisa(1_500)).paisa(), 500);
        assert_eq!(change_due(total, Money::from_paisa(400)), Money::zero());
    }

    #[test]
    fn test_credit_to_record() {
        let due = Money::from_paisa(600);
        assert_eq!(credit_to_record(true, due, false), Some(due));
        assert_eq!(credit_to_record(false, due, false), None);
        assert_eq!(credit_to_record(true, due, true), None);
        assert_eq!(credit_to_record(true, Money::zero(), false), None);
    }

    #[test]
    fn test_credit_reversal() {
        assert_eq!(
            credit_reversal(&sale(1_000, 0, PaymentMethod::Credit)).map(|m| m.paisa()),
            Some(1_000)
        );
        // Credit sales reverse the total even once something was paid
        assert_eq!(
            credit_reversal(&sale(1_000, 300, PaymentMethod::Credit)).map(|m| m.paisa()),
            Some(1_000)
        );
        assert_eq!(
            credit_reversal(&sale(1_000, 1_000, PaymentMethod::Credit)).map(|m| m.paisa()),
            Some(1_000)
        );
        assert_eq!(
            credit_reversal(&sale(1_000, 400, PaymentMethod::Cash)).map(|m| m.paisa()),
            Some(600)
        );
        assert_eq!(credit_reversal(&sale(1_000, 1_000, PaymentMethod::Cash)), None);

        let mut walk_in = sale(1_000, 0, PaymentMethod::Credit);
        walk_in.customer_id = None;
        assert_eq!(credit_reversal(&walk_in), None);
    }

    #[test]
    fn test_deletion_reversal() {
        assert_eq!(
            deletion_reversal(&sale(1_000, 400, PaymentMethod::Credit)).map(|m| m.paisa()),
            Some(1_000)
        );
        assert_eq!(deletion_reversal(&sale(1_000, 400, PaymentMethod::Cash)), None);

        let mut walk_in = sale(1_000, 0, PaymentMethod::Credit);
        walk_in.customer_id = None;
        assert_eq!(deletion_reversal(&walk_in), None);
    }

    #[test]
    fn test_reduce_credit_clamps_at_zero() {
        let reduced = reduce_credit(Money::from_paisa(300), Money::from_paisa(1_000));
        assert_eq!(reduced, Money::zero());
    }

    #[test]
    fn test_parse_payment_amount() {
        assert_eq!(parse_payment_amount(" 250.50 ").unwrap().paisa(), 25_050);
        assert_eq!(
            parse_payment_amount("abc").unwrap_err().to_string(),
            "Enter a valid payment amount."
        );
        assert_eq!(
            parse_payment_amount("0").unwrap_err().to_string(),
            "Payment amount must be greater than zero."
        );
        assert_eq!(
            parse_payment_amount("-5").unwrap_err().to_string(),
            "Payment amount must be greater than zero."
        );
    }

    #[test]
    fn test_transitions_only_from_completed() {
        let mut s = sale(1_000, 1_000, PaymentMethod::Cash);
        assert!(ensure_transition(&s, OrderStatus::Returned).is_ok());
        s.order_status = OrderStatus::Returned;
        let err = ensure_transition(&s, OrderStatus::Cancelled).unwrap_err();
        assert!(err.to_string().contains("returned"));
    }

    #[test]
    fn test_numbering() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        assert_eq!(sale_number(at, 42), "SAL2024031500042");
        assert_eq!(receipt_number(at, 42), "REC2024031500042");
    }
}
