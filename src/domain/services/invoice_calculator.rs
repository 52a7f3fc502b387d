//! Invoice arithmetic.
//!
//! All amounts are whole Rials. For each line, `gross = quantity * unit_price`
//! and `net = gross - line_discount`. The subtotal is the sum of the nets, the
//! invoice discount comes off the subtotal, and tax is
//! `round_half_up(taxable * tax_rate_bp / 10000)`.

use serde::Serialize;

use crate::domain::entities::InvoiceItem;

/// Basis points in 100%.
pub const BASIS_POINTS: i32 = 10_000;

/// Amounts needed to price one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInput {
    pub quantity: i32,
    pub unit_price: i64,
    pub discount: i64,
}

impl From<&InvoiceItem> for LineInput {
    fn from(item: &InvoiceItem) -> Self {
        Self {
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineAmounts {
    pub gross: i64,
    pub discount: i64,
    pub net: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub lines: Vec<LineAmounts>,
    pub subtotal: i64,
    pub discount: i64,
    pub taxable: i64,
    pub tax_rate_bp: i32,
    pub tax_amount: i64,
    pub total: i64,
}

/// Why a set of lines cannot be priced. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TotalsError {
    #[error("An invoice needs at least one item")]
    NoItems,

    #[error("Line {0}: quantity must be positive")]
    InvalidQuantity(usize),

    #[error("Line {0}: amounts cannot be negative")]
    NegativeAmount(usize),

    #[error("Line {0}: discount exceeds the line amount")]
    LineDiscountTooLarge(usize),

    #[error("Discount cannot be negative or exceed the subtotal")]
    InvalidDiscount,

    #[error("Tax rate must be between 0 and 10000 basis points")]
    InvalidTaxRate,

    #[error("Amount too large")]
    Overflow,
}

/// `numerator / denominator` rounded half away from zero, for non-negative inputs.
fn round_half_up(numerator: i128, denominator: i128) -> i128 {
    (numerator * 2 + denominator) / (denominator * 2)
}

/// Price a set of lines.
pub fn calculate_totals(
    lines: &[LineInput],
    discount: i64,
    tax_rate_bp: i32,
) -> Result<InvoiceTotals, TotalsError> {
    if lines.is_empty() {
        return Err(TotalsError::NoItems);
    }
    if !(0..=BASIS_POINTS).contains(&tax_rate_bp) {
        return Err(TotalsError::InvalidTaxRate);
    }

    let mut amounts = Vec::with_capacity(lines.len());
    let mut subtotal: i64 = 0;

    for (i, line) in lines.iter().enumerate() {
        let n = i + 1;
        if line.quantity <= 0 {
            return Err(TotalsError::InvalidQuantity(n));
        }
        if line.unit_price < 0 || line.discount < 0 {
            return Err(TotalsError::NegativeAmount(n));
        }

        let gross = line
            .unit_price
            .checked_mul(line.quantity as i64)
            .ok_or(TotalsError::Overflow)?;
        if line.discount > gross {
            return Err(TotalsError::LineDiscountTooLarge(n));
        }
        let net = gross - line.discount;

        subtotal = subtotal.checked_add(net).ok_or(TotalsError::Overflow)?;
        amounts.push(LineAmounts {
            gross,
            discount: line.discount,
            net,
        });
    }

    if discount < 0 || discount > subtotal {
        return Err(TotalsError::InvalidDiscount);
    }
    let taxable = subtotal - discount;

    let tax_amount = round_half_up(taxable as i128 * tax_rate_bp as i128, BASIS_POINTS as i128);
    let tax_amount = i64::try_from(tax_amount).map_err(|_| TotalsError::Overflow)?;
    let total = taxable.checked_add(tax_amount).ok_or(TotalsError::Overflow)?;

    Ok(InvoiceTotals {
        lines: amounts,
        subtotal,
        discount,
        taxable,
        tax_rate_bp,
        tax_amount,
        total,
    })
}

/// Price stored invoice items.
pub fn totals_for_items(
    items: &[InvoiceItem],
    discount: i64,
    tax_rate_bp: i32,
) -> Result<InvoiceTotals, TotalsError> {
    let lines: Vec<LineInput> = items.iter().map(LineInput::from).collect();
    calculate_totals(&lines, discount, tax_rate_bp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn line(quantity: i32, unit_price: i64, discount: i64) -> LineInput {
        LineInput {
            quantity,
            unit_price,
            discount,
        }
    }

    #[test]
    fn test_full_calculation() {
        let totals = calculate_totals(
            &[line(2, 150_000, 0), line(1, 99_999, 9_999)],
            10_000,
            900,
        )
        .unwrap();

        assert_eq!(totals.lines[0].net, 300_000);
        assert_eq!(totals.lines[1].net, 90_000);
        assert_eq!(totals.subtotal, 390_000);
        assert_eq!(totals.taxable, 380_000);
        assert_eq!(totals.tax_amount, 34_200);
        assert_eq!(totals.total, 414_200);
    }

    #[test_case(5, 1000, 1 ; "exact half rounds up")]
    #[test_case(4, 1000, 0 ; "below half rounds down")]
    #[test_case(15, 1000, 2 ; "one and a half rounds up")]
    #[test_case(1_000_000, 0, 0 ; "zero rate")]
    #[test_case(333, 10_000, 333 ; "full rate")]
    fn test_tax_rounding(price: i64, rate: i32, expected_tax: i64) {
        let totals = calculate_totals(&[line(1, price, 0)], 0, rate).unwrap();
        assert_eq!(totals.tax_amount, expected_tax);
    }

    #[test]
    fn test_rejects_empty_invoice() {
        assert_eq!(calculate_totals(&[], 0, 900), Err(TotalsError::NoItems));
    }

    #[test]
    fn test_rejects_bad_lines() {
        assert_eq!(
            calculate_totals(&[line(1, 10, 0), line(0, 10, 0)], 0, 0),
            Err(TotalsError::InvalidQuantity(2))
        );
        assert_eq!(
            calculate_totals(&[line(1, -10, 0)], 0, 0),
            Err(TotalsError::NegativeAmount(1))
        );
        assert_eq!(
            calculate_totals(&[line(2, 10, 21)], 0, 0),
            Err(TotalsError::LineDiscountTooLarge(1))
        );
    }

    #[test]
    fn test_line_discount_may_equal_gross() {
        let totals = calculate_totals(&[line(2, 10, 20)], 0, 900).unwrap();
        assert_eq!(totals.total, 0);
    }

    #[test]
    fn test_rejects_bad_invoice_discount_and_rate() {
        assert_eq!(
            calculate_totals(&[line(1, 100, 0)], 101, 0),
            Err(TotalsError::InvalidDiscount)
        );
        assert_eq!(
            calculate_totals(&[line(1, 100, 0)], -1, 0),
            Err(TotalsError::InvalidDiscount)
        );
        assert_eq!(
            calculate_totals(&[line(1, 100, 0)], 0, 10_001),
            Err(TotalsError::InvalidTaxRate)
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(
            calculate_totals(&[line(i32::MAX, i64::MAX / 2, 0)], 0, 0),
            Err(TotalsError::Overflow)
        );
    }
}
