//! Bill amount computation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use billdesk_core::{DomainError, DomainResult, ItemId, Money, money};

/// One requested bill line, before its item has been resolved.
///
/// `unit_price: None` means "use the item's current price".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub item_id: ItemId,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

/// Drop lines with a non-positive quantity.
///
/// Fails when nothing billable remains.
pub fn billable_lines(lines: Vec<LineRequest>) -> DomainResult<Vec<LineRequest>> {
    let kept: Vec<LineRequest> = lines.into_iter().filter(|line| line.quantity > 0).collect();
    if kept.is_empty() {
        return Err(DomainError::validation(
            "bill must contain at least one item with quantity > 0",
        ));
    }
    Ok(kept)
}

/// Derived bill amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillAmounts {
    pub total_amount: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
}

impl BillAmounts {
    /// `total = Σ line totals`, `final = total + tax - discount`.
    ///
    /// Absent tax/discount count as zero. A discount that would push the final
    /// amount below zero is rejected, as is a final amount above
    /// [`money::max_amount`].
    pub fn compute<I>(line_totals: I, tax: Option<Money>, discount: Option<Money>) -> DomainResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        let total_amount = money::sum(line_totals)?;
        let tax_amount = money::non_negative("tax amount", tax.unwrap_or_default())?;
        let discount_amount = money::non_negative("discount amount", discount.unwrap_or_default())?;

        let final_amount = total_amount
            .checked_add(tax_amount)
            .and_then(|gross| gross.checked_sub(discount_amount))
            .map(money::at_currency_scale)
            .ok_or_else(|| DomainError::invariant("final amount overflow"))
            .and_then(|amount| money::within_limit("final amount", amount))?;
        if final_amount < Decimal::ZERO {
            return Err(DomainError::validation(
                "discount amount must not exceed total plus tax",
            ));
        }

        Ok(Self {
            total_amount,
            tax_amount,
            discount_amount,
            final_amount,
        })
    }
}
