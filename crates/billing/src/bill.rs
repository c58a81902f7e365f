use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use billdesk_core::error::require_text;
use billdesk_core::{BillId, BillItemId, CustomerId, DomainError, DomainResult, Entity, ItemId, Money, money};

use crate::amounts::BillAmounts;

/// Bill status lifecycle.
///
/// `DRAFT -> CONFIRMED -> PAID`, and `DRAFT | CONFIRMED -> CANCELLED`.
/// `PAID` and `CANCELLED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    #[default]
    Draft,
    Confirmed,
    Paid,
    Cancelled,
}

impl BillStatus {
    pub const ALL: [BillStatus; 4] = [
        BillStatus::Draft,
        BillStatus::Confirmed,
        BillStatus::Paid,
        BillStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Draft => "DRAFT",
            BillStatus::Confirmed => "CONFIRMED",
            BillStatus::Paid => "PAID",
            BillStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BillStatus::Paid | BillStatus::Cancelled)
    }

    /// Statuses a new bill may start in: `DRAFT` or one legal step from it.
    pub fn check_initial(status: Option<BillStatus>) -> DomainResult<BillStatus> {
        let status = status.unwrap_or_default();
        if status != BillStatus::Draft && !BillStatus::Draft.can_transition_to(status) {
            return Err(DomainError::invalid_transition(BillStatus::Draft, status));
        }
        Ok(status)
    }

    /// Whether `next` is a legal single step from `self`.
    pub fn can_transition_to(&self, next: BillStatus) -> bool {
        matches!(
            (self, next),
            (BillStatus::Draft, BillStatus::Confirmed)
                | (BillStatus::Confirmed, BillStatus::Paid)
                | (BillStatus::Draft, BillStatus::Cancelled)
                | (BillStatus::Confirmed, BillStatus::Cancelled)
        )
    }
}

impl core::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BillStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown bill status '{s}'")))
    }
}

/// Bill line with a unit price snapshot.
///
/// `total_price` is derived and recomputed whenever quantity or unit price
/// changes; it has no setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillItem {
    id: BillItemId,
    item_id: ItemId,
    quantity: i32,
    unit_price: Money,
    total_price: Money,
}

impl BillItem {
    pub fn new(id: BillItemId, item_id: ItemId, quantity: i32, unit_price: Decimal) -> DomainResult<Self> {
        let quantity = validate_quantity(quantity)?;
        let unit_price = money::non_negative("unit price", unit_price)?;
        Ok(Self {
            id,
            item_id,
            quantity,
            unit_price,
            total_price: money::multiply(unit_price, quantity)?,
        })
    }

    /// Rebuild a stored line. The total is re-derived rather than trusted.
    pub fn restore(id: BillItemId, item_id: ItemId, quantity: i32, unit_price: Money) -> DomainResult<Self> {
        Ok(Self {
            id,
            item_id,
            quantity,
            unit_price,
            total_price: money::multiply(unit_price, quantity)?,
        })
    }

    pub fn id_typed(&self) -> BillItemId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn set_quantity(&mut self, quantity: i32) -> DomainResult<()> {
        let quantity = validate_quantity(quantity)?;
        self.total_price = money::multiply(self.unit_price, quantity)?;
        self.quantity = quantity;
        Ok(())
    }

    pub fn set_unit_price(&mut self, unit_price: Decimal) -> DomainResult<()> {
        let unit_price = money::non_negative("unit price", unit_price)?;
        self.total_price = money::multiply(unit_price, self.quantity)?;
        self.unit_price = unit_price;
        Ok(())
    }
}

impl Entity for BillItem {
    type Id = BillItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_quantity(quantity: i32) -> DomainResult<i32> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be greater than 0"));
    }
    Ok(quantity)
}

/// Tax and discount as submitted; `None` means zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charges {
    pub tax_amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
}

/// Editable bill header fields.
///
/// Totals are never taken from the caller; they are re-derived from the lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillUpdate {
    pub customer_id: CustomerId,
    pub charges: Charges,
    pub status: BillStatus,
}

/// Flat stored representation, used by stores to rebuild a [`Bill`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillRecord {
    pub id: BillId,
    pub bill_number: String,
    pub customer_id: CustomerId,
    pub total_amount: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Bill header without its lines (list views).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillSummary {
    pub id: BillId,
    pub bill_number: String,
    pub customer_id: CustomerId,
    pub total_amount: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<BillRecord> for BillSummary {
    fn from(record: BillRecord) -> Self {
        Self {
            id: record.id,
            bill_number: record.bill_number,
            customer_id: record.customer_id,
            total_amount: record.total_amount,
            tax_amount: record.tax_amount,
            discount_amount: record.discount_amount,
            final_amount: record.final_amount,
            status: record.status,
            created_at: record.created_at,
            paid_at: record.paid_at,
        }
    }
}

/// Bill with its materialised lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    id: BillId,
    bill_number: String,
    customer_id: CustomerId,
    items: Vec<BillItem>,
    total_amount: Money,
    tax_amount: Money,
    discount_amount: Money,
    final_amount: Money,
    status: BillStatus,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl Bill {
    /// Create a bill from resolved lines.
    ///
    /// The initial status defaults to `DRAFT`; see [`BillStatus::check_initial`].
    pub fn create(
        id: BillId,
        bill_number: impl Into<String>,
        customer_id: CustomerId,
        items: Vec<BillItem>,
        charges: Charges,
        status: Option<BillStatus>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation(
                "bill must contain at least one item with quantity > 0",
            ));
        }
        let bill_number = require_text("bill number", &bill_number.into())?;
        let amounts = BillAmounts::compute(
            items.iter().map(BillItem::total_price),
            charges.tax_amount,
            charges.discount_amount,
        )?;
        let status = BillStatus::check_initial(status)?;

        Ok(Self {
            id,
            bill_number,
            customer_id,
            items,
            total_amount: amounts.total_amount,
            tax_amount: amounts.tax_amount,
            discount_amount: amounts.discount_amount,
            final_amount: amounts.final_amount,
            status,
            created_at,
            paid_at: None,
        })
    }

    /// Rebuild a stored bill. Stored amounts are kept as-is; call
    /// [`Bill::recalculate`] to re-derive them.
    pub fn restore(record: BillRecord, items: Vec<BillItem>) -> Self {
        Self {
            id: record.id,
            bill_number: record.bill_number,
            customer_id: record.customer_id,
            items,
            total_amount: record.total_amount,
            tax_amount: record.tax_amount,
            discount_amount: record.discount_amount,
            final_amount: record.final_amount,
            status: record.status,
            created_at: record.created_at,
            paid_at: record.paid_at,
        }
    }

    pub fn id_typed(&self) -> BillId {
        self.id
    }

    pub fn bill_number(&self) -> &str {
        &self.bill_number
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn items(&self) -> &[BillItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn final_amount(&self) -> Money {
        self.final_amount
    }

    pub fn status(&self) -> BillStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    /// Move to `next`.
    ///
    /// Requesting the current status is a no-op (returns `false`). `paid_at`
    /// is stamped on the first entry into `PAID` only.
    pub fn transition(&mut self, next: BillStatus, now: DateTime<Utc>) -> DomainResult<bool> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_transition(self.status, next));
        }
        self.status = next;
        if next == BillStatus::Paid && self.paid_at.is_none() {
            self.paid_at = Some(now);
        }
        Ok(true)
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) -> DomainResult<bool> {
        self.transition(BillStatus::Confirmed, now)
    }

    pub fn pay(&mut self, now: DateTime<Utc>) -> DomainResult<bool> {
        self.transition(BillStatus::Paid, now)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<bool> {
        self.transition(BillStatus::Cancelled, now)
    }

    /// Replace customer, tax, discount and status.
    ///
    /// Everything is validated before anything changes. `PAID` and
    /// `CANCELLED` bills are closed to edits.
    pub fn update(&mut self, update: BillUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "{} bill {} can no longer be edited",
                self.status, self.bill_number
            )));
        }
        let amounts = self.compute_amounts(update.charges)?;
        if self.status != update.status && !self.status.can_transition_to(update.status) {
            return Err(DomainError::invalid_transition(self.status, update.status));
        }

        self.customer_id = update.customer_id;
        self.apply_amounts(amounts);
        self.transition(update.status, now)?;
        Ok(())
    }

    /// Re-derive total and final amounts from the stored lines, keeping tax
    /// and discount.
    pub fn recalculate(&mut self) -> DomainResult<()> {
        let amounts = self.compute_amounts(Charges {
            tax_amount: Some(self.tax_amount),
            discount_amount: Some(self.discount_amount),
        })?;
        self.apply_amounts(amounts);
        Ok(())
    }

    pub fn summary(&self) -> BillSummary {
        BillSummary::from(self.record())
    }

    /// Flat header representation for persistence.
    pub fn record(&self) -> BillRecord {
        BillRecord {
            id: self.id,
            bill_number: self.bill_number.clone(),
            customer_id: self.customer_id,
            total_amount: self.total_amount,
            tax_amount: self.tax_amount,
            discount_amount: self.discount_amount,
            final_amount: self.final_amount,
            status: self.status,
            created_at: self.created_at,
            paid_at: self.paid_at,
        }
    }

    fn compute_amounts(&self, charges: Charges) -> DomainResult<BillAmounts> {
        BillAmounts::compute(
            self.items.iter().map(BillItem::total_price),
            charges.tax_amount,
            charges.discount_amount,
        )
    }

    fn apply_amounts(&mut self, amounts: BillAmounts) {
        self.total_amount = amounts.total_amount;
        self.tax_amount = amounts.tax_amount;
        self.discount_amount = amounts.discount_amount;
        self.final_amount = amounts.final_amount;
    }
}

impl Entity for Bill {
    type Id = BillId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(unit_price: &str, quantity: i32) -> BillItem {
        BillItem::new(BillItemId::new(), ItemId::new(), quantity, dec(unit_price)).unwrap()
    }

    fn bill_with(status: Option<BillStatus>) -> Bill {
        Bill::create(
            BillId::new(),
            "BILL-000001",
            CustomerId::new(),
            vec![line("10.00", 2), line("3.00", 1)],
            Charges {
                tax_amount: Some(dec("2.00")),
                discount_amount: Some(dec("1.00")),
            },
            status,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn create_computes_totals() {
        let bill = bill_with(None);
        assert_eq!(bill.status(), BillStatus::Draft);
        assert_eq!(bill.total_amount().to_string(), "23.00");
        assert_eq!(bill.final_amount().to_string(), "24.00");
        assert_eq!(bill.paid_at(), None);
    }

    #[test]
    fn bill_starts_in_draft_or_one_step_from_it() {
        assert_eq!(bill_with(Some(BillStatus::Confirmed)).status(), BillStatus::Confirmed);
        assert_eq!(bill_with(Some(BillStatus::Cancelled)).status(), BillStatus::Cancelled);

        let err = Bill::create(
            BillId::new(),
            "BILL-000001",
            CustomerId::new(),
            vec![line("1.00", 1)],
            Charges::default(),
            Some(BillStatus::Paid),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("DRAFT", "PAID"));
    }

    #[test]
    fn create_without_lines_fails() {
        let err = Bill::create(
            BillId::new(),
            "BILL-000001",
            CustomerId::new(),
            Vec::new(),
            Charges::default(),
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn line_total_tracks_quantity_and_price() {
        let mut item = line("2.50", 4);
        assert_eq!(item.total_price().to_string(), "10.00");
        item.set_quantity(3).unwrap();
        assert_eq!(item.total_price().to_string(), "7.50");
        item.set_unit_price(dec("1.10")).unwrap();
        assert_eq!(item.total_price().to_string(), "3.30");
        assert!(item.set_quantity(0).is_err());
        assert_eq!(item.quantity(), 3);
    }

    #[test]
    fn unit_price_with_three_decimals_is_rejected() {
        assert!(BillItem::new(BillItemId::new(), ItemId::new(), 1, dec("1.005")).is_err());
    }

    #[test]
    fn lifecycle_follows_the_transition_graph() {
        let mut bill = bill_with(None);
        let now = Utc::now();

        let err = bill.pay(now).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("DRAFT", "PAID"));

        assert!(bill.confirm(now).unwrap());
        assert!(bill.pay(now).unwrap());
        assert_eq!(bill.status(), BillStatus::Paid);
        assert!(bill.cancel(now).is_err());
    }

    #[test]
    fn paying_twice_keeps_first_paid_at() {
        let mut bill = bill_with(Some(BillStatus::Confirmed));
        let first = Utc::now();
        bill.pay(first).unwrap();
        assert!(!bill.pay(first + Duration::hours(1)).unwrap());
        assert_eq!(bill.paid_at(), Some(first));
    }

    #[test]
    fn cancelled_is_terminal() {
        let mut bill = bill_with(None);
        bill.cancel(Utc::now()).unwrap();
        for next in [BillStatus::Draft, BillStatus::Confirmed, BillStatus::Paid] {
            assert!(bill.transition(next, Utc::now()).is_err());
        }
    }

    #[test]
    fn update_rederives_amounts_and_moves_status() {
        let mut bill = bill_with(None);
        let customer = CustomerId::new();
        bill.update(
            BillUpdate {
                customer_id: customer,
                charges: Charges {
                    tax_amount: Some(dec("5.00")),
                    discount_amount: None,
                },
                status: BillStatus::Confirmed,
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(bill.customer_id(), customer);
        assert_eq!(bill.total_amount().to_string(), "23.00");
        assert_eq!(bill.final_amount().to_string(), "28.00");
        assert_eq!(bill.status(), BillStatus::Confirmed);
    }

    #[test]
    fn rejected_update_changes_nothing() {
        let mut bill = bill_with(None);
        let before = bill.clone();
        let err = bill
            .update(
                BillUpdate {
                    customer_id: CustomerId::new(),
                    charges: Charges {
                        tax_amount: Some(dec("9.00")),
                        discount_amount: None,
                    },
                    status: BillStatus::Paid,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(bill, before);
    }

    #[test]
    fn closed_bills_reject_header_edits() {
        let now = Utc::now();
        let mut paid = bill_with(Some(BillStatus::Confirmed));
        paid.pay(now).unwrap();
        let mut cancelled = bill_with(None);
        cancelled.cancel(now).unwrap();

        for bill in [&mut paid, &mut cancelled] {
            let before = bill.clone();
            let update = BillUpdate {
                customer_id: before.customer_id(),
                charges: Charges {
                    tax_amount: None,
                    discount_amount: Some(dec("3.00")),
                },
                status: before.status(),
            };
            let err = bill.update(update, now).unwrap_err();
            assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("can no longer be edited")));
            assert_eq!(*bill, before);
        }
    }

    #[test]
    fn recalculate_repairs_stale_amounts() {
        let fresh = bill_with(None);
        let mut record = fresh.record();
        record.total_amount = dec("0.00");
        record.final_amount = dec("0.00");
        let mut bill = Bill::restore(record, fresh.items().to_vec());

        bill.recalculate().unwrap();
        assert_eq!(bill.total_amount(), fresh.total_amount());
        assert_eq!(bill.final_amount(), fresh.final_amount());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("paid".parse::<BillStatus>().unwrap(), BillStatus::Paid);
        assert!("refunded".parse::<BillStatus>().is_err());
    }

    fn any_status() -> impl Strategy<Value = BillStatus> {
        prop_oneof![
            Just(BillStatus::Draft),
            Just(BillStatus::Confirmed),
            Just(BillStatus::Paid),
            Just(BillStatus::Cancelled),
        ]
    }

    proptest! {
        #[test]
        fn total_is_sum_of_line_totals(lines in proptest::collection::vec((0i64..100_000, 1i32..50), 1..8)) {
            let items: Vec<BillItem> = lines
                .iter()
                .map(|(cents, qty)| BillItem::new(BillItemId::new(), ItemId::new(), *qty, Decimal::new(*cents, 2)).unwrap())
                .collect();
            let expected: Decimal = lines
                .iter()
                .map(|(cents, qty)| Decimal::new(*cents, 2) * Decimal::from(*qty))
                .sum();

            let bill = Bill::create(
                BillId::new(),
                "BILL-000001",
                CustomerId::new(),
                items,
                Charges::default(),
                None,
                Utc::now(),
            )
            .unwrap();
            prop_assert_eq!(bill.total_amount(), expected);
            prop_assert_eq!(bill.final_amount(), expected);
        }

        #[test]
        fn transitions_never_restamp_paid_at(path in proptest::collection::vec(any_status(), 1..8)) {
            let mut bill = bill_with(None);
            let start = Utc::now();
            let mut first_paid = None;

            for (step, next) in path.into_iter().enumerate() {
                let now = start + Duration::minutes(step as i64);
                if bill.transition(next, now).is_ok() && bill.status() == BillStatus::Paid && first_paid.is_none() {
                    first_paid = bill.paid_at();
                }
                prop_assert_eq!(bill.paid_at(), first_paid);
            }
        }
    }
}
