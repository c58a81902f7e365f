use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use billdesk_billing::{Bill, BillAmounts, BillItem, BillStatus, BillSummary, BillUpdate, Charges, LineRequest, billable_lines};
use billdesk_core::{BillId, BillItemId, CustomerId, Money, code};

use super::{MAX_CODE_ATTEMPTS, ServiceError, ServiceResult, Services};
use crate::query::{BillQuery, DateRange, Page};
use crate::store::{BillStore, StoreError};

/// Bill creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBill {
    pub customer_id: CustomerId,
    pub lines: Vec<LineRequest>,
    #[serde(default)]
    pub charges: Charges,
    pub status: Option<BillStatus>,
}

impl Services {
    /// Create a bill and its lines in one write.
    ///
    /// Lines with a non-positive quantity are dropped before their items are
    /// looked up. A missing unit price snapshots the item's current price.
    #[instrument(skip(self, new), fields(customer_id = %new.customer_id, requested_lines = new.lines.len()), err)]
    pub async fn create_bill(&self, new: NewBill) -> ServiceResult<Bill> {
        let lines = billable_lines(new.lines)?;
        BillStatus::check_initial(new.status)?;
        self.get_customer(new.customer_id).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = self.get_item(line.item_id).await?;
            let unit_price = line.unit_price.unwrap_or_else(|| item.price());
            items.push(BillItem::new(BillItemId::new(), line.item_id, line.quantity, unit_price)?);
        }
        // Validate the amounts before a sequence value is consumed.
        BillAmounts::compute(
            items.iter().map(BillItem::total_price),
            new.charges.tax_amount,
            new.charges.discount_amount,
        )?;

        let now = Utc::now();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let bill_number = code::bill_number(self.store.next_bill_sequence().await?);
            let bill = Bill::create(
                BillId::new(),
                bill_number,
                new.customer_id,
                items.clone(),
                new.charges,
                new.status,
                now,
            )?;
            match self.store.insert_bill(&bill).await {
                Ok(()) => {
                    info!(
                        bill_id = %bill.id_typed(),
                        bill_number = bill.bill_number(),
                        final_amount = %bill.final_amount(),
                        "bill created"
                    );
                    return Ok(bill);
                }
                Err(StoreError::DuplicateKey(field)) if field == "bill_number" => {
                    warn!(bill_number = bill.bill_number(), "bill number already taken, advancing sequence");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ServiceError::Conflict(format!(
            "could not allocate a unique bill_number after {MAX_CODE_ATTEMPTS} attempts"
        )))
    }

    /// The bill with its lines.
    pub async fn get_bill(&self, id: BillId) -> ServiceResult<Bill> {
        self.store
            .get_bill(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("bill {id}")))
    }

    pub async fn list_bills(&self, query: &BillQuery) -> ServiceResult<Page<BillSummary>> {
        Ok(self.store.list_bills(query).await?)
    }

    /// Replace customer, tax, discount and status; totals are re-derived.
    #[instrument(skip(self, update), fields(status = %update.status), err)]
    pub async fn update_bill(&self, id: BillId, update: BillUpdate) -> ServiceResult<Bill> {
        let mut bill = self.get_bill(id).await?;
        if update.customer_id != bill.customer_id() {
            self.get_customer(update.customer_id).await?;
        }
        bill.update(update, Utc::now())?;
        self.store.update_bill(&bill).await?;
        Ok(bill)
    }

    /// Move a bill along its lifecycle. Requesting the current status is a no-op.
    #[instrument(skip(self), err)]
    pub async fn set_bill_status(&self, id: BillId, status: BillStatus) -> ServiceResult<Bill> {
        let mut bill = self.get_bill(id).await?;
        let from = bill.status();
        if bill.transition(status, Utc::now())? {
            self.store.update_bill(&bill).await?;
            info!(bill_id = %id, %from, to = %status, "bill status changed");
        } else {
            debug!(bill_id = %id, %status, "bill already in requested status");
        }
        Ok(bill)
    }

    pub async fn confirm_bill(&self, id: BillId) -> ServiceResult<Bill> {
        self.set_bill_status(id, BillStatus::Confirmed).await
    }

    pub async fn pay_bill(&self, id: BillId) -> ServiceResult<Bill> {
        self.set_bill_status(id, BillStatus::Paid).await
    }

    pub async fn cancel_bill(&self, id: BillId) -> ServiceResult<Bill> {
        self.set_bill_status(id, BillStatus::Cancelled).await
    }

    /// Re-derive total and final amounts from the stored lines.
    #[instrument(skip(self), err)]
    pub async fn recalculate_bill(&self, id: BillId) -> ServiceResult<Bill> {
        let mut bill = self.get_bill(id).await?;
        bill.recalculate()?;
        self.store.update_bill(&bill).await?;
        Ok(bill)
    }

    #[instrument(skip(self), err)]
    pub async fn delete_bill(&self, id: BillId) -> ServiceResult<()> {
        if !self.store.delete_bill(id).await? {
            return Err(ServiceError::not_found(format!("bill {id}")));
        }
        info!(bill_id = %id, "bill deleted");
        Ok(())
    }

    /// Sum of `total_amount` over PAID bills created in `range`.
    pub async fn revenue(&self, range: DateRange) -> ServiceResult<Money> {
        Ok(self.store.paid_revenue(range).await?)
    }
}
