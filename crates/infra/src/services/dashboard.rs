use serde::Serialize;

use billdesk_billing::BillStatus;
use billdesk_core::Money;
use billdesk_inventory::ItemStatus;

use super::{ServiceResult, Services};
use crate::query::DateRange;
use crate::store::{BillStore, CustomerStore, ItemStore};

/// Items at or below this stock level count as low on the home page.
pub const DASHBOARD_LOW_STOCK_THRESHOLD: i32 = 10;

/// Counts shown on the home page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_customers: u64,
    pub total_items: u64,
    pub active_items: u64,
    pub low_stock_items: u64,
    pub total_bills: u64,
    pub draft_bills: u64,
    pub confirmed_bills: u64,
    pub paid_bills: u64,
    pub cancelled_bills: u64,
    pub total_revenue: Money,
}

impl Services {
    pub async fn dashboard(&self) -> ServiceResult<DashboardSummary> {
        let store = &self.store;
        Ok(DashboardSummary {
            total_customers: store.count_customers().await?,
            total_items: store.count_items(None).await?,
            active_items: store.count_items(Some(ItemStatus::Active)).await?,
            low_stock_items: store.count_low_stock(DASHBOARD_LOW_STOCK_THRESHOLD).await?,
            total_bills: store.count_bills(None).await?,
            draft_bills: store.count_bills(Some(BillStatus::Draft)).await?,
            confirmed_bills: store.count_bills(Some(BillStatus::Confirmed)).await?,
            paid_bills: store.count_bills(Some(BillStatus::Paid)).await?,
            cancelled_bills: store.count_bills(Some(BillStatus::Cancelled)).await?,
            total_revenue: store.paid_revenue(DateRange::default()).await?,
        })
    }
}
