//! Persistence boundary.
//!
//! Stores are plain CRUD plus the filtered lookups the services need. Both
//! backends enforce the same unique constraints, cascades and sequences:
//!
//! | constraint | reported as |
//! |------------|-------------|
//! | duplicate account number / item code / item name / bill number / username / email | `DuplicateKey(field)` |
//! | deleting an item still referenced by a bill line | `Conflict` |
//! | updating a row that does not exist | `NotFound` |
//!
//! Deleting a customer deletes its bills; deleting a bill deletes its lines.

use async_trait::async_trait;
use thiserror::Error;

use billdesk_auth::User;
use billdesk_billing::{Bill, BillStatus, BillSummary};
use billdesk_core::{BillId, CustomerId, ItemId, Money};
use billdesk_customers::Customer;
use billdesk_inventory::{Item, ItemStatus};

use crate::query::{BillQuery, CustomerQuery, DateRange, ItemQuery, Page};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint was hit; carries the logical field name.
    #[error("duplicate value for {0}")]
    DuplicateKey(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A referential constraint prevents the change.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend refused a value (out of range, too long, failed a check).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError>;
    async fn update_customer(&self, customer: &Customer) -> Result<(), StoreError>;
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;
    /// Returns `false` when nothing was deleted. Cascades to the customer's bills.
    async fn delete_customer(&self, id: CustomerId) -> Result<bool, StoreError>;
    async fn account_number_exists(&self, account_number: &str) -> Result<bool, StoreError>;
    async fn list_customers(&self, query: &CustomerQuery) -> Result<Page<Customer>, StoreError>;
    async fn count_customers(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert_item(&self, item: &Item) -> Result<(), StoreError>;
    async fn update_item(&self, item: &Item) -> Result<(), StoreError>;
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;
    /// Returns `false` when nothing was deleted; `Conflict` when bill lines
    /// still reference the item.
    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError>;
    async fn item_code_exists(&self, item_code: &str) -> Result<bool, StoreError>;
    async fn list_items(&self, query: &ItemQuery) -> Result<Page<Item>, StoreError>;
    /// Items with `stock_quantity <= threshold`, lowest stock first.
    async fn low_stock_items(&self, threshold: i32) -> Result<Vec<Item>, StoreError>;
    async fn count_items(&self, status: Option<ItemStatus>) -> Result<u64, StoreError>;
    async fn count_low_stock(&self, threshold: i32) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait BillStore: Send + Sync {
    /// Next value of the monotonic bill-number sequence (starts at 1).
    async fn next_bill_sequence(&self) -> Result<u64, StoreError>;
    /// Insert the bill header and all of its lines atomically.
    async fn insert_bill(&self, bill: &Bill) -> Result<(), StoreError>;
    /// Update the header fields; lines are immutable after creation.
    async fn update_bill(&self, bill: &Bill) -> Result<(), StoreError>;
    /// The bill with its lines materialised.
    async fn get_bill(&self, id: BillId) -> Result<Option<Bill>, StoreError>;
    async fn delete_bill(&self, id: BillId) -> Result<bool, StoreError>;
    async fn list_bills(&self, query: &BillQuery) -> Result<Page<BillSummary>, StoreError>;
    /// Newest first.
    async fn bills_for_customer(
        &self,
        customer_id: CustomerId,
        status: Option<BillStatus>,
    ) -> Result<Vec<BillSummary>, StoreError>;
    async fn count_bills(&self, status: Option<BillStatus>) -> Result<u64, StoreError>;
    /// Sum of `total_amount` over PAID bills created in `range`.
    async fn paid_revenue(&self, range: DateRange) -> Result<Money, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}

/// Everything the services need from persistence.
pub trait Store: CustomerStore + ItemStore + BillStore + UserStore {}

impl<T> Store for T where T: CustomerStore + ItemStore + BillStore + UserStore {}
