//! In-process store for tests and local runs.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use billdesk_auth::User;
use billdesk_billing::{Bill, BillStatus, BillSummary};
use billdesk_core::{BillId, CustomerId, ItemId, Money, UserId, money};
use billdesk_customers::Customer;
use billdesk_inventory::{Item, ItemStatus};

use super::{BillStore, CustomerStore, ItemStore, StoreError, UserStore};
use crate::query::{
    BillQuery, BillSortField, CustomerQuery, CustomerSortField, DateRange, ItemQuery, ItemSortField, Page,
    SortDirection, normalized_keyword,
};

#[derive(Debug, Default)]
struct State {
    customers: HashMap<CustomerId, Customer>,
    items: HashMap<ItemId, Item>,
    bills: HashMap<BillId, Bill>,
    users: HashMap<UserId, User>,
    bill_sequence: u64,
}

/// All tables behind one lock, so multi-row writes (bill + lines, cascades)
/// are atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn customer_order(a: &Customer, b: &Customer, field: CustomerSortField) -> Ordering {
    match field {
        CustomerSortField::Name => a.name().cmp(b.name()),
        CustomerSortField::AccountNumber => a.account_number().cmp(b.account_number()),
        CustomerSortField::Email => a.email().cmp(&b.email()),
        CustomerSortField::CreatedAt => a.created_at().cmp(&b.created_at()),
    }
}

fn item_order(a: &Item, b: &Item, field: ItemSortField) -> Ordering {
    match field {
        ItemSortField::Name => a.name().cmp(b.name()),
        ItemSortField::ItemCode => a.item_code().cmp(b.item_code()),
        ItemSortField::Price => a.price().cmp(&b.price()),
        ItemSortField::StockQuantity => a.stock_quantity().cmp(&b.stock_quantity()),
        ItemSortField::Status => a.status().as_str().cmp(b.status().as_str()),
        ItemSortField::CreatedAt => a.created_at().cmp(&b.created_at()),
    }
}

fn bill_order(a: &Bill, b: &Bill, field: BillSortField) -> Ordering {
    match field {
        BillSortField::BillNumber => a.bill_number().cmp(b.bill_number()),
        BillSortField::TotalAmount => a.total_amount().cmp(&b.total_amount()),
        BillSortField::FinalAmount => a.final_amount().cmp(&b.final_amount()),
        BillSortField::Status => a.status().as_str().cmp(b.status().as_str()),
        BillSortField::CreatedAt => a.created_at().cmp(&b.created_at()),
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state
            .customers
            .values()
            .any(|c| c.account_number() == customer.account_number())
        {
            return Err(StoreError::DuplicateKey("account_number".to_string()));
        }
        state.customers.insert(customer.id_typed(), customer.clone());
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let id = customer.id_typed();
        if state
            .customers
            .values()
            .any(|c| c.id_typed() != id && c.account_number() == customer.account_number())
        {
            return Err(StoreError::DuplicateKey("account_number".to_string()));
        }
        match state.customers.get_mut(&id) {
            Some(existing) => {
                *existing = customer.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("customer {id}"))),
        }
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.read()?.customers.get(&id).cloned())
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        if state.customers.remove(&id).is_none() {
            return Ok(false);
        }
        state.bills.retain(|_, bill| bill.customer_id() != id);
        Ok(true)
    }

    async fn account_number_exists(&self, account_number: &str) -> Result<bool, StoreError> {
        Ok(self
            .read()?
            .customers
            .values()
            .any(|c| c.account_number() == account_number))
    }

    async fn list_customers(&self, query: &CustomerQuery) -> Result<Page<Customer>, StoreError> {
        let state = self.read()?;
        let keyword = normalized_keyword(query.keyword.as_deref());
        let mut matches: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| keyword.as_deref().is_none_or(|k| c.matches_keyword(k)))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            directed(customer_order(a, b, query.sort.field), query.sort.direction)
                .then_with(|| a.id_typed().cmp(&b.id_typed()))
        });
        Ok(Page::from_sorted(matches, query.page))
    }

    async fn count_customers(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.customers.len() as u64)
    }
}

fn item_conflict(state: &State, item: &Item) -> Option<StoreError> {
    let id = item.id_typed();
    state.items.values().filter(|i| i.id_typed() != id).find_map(|other| {
        if other.item_code() == item.item_code() {
            Some(StoreError::DuplicateKey("item_code".to_string()))
        } else if other.name() == item.name() {
            Some(StoreError::DuplicateKey("item_name".to_string()))
        } else {
            None
        }
    })
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if let Some(err) = item_conflict(&state, item) {
            return Err(err);
        }
        state.items.insert(item.id_typed(), item.clone());
        Ok(())
    }

    async fn update_item(&self, item: &Item) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let id = item.id_typed();
        if !state.items.contains_key(&id) {
            return Err(StoreError::NotFound(format!("item {id}")));
        }
        if let Some(err) = item_conflict(&state, item) {
            return Err(err);
        }
        state.items.insert(id, item.clone());
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        if !state.items.contains_key(&id) {
            return Ok(false);
        }
        if state
            .bills
            .values()
            .any(|bill| bill.items().iter().any(|line| line.item_id() == id))
        {
            return Err(StoreError::Conflict(format!("item {id} is referenced by bills")));
        }
        state.items.remove(&id);
        Ok(true)
    }

    async fn item_code_exists(&self, item_code: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.items.values().any(|i| i.item_code() == item_code))
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<Page<Item>, StoreError> {
        let state = self.read()?;
        let keyword = normalized_keyword(query.keyword.as_deref());
        let mut matches: Vec<Item> = state
            .items
            .values()
            .filter(|i| query.status.is_none_or(|s| i.status() == s))
            .filter(|i| keyword.as_deref().is_none_or(|k| i.matches_keyword(k)))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            directed(item_order(a, b, query.sort.field), query.sort.direction)
                .then_with(|| a.id_typed().cmp(&b.id_typed()))
        });
        Ok(Page::from_sorted(matches, query.page))
    }

    async fn low_stock_items(&self, threshold: i32) -> Result<Vec<Item>, StoreError> {
        let state = self.read()?;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|i| i.is_low_stock(threshold))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.stock_quantity()
                .cmp(&b.stock_quantity())
                .then_with(|| a.name().cmp(b.name()))
        });
        Ok(items)
    }

    async fn count_items(&self, status: Option<ItemStatus>) -> Result<u64, StoreError> {
        let state = self.read()?;
        Ok(state
            .items
            .values()
            .filter(|i| status.is_none_or(|s| i.status() == s))
            .count() as u64)
    }

    async fn count_low_stock(&self, threshold: i32) -> Result<u64, StoreError> {
        Ok(self.low_stock_items(threshold).await?.len() as u64)
    }
}

fn bill_matches(bill: &Bill, query: &BillQuery, keyword: Option<&str>) -> bool {
    query.status.is_none_or(|s| bill.status() == s)
        && query.customer_id.is_none_or(|c| bill.customer_id() == c)
        && query.created.contains(bill.created_at())
        && query.total_amount.contains(bill.total_amount())
        && keyword.is_none_or(|k| bill.bill_number().to_lowercase().contains(k))
}

#[async_trait]
impl BillStore for InMemoryStore {
    async fn next_bill_sequence(&self) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        state.bill_sequence += 1;
        Ok(state.bill_sequence)
    }

    async fn insert_bill(&self, bill: &Bill) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.customers.contains_key(&bill.customer_id()) {
            return Err(StoreError::Conflict(format!("customer {} does not exist", bill.customer_id())));
        }
        if let Some(line) = bill.items().iter().find(|line| !state.items.contains_key(&line.item_id())) {
            return Err(StoreError::Conflict(format!("item {} does not exist", line.item_id())));
        }
        if state.bills.values().any(|b| b.bill_number() == bill.bill_number()) {
            return Err(StoreError::DuplicateKey("bill_number".to_string()));
        }
        state.bills.insert(bill.id_typed(), bill.clone());
        Ok(())
    }

    async fn update_bill(&self, bill: &Bill) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let id = bill.id_typed();
        if !state.customers.contains_key(&bill.customer_id()) {
            return Err(StoreError::Conflict(format!("customer {} does not exist", bill.customer_id())));
        }
        let Some(existing) = state.bills.get(&id) else {
            return Err(StoreError::NotFound(format!("bill {id}")));
        };
        // Header-only update: keep the stored lines.
        let lines = existing.items().to_vec();
        state.bills.insert(id, Bill::restore(bill.record(), lines));
        Ok(())
    }

    async fn get_bill(&self, id: BillId) -> Result<Option<Bill>, StoreError> {
        Ok(self.read()?.bills.get(&id).cloned())
    }

    async fn delete_bill(&self, id: BillId) -> Result<bool, StoreError> {
        Ok(self.write()?.bills.remove(&id).is_some())
    }

    async fn list_bills(&self, query: &BillQuery) -> Result<Page<BillSummary>, StoreError> {
        let state = self.read()?;
        let keyword = normalized_keyword(query.keyword.as_deref());
        let mut matches: Vec<&Bill> = state
            .bills
            .values()
            .filter(|b| bill_matches(b, query, keyword.as_deref()))
            .collect();
        matches.sort_by(|a, b| {
            directed(bill_order(a, b, query.sort.field), query.sort.direction)
                .then_with(|| a.id_typed().cmp(&b.id_typed()))
        });
        let summaries = matches.into_iter().map(Bill::summary).collect();
        Ok(Page::from_sorted(summaries, query.page))
    }

    async fn bills_for_customer(
        &self,
        customer_id: CustomerId,
        status: Option<BillStatus>,
    ) -> Result<Vec<BillSummary>, StoreError> {
        let state = self.read()?;
        let mut bills: Vec<&Bill> = state
            .bills
            .values()
            .filter(|b| b.customer_id() == customer_id && status.is_none_or(|s| b.status() == s))
            .collect();
        bills.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id_typed().cmp(&a.id_typed())));
        Ok(bills.into_iter().map(Bill::summary).collect())
    }

    async fn count_bills(&self, status: Option<BillStatus>) -> Result<u64, StoreError> {
        let state = self.read()?;
        Ok(state
            .bills
            .values()
            .filter(|b| status.is_none_or(|s| b.status() == s))
            .count() as u64)
    }

    async fn paid_revenue(&self, range: DateRange) -> Result<Money, StoreError> {
        let state = self.read()?;
        money::sum(
            state
                .bills
                .values()
                .filter(|b| b.status() == BillStatus::Paid && range.contains(b.created_at()))
                .map(Bill::total_amount),
        )
        .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.write()?;
        for existing in state.users.values() {
            if existing.username() == user.username() {
                return Err(StoreError::DuplicateKey("username".to_string()));
            }
            if existing.email().eq_ignore_ascii_case(user.email()) {
                return Err(StoreError::DuplicateKey("email".to_string()));
            }
        }
        state.users.insert(user.id_typed(), user.clone());
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username() == username)
            .cloned())
    }
}
