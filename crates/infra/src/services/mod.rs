//! Application services: find-then-mutate-then-save orchestration over a [`Store`].
//!
//! Services own identifier generation (account numbers, item codes, bill
//! numbers) and translate store/domain failures into [`ServiceError`]. They
//! hold no mutable state besides the random source used for codes.
//!
//! ```text
//! request
//!   ↓
//! validate input (domain types)
//!   ↓
//! load current state from the store (NotFound if missing)
//!   ↓
//! mutate in memory (domain rules, lifecycle)
//!   ↓
//! save (DuplicateKey / Conflict surfaced from constraints)
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::warn;

use billdesk_core::{DomainError, code};

use crate::store::{CustomerStore, ItemStore, Store, StoreError};

pub mod bills;
pub mod customers;
pub mod dashboard;
pub mod items;
pub mod users;

pub use bills::NewBill;
pub use dashboard::{DASHBOARD_LOW_STOCK_THRESHOLD, DashboardSummary};

/// Generated codes are redrawn at most this many times before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    /// Validation, lifecycle or invariant failure from the domain layer.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A unique value is already taken; carries the logical field name.
    #[error("{0} already exists")]
    DuplicateKey(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("store failure: {0}")]
    Store(String),
}

impl ServiceError {
    pub(crate) fn not_found(what: impl core::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateKey(field) => ServiceError::DuplicateKey(field),
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::InvalidValue(msg) => ServiceError::Domain(DomainError::validation(msg)),
            StoreError::Backend(msg) => ServiceError::Store(msg),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Which generated code is being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodeKind {
    AccountNumber,
    ItemCode,
}

impl CodeKind {
    fn generate(self, date: NaiveDate, rng: &mut StdRng) -> String {
        match self {
            CodeKind::AccountNumber => code::account_number(date, rng),
            CodeKind::ItemCode => code::item_code(date, rng),
        }
    }

    /// Store field name reported on a unique-constraint hit.
    pub(crate) fn field(self) -> &'static str {
        match self {
            CodeKind::AccountNumber => "account_number",
            CodeKind::ItemCode => "item_code",
        }
    }
}

/// Shared service handle; cheap to clone behind an `Arc`.
pub struct Services {
    store: Arc<dyn Store>,
    rng: Mutex<StdRng>,
}

impl core::fmt::Debug for Services {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

impl Services {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Use a caller-provided random source (deterministic codes in tests).
    pub fn with_rng(store: Arc<dyn Store>, rng: StdRng) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn rng(&self) -> ServiceResult<MutexGuard<'_, StdRng>> {
        self.rng
            .lock()
            .map_err(|_| ServiceError::Store("code generator lock poisoned".to_string()))
    }

    async fn code_taken(&self, kind: CodeKind, candidate: &str) -> ServiceResult<bool> {
        Ok(match kind {
            CodeKind::AccountNumber => self.store.account_number_exists(candidate).await?,
            CodeKind::ItemCode => self.store.item_code_exists(candidate).await?,
        })
    }

    /// Draw codes for `date` until one is not in the store.
    pub(crate) async fn free_code(&self, kind: CodeKind, date: NaiveDate) -> ServiceResult<String> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let candidate = {
                let mut rng = self.rng()?;
                kind.generate(date, &mut rng)
            };
            if !self.code_taken(kind, &candidate).await? {
                return Ok(candidate);
            }
            warn!(field = kind.field(), attempt, "generated code already taken, redrawing");
        }
        Err(exhausted(kind))
    }
}

pub(crate) fn exhausted(kind: CodeKind) -> ServiceError {
    ServiceError::Conflict(format!(
        "could not allocate a unique {} after {MAX_CODE_ATTEMPTS} attempts",
        kind.field()
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal::Decimal;

    use billdesk_customers::{Customer, CustomerDetails};
    use billdesk_inventory::{Item, NewItem};

    use super::Services;
    use crate::store::InMemoryStore;

    pub fn services() -> Services {
        Services::with_rng(Arc::new(InMemoryStore::new()), StdRng::seed_from_u64(42))
    }

    pub fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    pub fn details(name: &str) -> CustomerDetails {
        CustomerDetails {
            name: name.to_string(),
            address: "1 Main St".to_string(),
            telephone: "+1 555-0100".to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
        }
    }

    pub fn new_item(name: &str, price: &str, stock: i32) -> NewItem {
        NewItem {
            item_code: None,
            name: name.to_string(),
            description: None,
            price: dec(price),
            stock_quantity: stock,
            status: None,
        }
    }

    pub async fn customer(services: &Services, name: &str) -> Customer {
        services.create_customer(details(name)).await.unwrap()
    }

    pub async fn item(services: &Services, name: &str, price: &str, stock: i32) -> Item {
        services.create_item(new_item(name, price, stock)).await.unwrap()
    }
}
