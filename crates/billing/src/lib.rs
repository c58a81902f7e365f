//! Billing domain module.
//!
//! This crate contains business rules for bills and their line items: amount
//! computation and the status lifecycle, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod amounts;
pub mod bill;

pub use amounts::{BillAmounts, LineRequest, billable_lines};
pub use bill::{Bill, BillItem, BillRecord, BillStatus, BillSummary, BillUpdate, Charges};
