//! Customer records.
//!
//! Pure domain logic (no IO, no HTTP, no storage): field validation and the
//! update operations the services apply before saving.

pub mod customer;

pub use customer::{ContactDetails, Customer, CustomerDetails, is_valid_telephone};
