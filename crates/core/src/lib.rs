//! `billdesk-core` — shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, money helpers and the generators for
//! human-readable codes.

pub mod code;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{BillId, BillItemId, CustomerId, ItemId, UserId};
pub use money::Money;
