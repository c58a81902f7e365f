//! `billdesk-auth` — user accounts, password hashing and session tokens.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod password;
pub mod principal;
pub mod token;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use password::{PasswordError, hash_password, verify_password};
pub use principal::Principal;
pub use token::{Hs256JwtValidator, JwtValidator, TokenError};
pub use user::{MIN_PASSWORD_LEN, NewUser, User};
