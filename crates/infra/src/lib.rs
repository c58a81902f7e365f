//! Infrastructure layer: configuration, persistence and application services.

pub mod config;
pub mod query;
pub mod services;
pub mod store;

pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use services::{ServiceError, ServiceResult, Services};
pub use store::{InMemoryStore, PostgresStore, Store, StoreError};
