use axum::{Router, routing::get};

pub mod auth;
pub mod bills;
pub mod customers;
pub mod items;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/home", get(system::home))
        .nest("/customers", customers::router())
        .nest("/items", items::router())
        .nest("/bills", bills::router())
}
