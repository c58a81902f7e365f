use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use billdesk_core::CustomerId;
use billdesk_infra::Services;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route("/search", get(search_customers))
        .route("/:id", get(get_customer))
        .route("/:id/bills", get(customer_bills))
        .route("/:id/edit", post(update_customer))
        .route("/:id/contact", post(update_contact))
        .route("/:id/address", post(update_address))
        .route("/:id/delete", post(delete_customer))
}

pub async fn list_customers(
    Extension(services): Extension<Arc<Services>>,
    Query(query): Query<dto::ListQuery>,
) -> Response {
    let query = match query.customer_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match services.list_customers(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn search_customers(
    Extension(services): Extension<Arc<Services>>,
    Query(query): Query<dto::SearchQuery>,
) -> Response {
    let query = match query.customer_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match services.list_customers(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_customer(
    Extension(services): Extension<Arc<Services>>,
    Form(form): Form<dto::CustomerForm>,
) -> Response {
    match services.create_customer(form.into_details()).await {
        Ok(customer) => (StatusCode::CREATED, Json(customer)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_customer(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<CustomerId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.get_customer(id).await {
        Ok(customer) => Json(customer).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Customer with their bills, newest first; `?status=` narrows the list.
pub async fn customer_bills(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Query(filter): Query<dto::StatusFilter>,
) -> Response {
    let id = match dto::parse_id::<CustomerId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let status = match filter.status() {
        Ok(status) => status,
        Err(resp) => return resp,
    };
    match services.get_customer_with_bills(id, status).await {
        Ok((customer, bills)) => Json(serde_json::json!({
            "customer": customer,
            "bills": bills,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_customer(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Form(form): Form<dto::CustomerForm>,
) -> Response {
    let id = match dto::parse_id::<CustomerId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.update_customer(id, form.into_details()).await {
        Ok(customer) => Json(customer).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_contact(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Form(form): Form<dto::ContactForm>,
) -> Response {
    let id = match dto::parse_id::<CustomerId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.update_customer_contact(id, form.into_contact()).await {
        Ok(customer) => Json(customer).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_address(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Form(form): Form<dto::AddressForm>,
) -> Response {
    let id = match dto::parse_id::<CustomerId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let address = form.address.unwrap_or_default();
    match services.update_customer_address(id, &address).await {
        Ok(customer) => Json(customer).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Deleting a customer also deletes their bills.
pub async fn delete_customer(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<CustomerId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_customer(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
