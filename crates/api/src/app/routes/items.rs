use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use billdesk_core::ItemId;
use billdesk_infra::{ServiceResult, Services};
use billdesk_inventory::Item;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/search", get(search_items))
        .route("/low-stock", get(low_stock_items))
        .route("/:id", get(get_item))
        .route("/:id/edit", post(update_item))
        .route("/:id/stock", post(update_stock))
        .route("/:id/price", post(update_price))
        .route("/:id/activate", post(activate_item))
        .route("/:id/deactivate", post(deactivate_item))
        .route("/:id/delete", post(delete_item))
}

fn item_response(result: ServiceResult<Item>) -> Response {
    match result {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_items(Extension(services): Extension<Arc<Services>>, Query(query): Query<dto::ListQuery>) -> Response {
    let query = match query.item_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match services.list_items(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn search_items(
    Extension(services): Extension<Arc<Services>>,
    Query(query): Query<dto::SearchQuery>,
) -> Response {
    let query = match query.item_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match services.list_items(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn low_stock_items(
    Extension(services): Extension<Arc<Services>>,
    Query(query): Query<dto::ThresholdQuery>,
) -> Response {
    let threshold = match query.threshold() {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match services.low_stock_items(threshold).await {
        Ok(items) => Json(serde_json::json!({
            "threshold": threshold,
            "items": items,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_item(Extension(services): Extension<Arc<Services>>, Form(form): Form<dto::ItemForm>) -> Response {
    let new = match form.into_new_item() {
        Ok(new) => new,
        Err(resp) => return resp,
    };
    match services.create_item(new).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<ItemId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    item_response(services.get_item(id).await)
}

pub async fn update_item(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Form(form): Form<dto::ItemForm>,
) -> Response {
    let id = match dto::parse_id::<ItemId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let current = match services.get_item(id).await {
        Ok(item) => item,
        Err(e) => return errors::service_error_to_response(e),
    };
    let details = match form.into_details(&current) {
        Ok(details) => details,
        Err(resp) => return resp,
    };
    item_response(services.update_item(id, details).await)
}

pub async fn update_stock(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Form(form): Form<dto::StockForm>,
) -> Response {
    let id = match dto::parse_id::<ItemId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let quantity = match form.quantity() {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    item_response(services.update_item_stock(id, quantity).await)
}

pub async fn update_price(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Form(form): Form<dto::PriceForm>,
) -> Response {
    let id = match dto::parse_id::<ItemId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let price = match form.price() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    item_response(services.update_item_price(id, price).await)
}

pub async fn activate_item(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<ItemId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    item_response(services.activate_item(id).await)
}

pub async fn deactivate_item(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<ItemId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    item_response(services.deactivate_item(id).await)
}

pub async fn delete_item(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<ItemId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_item(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
