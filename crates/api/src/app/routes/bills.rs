use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use billdesk_billing::Bill;
use billdesk_core::BillId;
use billdesk_infra::{ServiceResult, Services};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_bills).post(create_bill))
        .route("/revenue", get(revenue))
        .route("/:id", get(get_bill))
        .route("/:id/edit", post(update_bill))
        .route("/:id/status", post(set_status))
        .route("/:id/confirm", post(confirm_bill))
        .route("/:id/pay", post(pay_bill))
        .route("/:id/cancel", post(cancel_bill))
        .route("/:id/recalculate", post(recalculate_bill))
        .route("/:id/delete", post(delete_bill))
}

fn bill_response(result: ServiceResult<Bill>) -> Response {
    match result {
        Ok(bill) => Json(bill).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_bills(
    Extension(services): Extension<Arc<Services>>,
    Query(query): Query<dto::BillListQuery>,
) -> Response {
    let query = match query.bill_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match services.list_bills(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Lines arrive as repeated keys, hence the `axum-extra` form extractor.
pub async fn create_bill(
    Extension(services): Extension<Arc<Services>>,
    axum_extra::extract::Form(form): axum_extra::extract::Form<dto::BillForm>,
) -> Response {
    let new = match form.into_new_bill() {
        Ok(new) => new,
        Err(resp) => return resp,
    };
    match services.create_bill(new).await {
        Ok(bill) => (StatusCode::CREATED, Json(bill)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Revenue from paid bills created in `[from, to]`; either bound may be omitted.
pub async fn revenue(Extension(services): Extension<Arc<Services>>, Query(query): Query<dto::RangeQuery>) -> Response {
    let range = match query.range() {
        Ok(range) => range,
        Err(resp) => return resp,
    };
    match services.revenue(range).await {
        Ok(total) => Json(serde_json::json!({
            "from": range.from,
            "to": range.to,
            "revenue": total,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_bill(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<BillId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    bill_response(services.get_bill(id).await)
}

pub async fn update_bill(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Form(form): Form<dto::BillEditForm>,
) -> Response {
    let id = match dto::parse_id::<BillId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let current = match services.get_bill(id).await {
        Ok(bill) => bill,
        Err(e) => return errors::service_error_to_response(e),
    };
    let update = match form.into_update(&current) {
        Ok(update) => update,
        Err(resp) => return resp,
    };
    bill_response(services.update_bill(id, update).await)
}

pub async fn set_status(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Form(form): Form<dto::StatusForm>,
) -> Response {
    let id = match dto::parse_id::<BillId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let status = match form.status() {
        Ok(status) => status,
        Err(resp) => return resp,
    };
    bill_response(services.set_bill_status(id, status).await)
}

pub async fn confirm_bill(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<BillId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    bill_response(services.confirm_bill(id).await)
}

pub async fn pay_bill(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<BillId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    bill_response(services.pay_bill(id).await)
}

pub async fn cancel_bill(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<BillId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    bill_response(services.cancel_bill(id).await)
}

pub async fn recalculate_bill(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<BillId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    bill_response(services.recalculate_bill(id).await)
}

pub async fn delete_bill(Extension(services): Extension<Arc<Services>>, Path(id): Path<String>) -> Response {
    let id = match dto::parse_id::<BillId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_bill(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
