use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use billdesk_infra::Services;

use crate::app::errors;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({ "username": principal.username() }))
}

/// Dashboard counts and revenue for the signed-in user.
pub async fn home(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.dashboard().await {
        Ok(summary) => Json(serde_json::json!({
            "username": principal.username(),
            "summary": summary,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
