use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use billdesk_core::DomainError;
use billdesk_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::DuplicateKey(field) => {
            json_error(StatusCode::CONFLICT, "duplicate_key", format!("{field} already exists"))
        }
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Unauthorized => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "invalid username or password",
        ),
        ServiceError::Store(msg) => {
            error!(error = %msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal storage error")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        e @ DomainError::InvalidTransition { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition", e.to_string())
        }
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
    }
}

pub fn validation_error(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
