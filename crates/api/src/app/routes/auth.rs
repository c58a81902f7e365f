use std::sync::Arc;

use axum::{
    Form, Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use tracing::{error, info};

use billdesk_auth::JwtClaims;
use billdesk_infra::Services;

use crate::app::{SessionSettings, dto, errors};
use crate::middleware::SESSION_COOKIE;

pub async fn signup(Extension(services): Extension<Arc<Services>>, Form(form): Form<dto::SignupForm>) -> Response {
    match services.signup(form.into_new_user()).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": user.id_typed(),
                "name": user.name(),
                "username": user.username(),
                "email": user.email(),
                "created_at": user.created_at(),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Exchange credentials for a session token, returned in the body and set
/// as an `HttpOnly` cookie.
pub async fn login(
    Extension(services): Extension<Arc<Services>>,
    Extension(session): Extension<SessionSettings>,
    jar: CookieJar,
    Form(form): Form<dto::LoginForm>,
) -> Response {
    let username = form.username.unwrap_or_default();
    let password = form.password.unwrap_or_default();

    let user = match services.authenticate(&username, &password).await {
        Ok(user) => user,
        Err(e) => return errors::service_error_to_response(e),
    };

    let claims = JwtClaims::for_user(user.username(), Utc::now(), session.ttl);
    let token = match session.signer.issue(&claims) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "failed to sign session token");
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", "could not issue session");
        }
    };

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .secure(session.cookie_secure)
        .max_age(time::Duration::minutes(session.ttl.num_minutes()))
        .build();

    info!(username = %user.username(), "user logged in");
    (
        jar.add(cookie),
        Json(serde_json::json!({
            "token": token,
            "token_type": "Bearer",
            "expires_at": claims.expires_at,
            "username": user.username(),
        })),
    )
        .into_response()
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(removal), StatusCode::NO_CONTENT)
}
