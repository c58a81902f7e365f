use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::debug;

use billdesk_auth::{JwtValidator, Principal};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Name of the session cookie set on login.
pub const SESSION_COOKIE: &str = "billdesk_session";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Require a valid session token, from `Authorization: Bearer` or the session
/// cookie, and expose the caller as a [`PrincipalContext`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    jar: CookieJar,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()).or_else(|| session_cookie(&jar)) else {
        return unauthorized();
    };

    let claims = match state.jwt.validate(&token, Utc::now()) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "rejected session token");
            return unauthorized();
        }
    };

    req.extensions_mut()
        .insert(PrincipalContext::from(Principal::from(claims)));

    next.run(req).await
}

fn unauthorized() -> Response {
    errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "authentication required")
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn session_cookie(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|token| !token.is_empty())
}
