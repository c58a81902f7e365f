//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: form/query DTOs and their parsing
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use billdesk_auth::Hs256JwtValidator;
use billdesk_infra::{AppConfig, InMemoryStore, PostgresStore, Services, Store};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// How login sessions are minted and stored client-side.
#[derive(Clone)]
pub struct SessionSettings {
    pub signer: Arc<Hs256JwtValidator>,
    pub ttl: chrono::Duration,
    pub cookie_secure: bool,
}

impl SessionSettings {
    pub fn new(jwt_secret: &str, ttl_minutes: i64, cookie_secure: bool) -> Self {
        Self {
            signer: Arc::new(Hs256JwtValidator::new(jwt_secret)),
            ttl: chrono::Duration::minutes(ttl_minutes),
            cookie_secure,
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Connects to PostgreSQL and applies migrations when a database is
/// configured; otherwise everything lives in memory.
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let store: Arc<dyn Store> = match &config.database {
        Some(database) => {
            let store = PostgresStore::connect(&database.url, database.max_connections).await?;
            store.migrate().await?;
            info!("using PostgreSQL stores");
            Arc::new(store)
        }
        None => {
            info!("using in-memory stores");
            Arc::new(InMemoryStore::new())
        }
    };

    let services = Arc::new(Services::new(store));
    let session = SessionSettings::new(&config.jwt_secret, config.session_ttl_minutes, config.cookie_secure);
    Ok(build_router(services, session))
}

/// Router over already-built services.
pub fn build_router(services: Arc<Services>, session: SessionSettings) -> Router {
    let auth_state = middleware::AuthState {
        jwt: session.signer.clone(),
    };

    // Protected routes: require a valid session.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/signup", post(routes::auth::signup))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(services))
                .layer(Extension(session)),
        )
}
