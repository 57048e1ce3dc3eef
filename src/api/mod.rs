use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode},
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, KeyLedger, ServiceRegistry, ValidationEngine};

mod auth;
mod error;
mod extract;
mod keys;
mod rate_limit;
mod services;
mod system;
mod types;
mod verify;

pub use error::ApiError;
pub use rate_limit::RateLimiter;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,

    pub auth: AuthService,

    pub registry: ServiceRegistry,

    pub ledger: KeyLedger,

    pub verifier: ValidationEngine,

    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(store: Store, config: &Config) -> Self {
        let auth = AuthService::new(store.clone());

        Self {
            registry: ServiceRegistry::new(store.clone()),
            ledger: KeyLedger::new(store.clone()),
            verifier: ValidationEngine::new(store.clone(), auth.clone()),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            auth,
            store,
        }
    }
}

/// Builds app state backed by a freshly opened store.
pub async fn create_app_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::open(&config.general.data_dir).await?;
    Ok(Arc::new(AppState::new(store, config)))
}

/// Assembles the full router: every endpoint of the wire contract plus the
/// rate-limit, CORS and trace layers. Paths live at the root (no prefix) for
/// compatibility with existing clients.
pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let cors_layer = if cors_origins.iter().any(|s| s == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-token", post(auth::verify_token))
        .route("/verify", get(verify::verify))
        .route("/keys", get(keys::list_keys))
        .route("/addkey", post(keys::add_key))
        .route("/deletekey", post(keys::delete_key))
        .route("/reset-hwid", post(keys::reset_hwid))
        .route("/services", get(services::list_services))
        .route("/addservice", post(services::add_service))
        .route("/deleteservice", post(services::delete_service))
        .route("/ping", get(system::ping))
        .route("/status", get(system::status))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "404" })),
    )
}
