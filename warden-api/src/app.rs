use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use warden_orchestrator::Orchestrator;
use warden_providers::RegistryStore;

use crate::auth::{self, GatewayContext, TokenValidator};
use crate::handlers;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub registry: Arc<dyn RegistryStore>,
    pub validator: Arc<dyn TokenValidator>,
    pub gateway: GatewayContext,
}

/// Health is the only anonymous route; everything else goes through the
/// bearer-token guard.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new().route("/health", get(handlers::health));

    let protected = Router::new()
        .route("/servers", get(handlers::list_servers))
        .route("/servers/start", post(handlers::start_server))
        .route("/servers/stop", post(handlers::stop_server))
        .route("/servers/terminate", post(handlers::terminate_server))
        .route("/servers/register", post(handlers::register_server))
        .route("/servers/{id}/ping", get(handlers::ping_server))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_authorized,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
