//! HTTP router setup.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

const MAX_IN_FLIGHT_REQUESTS: usize = 1024;

/// Create the application router.
pub fn create(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/offers",
            post(handlers::create_offer).get(handlers::list_offers),
        )
        .route("/offers/{id}", get(handlers::get_offer))
        .route("/offers/{id}/counter", post(handlers::counter_offer))
        .route("/offers/{id}/accept", post(handlers::accept_offer))
        .route("/offers/{id}/cancel", post(handlers::cancel_offer))
        .route("/offers/{id}/trade", post(handlers::initiate_trade))
        .route("/trades/{id}", get(handlers::get_trade))
        .route("/trades/{id}/deposit", post(handlers::deposit_asset))
        .route("/trades/{id}/cancel", post(handlers::cancel_trade))
        .route("/trades/{id}/resync", post(handlers::resync_trade))
        .route("/notifications/{user}", get(handlers::notifications))
        .route("/registry/refresh", post(handlers::registry_refresh))
        .route("/registry/verify", post(handlers::registry_verify))
        .layer(axum::middleware::from_fn(middleware::api_key_auth))
        .layer(axum::middleware::from_fn(middleware::inject_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(timeout))
        .layer(GlobalConcurrencyLimitLayer::new(MAX_IN_FLIGHT_REQUESTS))
        .with_state(state)
}
