//! REST surface over the glucose service.

mod auth;
mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

pub use auth::{CallerId, USER_ID_HEADER};

use crate::glucose::GlucoseService;

/// Shared server state.
pub struct AppState {
    pub glucose: GlucoseService,
}

pub fn build_router(glucose: GlucoseService) -> Router {
    let state = Arc::new(AppState { glucose });

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/glucose",
            post(handlers::create_reading).get(handlers::list_readings),
        )
        .route("/glucose/batch", post(handlers::create_batch))
        .route("/glucose/stats", get(handlers::stats))
        .route("/glucose/chart", get(handlers::chart))
        .route("/glucose/alerts", get(handlers::list_alerts))
        .route(
            "/glucose/alerts/{id}/acknowledge",
            post(handlers::acknowledge_alert),
        )
        .route(
            "/glucose/target-range",
            get(handlers::get_target_range).put(handlers::put_target_range),
        )
        .route("/glucose/{id}", delete(handlers::delete_reading))
        .with_state(state)
}
