//! REST front end for the bus station.
//!
//! Translates HTTP requests into booking engine calls and engine results
//! into JSON responses. Error bodies carry the engine's error kind so
//! clients can tell "no such route" from "nothing serves this destination".

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use booking::BookingService;
use inventory_store::RouteStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use routes::inventory::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: RouteStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health::<S>))
        .route(
            "/routes",
            get(routes::inventory::list::<S>).post(routes::inventory::create::<S>),
        )
        .route("/routes/current", get(routes::inventory::list_current::<S>))
        .route(
            "/routes/{id}",
            get(routes::inventory::get::<S>).delete(routes::inventory::delete::<S>),
        )
        .route("/routes/buy/{id}", post(routes::tickets::buy::<S>))
        .route("/route_search", get(routes::inventory::search::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wraps a booking service into the shared handler state.
pub fn create_state<S: RouteStore + 'static>(
    booking: Arc<BookingService<S>>,
    request_timeout: Duration,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        booking,
        request_timeout,
    })
}
