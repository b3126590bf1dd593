//! Route inventory endpoints: listing, lookup, search, create and delete.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use booking::{BookingError, BookingService};
use chrono::{DateTime, Utc};
use common::{Points, Route, RouteId};
use inventory_store::RouteStore;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: RouteStore> {
    pub booking: Arc<BookingService<S>>,
    /// Deadline applied to every engine call.
    pub request_timeout: Duration,
}

/// Runs an engine read under the request deadline.
///
/// Timing out drops the call, which is harmless for a read.
pub(crate) async fn with_deadline<T, F>(timeout: Duration, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, BookingError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(_) => Err(ApiError::DeadlineExceeded(timeout)),
    }
}

/// Runs an engine write to completion on its own task.
///
/// No client-side deadline applies: a write dropped after it reached the
/// store could still commit while the caller is told it failed. The store
/// bounds its writes and rolls back with `DeadlineExceeded` instead. The
/// task also keeps going if the client disconnects mid-request.
pub(crate) async fn run_write<T, F>(call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, BookingError>> + Send + 'static,
{
    match tokio::spawn(call.in_current_span()).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(err) => Err(ApiError::Internal(err.to_string())),
    }
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateRouteRequest {
    pub start_point: String,
    pub end_point: String,
    pub start: DateTime<Utc>,
    pub cost: i64,
    pub all_seats: u32,
    /// Defaults to `all_seats`.
    pub free_seats: Option<u32>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    /// Departure day, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Destination.
    pub point: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RouteResponse {
    pub id: i64,
    pub start_point: String,
    pub end_point: String,
    pub start: DateTime<Utc>,
    pub cost: i64,
    pub free_seats: u32,
    pub all_seats: u32,
}

impl From<Route> for RouteResponse {
    fn from(route: Route) -> Self {
        Self {
            id: route.id.as_i64(),
            start_point: route.points.start_point,
            end_point: route.points.end_point,
            start: route.start,
            cost: route.cost,
            free_seats: route.free_seats,
            all_seats: route.all_seats,
        }
    }
}

fn to_responses(routes: Vec<Route>) -> Json<Vec<RouteResponse>> {
    Json(routes.into_iter().map(RouteResponse::from).collect())
}

// -- Handlers --

/// GET /routes: every route in the store.
#[tracing::instrument(skip(state))]
pub async fn list<S: RouteStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<RouteResponse>>, ApiError> {
    let routes = with_deadline(state.request_timeout, state.booking.list_routes()).await?;
    Ok(to_responses(routes))
}

/// GET /routes/current: routes departing today or later.
#[tracing::instrument(skip(state))]
pub async fn list_current<S: RouteStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<RouteResponse>>, ApiError> {
    let routes =
        with_deadline(state.request_timeout, state.booking.list_current_routes()).await?;
    Ok(to_responses(routes))
}

/// GET /routes/{id}: a single route.
#[tracing::instrument(skip(state))]
pub async fn get<S: RouteStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<RouteResponse>, ApiError> {
    let route = with_deadline(
        state.request_timeout,
        state.booking.get_route(RouteId::new(id)),
    )
    .await?;
    Ok(Json(route.into()))
}

/// POST /routes: schedule a new route.
#[tracing::instrument(skip(state, req), fields(start_point = %req.start_point, end_point = %req.end_point))]
pub async fn create<S: RouteStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateRouteRequest>,
) -> Result<(StatusCode, Json<RouteResponse>), ApiError> {
    let mut route = Route::new(
        Points::new(req.start_point, req.end_point),
        req.start,
        req.cost,
        req.all_seats,
    );
    if let Some(free_seats) = req.free_seats {
        route.free_seats = free_seats;
    }

    let booking = state.booking.clone();
    let created = run_write(async move { booking.create_route(route).await }).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// DELETE /routes/{id}: remove a route.
#[tracing::instrument(skip(state))]
pub async fn delete<S: RouteStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let booking = state.booking.clone();
    run_write(async move { booking.delete_route(RouteId::new(id)).await }).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /route_search?date=YYYY-MM-DD&point=X: routes to X departing that day.
#[tracing::instrument(skip(state, query))]
pub async fn search<S: RouteStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<RouteResponse>>, ApiError> {
    let date = parse_day(query.date.as_deref())?;
    let endpoint = query.point.unwrap_or_default();

    let routes = with_deadline(
        state.request_timeout,
        state.booking.search_routes(date, &endpoint),
    )
    .await?;
    Ok(to_responses(routes))
}

pub(crate) fn parse_day(raw: Option<&str>) -> Result<DateTime<Utc>, BookingError> {
    let raw = raw.ok_or_else(|| BookingError::InvalidDate("date is required".to_string()))?;
    booking::parse_day(raw)
}
