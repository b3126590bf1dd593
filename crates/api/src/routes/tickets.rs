//! Ticket purchase endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{RouteId, Ticket};
use inventory_store::RouteStore;
use serde::{Deserialize, Serialize};

use super::inventory::{AppState, run_write};
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TicketResponse {
    pub route_id: i64,
    pub start_point: String,
    pub end_point: String,
    pub start_time: DateTime<Utc>,
    pub cost: i64,
    pub place: u32,
}

impl TicketResponse {
    fn new(route_id: RouteId, ticket: Ticket) -> Self {
        Self {
            route_id: route_id.as_i64(),
            start_point: ticket.points.start_point,
            end_point: ticket.points.end_point,
            start_time: ticket.start_time,
            cost: ticket.cost,
            place: ticket.place,
        }
    }
}

/// POST /routes/buy/{id}: buy one seat on a route.
#[tracing::instrument(skip(state))]
pub async fn buy<S: RouteStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let route_id = RouteId::new(id);
    let booking = state.booking.clone();
    let ticket = run_write(async move { booking.buy_ticket(route_id).await }).await?;
    Ok((StatusCode::CREATED, Json(TicketResponse::new(route_id, ticket))))
}
