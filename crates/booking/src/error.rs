//! Booking error types.

use chrono::NaiveDate;
use common::RouteId;
use inventory_store::StoreError;
use thiserror::Error;

/// Errors returned by the booking engine.
///
/// Adapters switch on the variant (or on [`BookingError::kind`]) rather than
/// on the message.
#[derive(Debug, Error)]
pub enum BookingError {
    /// No route has the given id.
    #[error("Route not found: {0}")]
    NotFound(RouteId),

    /// The route would depart in the past, or a date could not be parsed.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A request field is missing or out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Every seat of the route has been sold.
    #[error("No free seats on route {0}")]
    NoFreeSeats(RouteId),

    /// Nothing serves this destination at all.
    #[error("No routes to {0}")]
    NoRoutesByEndpoint(String),

    /// The destination is served, but not on the requested day.
    #[error("No routes to {endpoint} on {date}")]
    NoRoutes { endpoint: String, date: NaiveDate },

    /// The store cancelled the operation at its deadline; nothing changed.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The inventory store failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl BookingError {
    /// Stable snake_case code for the error kind, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::NotFound(_) => "not_found",
            BookingError::InvalidDate(_) => "invalid_date",
            BookingError::InvalidArgument(_) => "invalid_argument",
            BookingError::NoFreeSeats(_) => "no_free_seats",
            BookingError::NoRoutesByEndpoint(_) => "no_routes_by_endpoint",
            BookingError::NoRoutes { .. } => "no_routes",
            BookingError::DeadlineExceeded(_) => "deadline_exceeded",
            BookingError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => BookingError::NotFound(id),
            StoreError::NoFreeSeats(id) => BookingError::NoFreeSeats(id),
            StoreError::NoRoutesByEndpoint(endpoint) => BookingError::NoRoutesByEndpoint(endpoint),
            StoreError::Timeout(msg) => {
                tracing::warn!(error = %msg, "store deadline exceeded");
                BookingError::DeadlineExceeded(msg)
            }
            other => {
                tracing::error!(error = %other, "inventory store failure");
                BookingError::StoreUnavailable(other.to_string())
            }
        }
    }
}
