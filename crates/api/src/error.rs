//! API error types with HTTP response mapping.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use booking::BookingError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The booking engine rejected the request.
    Booking(BookingError),
    /// The request did not finish within its deadline.
    DeadlineExceeded(Duration),
    /// The task running the request failed.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Booking(err) => (booking_status(&err), err.kind(), err.to_string()),
            ApiError::DeadlineExceeded(after) => {
                tracing::warn!(?after, "request deadline exceeded");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "deadline_exceeded",
                    format!("request did not complete within {after:?}"),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request task failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        };

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn booking_status(err: &BookingError) -> StatusCode {
    match err {
        BookingError::NotFound(_)
        | BookingError::NoRoutesByEndpoint(_)
        | BookingError::NoRoutes { .. } => StatusCode::NOT_FOUND,
        BookingError::InvalidDate(_) | BookingError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        BookingError::NoFreeSeats(_) => StatusCode::CONFLICT,
        BookingError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        BookingError::StoreUnavailable(msg) => {
            tracing::error!(error = %msg, "store unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        ApiError::Booking(err)
    }
}
