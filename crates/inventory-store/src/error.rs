use thiserror::Error;

use crate::RouteId;

/// Errors that can occur when interacting with the route store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No route has the given id.
    #[error("Route not found: {0}")]
    NotFound(RouteId),

    /// The store holds no route towards the given destination.
    #[error("No routes by endpoint: {0}")]
    NoRoutesByEndpoint(String),

    /// Every seat of the route has been sold.
    #[error("No free seats on route {0}")]
    NoFreeSeats(RouteId),

    /// A stored row could not be turned into a route.
    #[error("Invalid route row: {0}")]
    InvalidRow(String),

    /// The store cannot serve requests right now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store gave up on the operation at its deadline and applied
    /// nothing.
    #[error("Store deadline exceeded: {0}")]
    Timeout(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// SQLSTATE raised when `statement_timeout` cancels a statement.
const QUERY_CANCELED: &str = "57014";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                StoreError::Timeout(db.message().to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Result type for route store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
