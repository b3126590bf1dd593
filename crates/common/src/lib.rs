//! Shared value types for the bus station: routes, their endpoints and tickets.

mod types;

pub use types::{Points, Route, RouteId, Ticket};
