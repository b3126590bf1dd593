//! Booking engine for the bus station.
//!
//! This crate holds the business rules on top of the inventory store:
//! - route creation with date and seat validation
//! - destination search inside a one-day window
//! - ticket sales that never oversell a route

pub mod error;
pub mod search;
pub mod service;

pub use error::BookingError;
pub use search::{SearchWindow, parse_day};
pub use service::BookingService;
