//! HTTP handlers grouped by resource.

pub mod inventory;
pub mod system;
pub mod tickets;
