//! Bus station service: configuration and the orchestrator that runs the
//! REST and RPC front ends over one booking engine.

pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::Config;
pub use error::{Protocol, ServiceError};
pub use orchestrator::{Orchestrator, ServiceState};
