//! Service lifecycle errors.

use std::fmt;

use inventory_store::StoreError;
use thiserror::Error;

use crate::orchestrator::ServiceState;

/// The two front ends the orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Rest,
    Rpc,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Rest => write!(f, "REST"),
            Protocol::Rpc => write!(f, "RPC"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A listener could not be bound; nothing is left running.
    #[error("Failed to bind {protocol} listener on {addr}: {source}")]
    Bind {
        protocol: Protocol,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot {operation} a service in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ServiceState,
    },

    /// Store setup failure at startup (connection, migrations).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
