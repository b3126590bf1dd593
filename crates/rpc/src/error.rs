//! RPC transport and remote error types.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Errors raised by the RPC server's connection handling and by the client.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing failure (oversized line, broken stream).
    #[error("Framing error: {0}")]
    Codec(#[from] LinesCodecError),

    /// A message could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer closed the connection before answering.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// The peer answered a different request than the one sent.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The server executed the call and reported an error.
    #[error("{kind}: {message}")]
    Remote { kind: String, message: String },
}

impl RpcError {
    /// Error kind reported by the server, if this is a remote error.
    pub fn remote_kind(&self) -> Option<&str> {
        match self {
            RpcError::Remote { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
