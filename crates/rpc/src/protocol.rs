//! Wire messages shared by the server and the client.

use common::Route;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest accepted request or response line, in bytes.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Method names understood by the server.
pub mod method {
    pub const LIST_ROUTES: &str = "list_routes";
    pub const LIST_CURRENT_ROUTES: &str = "list_current_routes";
    pub const GET_ROUTE: &str = "get_route";
    pub const CREATE_ROUTE: &str = "create_route";
    pub const DELETE_ROUTE: &str = "delete_route";
    pub const SEARCH_ROUTES: &str = "search_routes";
    pub const BUY_TICKET: &str = "buy_ticket";
}

/// Error kinds produced by the transport layer rather than the engine.
pub mod kind {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const UNKNOWN_METHOD: &str = "unknown_method";
    pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
    pub const INTERNAL: &str = "internal";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Absent when the request line could not be parsed at all.
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<u64>, kind: &str, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcErrorBody {
                kind: kind.to_string(),
                message: message.into(),
            }),
        }
    }
}

// -- Params --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdParams {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRouteParams {
    pub route: Route,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Departure day, `YYYY-MM-DD`.
    pub date: String,
    pub endpoint: String,
}
