//! Typed client for the line-delimited JSON protocol.

use chrono::NaiveDate;
use common::{Route, RouteId, Ticket};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Framed, LinesCodec};

use crate::error::RpcError;
use crate::protocol::{
    CreateRouteParams, IdParams, MAX_LINE_LENGTH, RpcRequest, RpcResponse, SearchParams, method,
};

/// One connection to an [`RpcServer`](crate::RpcServer).
///
/// Calls are sequential: each one waits for its answer before the next
/// request is written.
pub struct RpcClient {
    framed: Framed<TcpStream, LinesCodec>,
    next_id: u64,
}

impl RpcClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            next_id: 1,
        })
    }

    /// Sends a raw call and decodes its result.
    pub async fn call<P, T>(&mut self, method: &str, params: P) -> Result<T, RpcError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let id = self.next_id;
        self.next_id += 1;

        let request = RpcRequest {
            id,
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };
        self.framed.send(serde_json::to_string(&request)?).await?;

        let line = self
            .framed
            .next()
            .await
            .ok_or(RpcError::ConnectionClosed)??;
        let response: RpcResponse = serde_json::from_str(&line)?;

        if response.id != Some(id) {
            return Err(RpcError::UnexpectedResponse(format!(
                "expected id {id}, got {:?}",
                response.id
            )));
        }

        match (response.result, response.error) {
            (_, Some(error)) => Err(RpcError::Remote {
                kind: error.kind,
                message: error.message,
            }),
            (Some(result), None) => Ok(serde_json::from_value(result)?),
            (None, None) => Ok(serde_json::from_value(Value::Null)?),
        }
    }

    pub async fn list_routes(&mut self) -> Result<Vec<Route>, RpcError> {
        self.call(method::LIST_ROUTES, Value::Null).await
    }

    pub async fn list_current_routes(&mut self) -> Result<Vec<Route>, RpcError> {
        self.call(method::LIST_CURRENT_ROUTES, Value::Null).await
    }

    pub async fn get_route(&mut self, id: RouteId) -> Result<Route, RpcError> {
        self.call(method::GET_ROUTE, IdParams { id: id.as_i64() }).await
    }

    /// Returns the stored route with its assigned id.
    pub async fn create_route(&mut self, route: Route) -> Result<Route, RpcError> {
        self.call(method::CREATE_ROUTE, CreateRouteParams { route }).await
    }

    pub async fn delete_route(&mut self, id: RouteId) -> Result<(), RpcError> {
        self.call(method::DELETE_ROUTE, IdParams { id: id.as_i64() }).await
    }

    pub async fn search_routes(
        &mut self,
        date: NaiveDate,
        endpoint: &str,
    ) -> Result<Vec<Route>, RpcError> {
        let params = SearchParams {
            date: date.format(booking::search::DAY_FORMAT).to_string(),
            endpoint: endpoint.to_string(),
        };
        self.call(method::SEARCH_ROUTES, params).await
    }

    pub async fn buy_ticket(&mut self, id: RouteId) -> Result<Ticket, RpcError> {
        self.call(method::BUY_TICKET, IdParams { id: id.as_i64() }).await
    }
}
