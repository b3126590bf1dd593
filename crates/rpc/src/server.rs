//! RPC listener: accept loop, per-connection request loop and dispatch.

use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use booking::{BookingError, BookingService};
use common::RouteId;
use futures_util::{SinkExt, StreamExt};
use inventory_store::RouteStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::RpcError;
use crate::protocol::{
    CreateRouteParams, IdParams, MAX_LINE_LENGTH, RpcRequest, RpcResponse, SearchParams, kind,
    method,
};

/// Why a single call failed, before it is turned into a wire error.
#[derive(Debug)]
enum CallError {
    Booking(BookingError),
    InvalidParams(String),
    UnknownMethod(String),
    DeadlineExceeded(Duration),
    Internal(String),
    Encode(serde_json::Error),
}

impl CallError {
    fn into_response(self, id: u64) -> RpcResponse {
        match self {
            CallError::Booking(err) => RpcResponse::failure(Some(id), err.kind(), err.to_string()),
            CallError::InvalidParams(msg) => RpcResponse::failure(Some(id), kind::INVALID_REQUEST, msg),
            CallError::UnknownMethod(name) => RpcResponse::failure(
                Some(id),
                kind::UNKNOWN_METHOD,
                format!("unknown method: {name}"),
            ),
            CallError::DeadlineExceeded(after) => RpcResponse::failure(
                Some(id),
                kind::DEADLINE_EXCEEDED,
                format!("call did not complete within {after:?}"),
            ),
            CallError::Internal(msg) => {
                tracing::error!(error = %msg, "rpc call task failed");
                RpcResponse::failure(Some(id), kind::INTERNAL, msg)
            }
            CallError::Encode(err) => {
                tracing::error!(error = %err, "failed to encode rpc result");
                RpcResponse::failure(Some(id), kind::INTERNAL, err.to_string())
            }
        }
    }
}

impl From<BookingError> for CallError {
    fn from(err: BookingError) -> Self {
        CallError::Booking(err)
    }
}

impl From<serde_json::Error> for CallError {
    fn from(err: serde_json::Error) -> Self {
        CallError::Encode(err)
    }
}

fn params<P: DeserializeOwned>(raw: Value) -> Result<P, CallError> {
    serde_json::from_value(raw).map_err(|e| CallError::InvalidParams(format!("invalid params: {e}")))
}

fn encode<T: Serialize>(value: T) -> Result<Value, CallError> {
    Ok(serde_json::to_value(value)?)
}

/// Serves the booking engine over line-delimited JSON.
pub struct RpcServer<S: RouteStore> {
    booking: Arc<BookingService<S>>,
    request_timeout: Duration,
}

impl<S: RouteStore> Clone for RpcServer<S> {
    fn clone(&self) -> Self {
        Self {
            booking: self.booking.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<S: RouteStore + 'static> RpcServer<S> {
    pub fn new(booking: Arc<BookingService<S>>, request_timeout: Duration) -> Self {
        Self {
            booking,
            request_timeout,
        }
    }

    /// Accepts connections until `shutdown` is cancelled, then drains.
    ///
    /// After cancellation no new connection is accepted, every open
    /// connection finishes the call it is executing and sends the answer,
    /// and this returns once all of them are closed. Dropping the returned
    /// future aborts every connection task.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), RpcError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "rpc listener accepting connections");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = self.clone();
                        let token = shutdown.child_token();
                        connections.spawn(async move {
                            if let Err(err) = server.handle_connection(stream, peer, token).await {
                                tracing::warn!(%peer, error = %err, "rpc connection ended with error");
                            }
                        });
                    }
                    Err(err) if is_transient(&err) => {
                        tracing::warn!(error = %err, "rpc accept failed, continuing");
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "rpc listener failed");
                        shutdown.cancel();
                        drain(&mut connections).await;
                        return Err(err.into());
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(err) = finished {
                        tracing::error!(error = %err, "rpc connection task panicked");
                    }
                }
            }
        }

        drop(listener);
        tracing::info!(open = connections.len(), "rpc listener closed, draining connections");
        drain(&mut connections).await;
        tracing::info!("rpc listener stopped");
        Ok(())
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        shutdown: CancellationToken,
    ) -> Result<(), RpcError> {
        tracing::debug!(%peer, "rpc connection opened");
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        loop {
            // Only the wait for the next line races the shutdown; a call
            // that has started always runs to completion.
            let line = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                next = framed.next() => match next {
                    Some(Ok(line)) => line,
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        let response = RpcResponse::failure(
                            None,
                            kind::INVALID_REQUEST,
                            format!("request exceeds {MAX_LINE_LENGTH} bytes"),
                        );
                        framed.send(serde_json::to_string(&response)?).await?;
                        continue;
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                },
            };

            if line.trim().is_empty() {
                continue;
            }

            let response = self.handle_line(&line).await;
            framed.send(serde_json::to_string(&response)?).await?;
        }

        tracing::debug!(%peer, "rpc connection closed");
        Ok(())
    }

    /// Parses one request line and executes it.
    ///
    /// Reads run under the request deadline. Writes run to completion on
    /// their own task and rely on the store to bound them, so a reported
    /// failure always means nothing was written.
    pub async fn handle_line(&self, line: &str) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                return RpcResponse::failure(None, kind::INVALID_REQUEST, format!("malformed request: {err}"));
            }
        };

        let id = request.id;
        match self.dispatch(request).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(err) => err.into_response(id),
        }
    }

    #[tracing::instrument(skip(self, request), fields(id = request.id, method = %request.method))]
    async fn dispatch(&self, request: RpcRequest) -> Result<Value, CallError> {
        let booking = self.booking.clone();
        match request.method.as_str() {
            method::LIST_ROUTES => self.read(booking.list_routes()).await,
            method::LIST_CURRENT_ROUTES => self.read(booking.list_current_routes()).await,
            method::GET_ROUTE => {
                let p: IdParams = params(request.params)?;
                self.read(booking.get_route(RouteId::new(p.id))).await
            }
            method::SEARCH_ROUTES => {
                let p: SearchParams = params(request.params)?;
                let from = booking::parse_day(&p.date)?;
                self.read(booking.search_routes(from, &p.endpoint)).await
            }
            method::CREATE_ROUTE => {
                let p: CreateRouteParams = params(request.params)?;
                write(async move { booking.create_route(p.route).await }).await
            }
            method::DELETE_ROUTE => {
                let p: IdParams = params(request.params)?;
                write(async move { booking.delete_route(RouteId::new(p.id)).await }).await
            }
            method::BUY_TICKET => {
                let p: IdParams = params(request.params)?;
                write(async move { booking.buy_ticket(RouteId::new(p.id)).await }).await
            }
            other => Err(CallError::UnknownMethod(other.to_string())),
        }
    }

    async fn read<T, F>(&self, call: F) -> Result<Value, CallError>
    where
        T: Serialize,
        F: Future<Output = Result<T, BookingError>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => encode(result?),
            Err(_) => {
                tracing::warn!(timeout = ?self.request_timeout, "rpc call deadline exceeded");
                Err(CallError::DeadlineExceeded(self.request_timeout))
            }
        }
    }
}

async fn write<T, F>(call: F) -> Result<Value, CallError>
where
    T: Serialize + Send + 'static,
    F: Future<Output = Result<T, BookingError>> + Send + 'static,
{
    match tokio::spawn(call.in_current_span()).await {
        Ok(result) => encode(result?),
        Err(err) => Err(CallError::Internal(err.to_string())),
    }
}

fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}

async fn drain(connections: &mut JoinSet<()>) {
    while let Some(finished) = connections.join_next().await {
        if let Err(err) = finished {
            tracing::error!(error = %err, "rpc connection task panicked");
        }
    }
}
