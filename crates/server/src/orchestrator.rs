//! Runs the REST and RPC listeners as one service.
//!
//! Both listeners share one [`BookingService`] and one shutdown token.
//! The token is cancelled by [`Orchestrator::stop`], and also by either
//! listener task if it ends on its own, so the two never outlive each
//! other.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use booking::BookingService;
use inventory_store::RouteStore;
use metrics_exporter_prometheus::PrometheusHandle;
use rpc::RpcServer;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Protocol, ServiceError};

/// Lifecycle of an [`Orchestrator`]. There is no way back from `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Running,
    Stopping,
    Stopped,
}

pub struct Orchestrator<S: RouteStore> {
    booking: Arc<BookingService<S>>,
    metrics_handle: PrometheusHandle,
    rest_bind: String,
    rpc_bind: String,
    request_timeout: Duration,
    grace_period: Duration,
    state: ServiceState,
    shutdown: CancellationToken,
    rest_addr: Option<SocketAddr>,
    rpc_addr: Option<SocketAddr>,
    rest_task: Option<JoinHandle<()>>,
    rpc_task: Option<JoinHandle<()>>,
}

impl<S: RouteStore + 'static> Orchestrator<S> {
    pub fn new(
        booking: Arc<BookingService<S>>,
        metrics_handle: PrometheusHandle,
        config: &Config,
    ) -> Self {
        Self {
            booking,
            metrics_handle,
            rest_bind: config.rest_addr(),
            rpc_bind: config.rpc_addr(),
            request_timeout: config.request_timeout,
            grace_period: config.shutdown_grace,
            state: ServiceState::Created,
            shutdown: CancellationToken::new(),
            rest_addr: None,
            rpc_addr: None,
            rest_task: None,
            rpc_task: None,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Address the REST listener is bound to, once started.
    pub fn rest_addr(&self) -> Option<SocketAddr> {
        self.rest_addr
    }

    /// Address the RPC listener is bound to, once started.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc_addr
    }

    /// Cancelled when the service begins to stop, for whatever reason.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Binds and starts both listeners.
    ///
    /// Returns once both are accepting connections. If either bind fails,
    /// whatever was already started is stopped before the error is
    /// returned and the orchestrator ends up `Stopped`.
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        if self.state != ServiceState::Created {
            return Err(ServiceError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        let (rpc_listener, rpc_addr) = match bind(Protocol::Rpc, &self.rpc_bind).await {
            Ok(bound) => bound,
            Err(err) => {
                self.state = ServiceState::Stopped;
                return Err(err);
            }
        };
        self.rpc_addr = Some(rpc_addr);
        self.rpc_task = Some(self.spawn_rpc(rpc_listener));

        let (rest_listener, rest_addr) = match bind(Protocol::Rest, &self.rest_bind).await {
            Ok(bound) => bound,
            Err(err) => {
                error!(error = %err, "aborting startup, stopping RPC listener");
                self.shutdown.cancel();
                join_with_grace(Protocol::Rpc, &mut self.rpc_task, self.grace_period).await;
                self.state = ServiceState::Stopped;
                return Err(err);
            }
        };
        self.rest_addr = Some(rest_addr);
        self.rest_task = Some(self.spawn_rest(rest_listener));

        self.state = ServiceState::Running;
        info!(%rest_addr, %rpc_addr, "bus station service running");
        Ok(())
    }

    /// Stops both listeners and waits for them to finish.
    ///
    /// In-flight calls complete before their listener closes. A listener
    /// that has not finished within the grace period is aborted. If an
    /// earlier `stop` was dropped part way, calling it again resumes the
    /// wait. Calling this on a stopped service does nothing.
    pub async fn stop(&mut self) {
        match self.state {
            ServiceState::Stopped => return,
            ServiceState::Created => {
                self.state = ServiceState::Stopped;
                return;
            }
            ServiceState::Running => {
                self.state = ServiceState::Stopping;
                info!(grace_period = ?self.grace_period, "stopping bus station service");
                self.shutdown.cancel();
            }
            ServiceState::Stopping => info!("resuming interrupted stop"),
        }

        let grace = self.grace_period;
        tokio::join!(
            join_with_grace(Protocol::Rpc, &mut self.rpc_task, grace),
            join_with_grace(Protocol::Rest, &mut self.rest_task, grace),
        );

        self.state = ServiceState::Stopped;
        info!("bus station service stopped");
    }

    fn spawn_rpc(&self, listener: TcpListener) -> JoinHandle<()> {
        let server = RpcServer::new(self.booking.clone(), self.request_timeout);
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = server.serve(listener, token.clone()).await {
                error!(error = %err, "RPC listener failed");
            }
            token.cancel();
        })
    }

    fn spawn_rest(&self, listener: TcpListener) -> JoinHandle<()> {
        let state = api::create_state(self.booking.clone(), self.request_timeout);
        let app = api::create_app(state, self.metrics_handle.clone());
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            let signal = token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await;
            if let Err(err) = result {
                error!(error = %err, "REST listener failed");
            }
            token.cancel();
        })
    }
}

async fn bind(protocol: Protocol, addr: &str) -> Result<(TcpListener, SocketAddr), ServiceError> {
    let bind_error = |source| ServiceError::Bind {
        protocol,
        addr: addr.to_string(),
        source,
    };
    let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
    let local = listener.local_addr().map_err(bind_error)?;
    info!(%protocol, addr = %local, "listener bound");
    Ok((listener, local))
}

/// Waits for a listener task, aborting it after `grace`.
///
/// The handle stays in `slot` until the task has finished, so a dropped
/// wait can be resumed.
async fn join_with_grace(protocol: Protocol, slot: &mut Option<JoinHandle<()>>, grace: Duration) {
    let Some(task) = slot.as_mut() else {
        return;
    };
    let outcome = tokio::time::timeout(grace, &mut *task).await;
    match outcome {
        Ok(Ok(())) => info!(%protocol, "listener stopped"),
        Ok(Err(err)) => error!(%protocol, error = %err, "listener task panicked"),
        Err(_) => {
            warn!(%protocol, ?grace, "listener did not stop within grace period, aborting");
            task.abort();
            let _ = (&mut *task).await;
        }
    }
    *slot = None;
}
