//! Store wrappers for exercising deadlines and shutdown in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::{InMemoryRouteStore, Result, Route, RouteId, StoreError, Ticket, store::RouteStore};

/// In-memory store that takes `delay` to answer every call.
///
/// With a write limit set, a write slower than the limit fails with
/// [`StoreError::Timeout`] after `limit` and changes nothing, the way a
/// database statement timeout does.
#[derive(Clone)]
pub struct DelayedRouteStore {
    inner: InMemoryRouteStore,
    delay: Duration,
    write_limit: Option<Duration>,
}

impl DelayedRouteStore {
    pub fn new(inner: InMemoryRouteStore, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            write_limit: None,
        }
    }

    pub fn with_write_limit(mut self, limit: Duration) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// The wrapped store, for setup and assertions without the delay.
    pub fn inner(&self) -> &InMemoryRouteStore {
        &self.inner
    }

    async fn before_read(&self) {
        tokio::time::sleep(self.delay).await;
    }

    async fn before_write(&self) -> Result<()> {
        match self.write_limit {
            Some(limit) if self.delay > limit => {
                tokio::time::sleep(limit).await;
                Err(StoreError::Timeout(format!(
                    "write took longer than {limit:?}"
                )))
            }
            _ => {
                tokio::time::sleep(self.delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RouteStore for DelayedRouteStore {
    async fn get_all(&self) -> Result<Vec<Route>> {
        self.before_read().await;
        self.inner.get_all().await
    }

    async fn get_current(&self) -> Result<Vec<Route>> {
        self.before_read().await;
        self.inner.get_current().await
    }

    async fn get_by_id(&self, id: RouteId) -> Result<Route> {
        self.before_read().await;
        self.inner.get_by_id(id).await
    }

    async fn delete_by_id(&self, id: RouteId) -> Result<()> {
        self.before_write().await?;
        self.inner.delete_by_id(id).await
    }

    async fn get_by_endpoint(&self, endpoint: &str) -> Result<Vec<Route>> {
        self.before_read().await;
        self.inner.get_by_endpoint(endpoint).await
    }

    async fn insert(&self, route: &Route) -> Result<RouteId> {
        self.before_write().await?;
        self.inner.insert(route).await
    }

    async fn decrement_seat_if_available(&self, id: RouteId) -> Result<Ticket> {
        self.before_write().await?;
        self.inner.decrement_seat_if_available(id).await
    }
}
