use async_trait::async_trait;

use crate::{Result, Route, RouteId, Ticket};

/// Durable keeper of routes and their seat counts.
///
/// All implementations must be thread-safe (Send + Sync). Writes are atomic:
/// a call that is dropped before it completes leaves no partial change behind.
/// A store that can be slow bounds its own writes and fails them with
/// `Timeout` having applied nothing.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Retrieves every route in the store.
    async fn get_all(&self) -> Result<Vec<Route>>;

    /// Retrieves routes departing today or later, by the store's own clock.
    async fn get_current(&self) -> Result<Vec<Route>>;

    /// Retrieves a single route.
    ///
    /// Fails with `NotFound` if no route has that id.
    async fn get_by_id(&self, id: RouteId) -> Result<Route>;

    /// Deletes a route.
    ///
    /// Fails with `NotFound` if nothing was deleted.
    async fn delete_by_id(&self, id: RouteId) -> Result<()>;

    /// Retrieves every route whose destination is `endpoint`.
    ///
    /// Fails with `NoRoutesByEndpoint` if there is none.
    async fn get_by_endpoint(&self, endpoint: &str) -> Result<Vec<Route>>;

    /// Persists a new route and returns its assigned id.
    ///
    /// Looking up (or creating) the shared points entry and inserting the
    /// route happen as one unit.
    async fn insert(&self, route: &Route) -> Result<RouteId>;

    /// Takes one seat on the route and returns the ticket for it.
    ///
    /// The free-seat check and the decrement are applied atomically, so
    /// concurrent callers can never oversell the last seat. Fails with
    /// `NotFound` or `NoFreeSeats`.
    async fn decrement_seat_if_available(&self, id: RouteId) -> Result<Ticket>;
}
