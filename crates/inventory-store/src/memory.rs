use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::RwLock;

use crate::{Points, Result, Route, RouteId, StoreError, Ticket, store::RouteStore};

#[derive(Debug, Clone)]
struct StoredRoute {
    points_id: i64,
    start: DateTime<Utc>,
    cost: i64,
    free_seats: u32,
    all_seats: u32,
}

#[derive(Debug, Default)]
struct InMemoryState {
    routes: BTreeMap<RouteId, StoredRoute>,
    points: BTreeMap<i64, Points>,
    points_index: HashMap<Points, i64>,
    last_route_id: i64,
    last_points_id: i64,
    unavailable: bool,
}

impl InMemoryState {
    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }

    fn to_route(&self, id: RouteId, stored: &StoredRoute) -> Result<Route> {
        let points = self
            .points
            .get(&stored.points_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::InvalidRow(format!(
                    "route {id} references missing points {}",
                    stored.points_id
                ))
            })?;

        Ok(Route {
            id,
            points,
            start: stored.start,
            cost: stored.cost,
            free_seats: stored.free_seats,
            all_seats: stored.all_seats,
        })
    }

    fn collect<F>(&self, mut keep: F) -> Result<Vec<Route>>
    where
        F: FnMut(&Points, &StoredRoute) -> bool,
    {
        let mut routes = Vec::new();
        for (id, stored) in &self.routes {
            let route = self.to_route(*id, stored)?;
            if keep(&route.points, stored) {
                routes.push(route);
            }
        }
        Ok(routes)
    }

    fn points_id_for(&mut self, points: &Points) -> i64 {
        if let Some(id) = self.points_index.get(points) {
            return *id;
        }
        self.last_points_id += 1;
        let id = self.last_points_id;
        self.points.insert(id, points.clone());
        self.points_index.insert(points.clone(), id);
        id
    }
}

/// In-memory route store for tests and database-less runs.
///
/// Routes sharing an origin/destination pair share one points entry, the
/// same way the PostgreSQL schema does.
#[derive(Clone, Default)]
pub struct InMemoryRouteStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryRouteStore {
    /// Creates a new empty in-memory route store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of routes stored.
    pub async fn route_count(&self) -> usize {
        self.state.read().await.routes.len()
    }

    /// Returns the number of distinct points entries.
    pub async fn points_count(&self) -> usize {
        self.state.read().await.points.len()
    }

    /// Makes every subsequent call fail with `Unavailable` while set.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

fn start_of_today() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[async_trait]
impl RouteStore for InMemoryRouteStore {
    async fn get_all(&self) -> Result<Vec<Route>> {
        let state = self.state.read().await;
        state.check_available()?;
        state.collect(|_, _| true)
    }

    async fn get_current(&self) -> Result<Vec<Route>> {
        let state = self.state.read().await;
        state.check_available()?;
        let today = start_of_today();
        state.collect(|_, stored| stored.start >= today)
    }

    async fn get_by_id(&self, id: RouteId) -> Result<Route> {
        let state = self.state.read().await;
        state.check_available()?;
        let stored = state.routes.get(&id).ok_or(StoreError::NotFound(id))?;
        state.to_route(id, stored)
    }

    async fn delete_by_id(&self, id: RouteId) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_available()?;
        state
            .routes
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn get_by_endpoint(&self, endpoint: &str) -> Result<Vec<Route>> {
        let state = self.state.read().await;
        state.check_available()?;
        let routes = state.collect(|points, _| points.end_point == endpoint)?;
        if routes.is_empty() {
            return Err(StoreError::NoRoutesByEndpoint(endpoint.to_string()));
        }
        Ok(routes)
    }

    async fn insert(&self, route: &Route) -> Result<RouteId> {
        let mut state = self.state.write().await;
        state.check_available()?;

        let points_id = state.points_id_for(&route.points);
        state.last_route_id += 1;
        let id = RouteId::new(state.last_route_id);
        state.routes.insert(
            id,
            StoredRoute {
                points_id,
                start: route.start,
                cost: route.cost,
                free_seats: route.free_seats,
                all_seats: route.all_seats,
            },
        );

        tracing::debug!(%id, points_id, "route stored");
        Ok(id)
    }

    async fn decrement_seat_if_available(&self, id: RouteId) -> Result<Ticket> {
        // Check and decrement under one write guard, with no await in between.
        let mut state = self.state.write().await;
        state.check_available()?;

        let stored = state.routes.get(&id).ok_or(StoreError::NotFound(id))?;
        if stored.free_seats == 0 {
            return Err(StoreError::NoFreeSeats(id));
        }
        let before = state.to_route(id, stored)?;
        let ticket = Ticket::for_route(&before);

        if let Some(stored) = state.routes.get_mut(&id) {
            stored.free_seats -= 1;
        }
        Ok(ticket)
    }
}
