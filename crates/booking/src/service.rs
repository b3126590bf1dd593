//! Booking service: the business rules between the adapters and the store.

use chrono::{DateTime, Utc};
use common::{Route, RouteId, Ticket};
use inventory_store::RouteStore;

use crate::error::BookingError;
use crate::search::SearchWindow;

/// Service for managing routes and selling tickets.
///
/// Holds nothing but the store, so one instance can be shared by every
/// front end and called concurrently. Each call reads fresh state from the
/// store; seat-count consistency under concurrency is the store's job.
pub struct BookingService<S: RouteStore> {
    store: S,
}

impl<S: RouteStore> BookingService<S> {
    /// Creates a new booking service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lists every known route.
    #[tracing::instrument(skip(self))]
    pub async fn list_routes(&self) -> Result<Vec<Route>, BookingError> {
        Ok(self.store.get_all().await?)
    }

    /// Lists routes departing today or later.
    #[tracing::instrument(skip(self))]
    pub async fn list_current_routes(&self) -> Result<Vec<Route>, BookingError> {
        Ok(self.store.get_current().await?)
    }

    /// Loads a route by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_route(&self, id: RouteId) -> Result<Route, BookingError> {
        Ok(self.store.get_by_id(id).await?)
    }

    /// Validates and persists a new route, returning it with its assigned id.
    #[tracing::instrument(skip(self, route), fields(points = %route.points, start = %route.start))]
    pub async fn create_route(&self, route: Route) -> Result<Route, BookingError> {
        validate_new_route(&route, Utc::now())?;

        let id = self.store.insert(&route).await?;
        metrics::counter!("routes_created_total").increment(1);
        tracing::info!(%id, "route created");

        Ok(route.with_id(id))
    }

    /// Deletes a route by id.
    #[tracing::instrument(skip(self))]
    pub async fn delete_route(&self, id: RouteId) -> Result<(), BookingError> {
        self.store.delete_by_id(id).await?;
        metrics::counter!("routes_deleted_total").increment(1);
        tracing::info!(%id, "route deleted");
        Ok(())
    }

    /// Finds routes to `endpoint` departing in `[date, date + 24h)`.
    ///
    /// Fails with `NoRoutesByEndpoint` when nothing serves the destination
    /// and with `NoRoutes` when something does, but not in that window.
    #[tracing::instrument(skip(self))]
    pub async fn search_routes(
        &self,
        date: DateTime<Utc>,
        endpoint: &str,
    ) -> Result<Vec<Route>, BookingError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(BookingError::InvalidArgument(
                "endpoint must not be empty".to_string(),
            ));
        }

        let window = SearchWindow::starting_at(date)?;
        let mut routes: Vec<Route> = self
            .store
            .get_by_endpoint(endpoint)
            .await?
            .into_iter()
            .filter(|route| window.contains(route))
            .collect();

        if routes.is_empty() {
            return Err(BookingError::NoRoutes {
                endpoint: endpoint.to_string(),
                date: date.date_naive(),
            });
        }

        routes.sort_by_key(|route| (route.start, route.id));
        Ok(routes)
    }

    /// Sells one seat on the route.
    #[tracing::instrument(skip(self))]
    pub async fn buy_ticket(&self, id: RouteId) -> Result<Ticket, BookingError> {
        match self.store.decrement_seat_if_available(id).await {
            Ok(ticket) => {
                metrics::counter!("tickets_sold_total").increment(1);
                tracing::info!(%id, place = ticket.place, "ticket sold");
                Ok(ticket)
            }
            Err(err) => {
                let err = BookingError::from(err);
                metrics::counter!("ticket_purchase_rejected_total", "reason" => err.kind())
                    .increment(1);
                Err(err)
            }
        }
    }
}

fn validate_new_route(route: &Route, now: DateTime<Utc>) -> Result<(), BookingError> {
    if route.start <= now {
        return Err(BookingError::InvalidDate(format!(
            "route must start in the future, got {}",
            route.start
        )));
    }
    if route.points.start_point.trim().is_empty() || route.points.end_point.trim().is_empty() {
        return Err(BookingError::InvalidArgument(
            "start and end points are required".to_string(),
        ));
    }
    if route.all_seats == 0 {
        return Err(BookingError::InvalidArgument(
            "a route needs at least one seat".to_string(),
        ));
    }
    if route.free_seats > route.all_seats {
        return Err(BookingError::InvalidArgument(format!(
            "free seats ({}) exceed all seats ({})",
            route.free_seats, route.all_seats
        )));
    }
    if route.cost < 0 {
        return Err(BookingError::InvalidArgument(format!(
            "cost must not be negative, got {}",
            route.cost
        )));
    }
    Ok(())
}
