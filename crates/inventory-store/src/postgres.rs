use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::{Points, Result, Route, RouteId, StoreError, Ticket, store::RouteStore};

const SELECT_ROUTES: &str = r#"
    SELECT r.id_route, r.start_time, r.cost, r.free_seats, r.all_seats,
           p.start_point, p.end_point
    FROM routes r
    JOIN points p ON r.id_points = p.id_points
"#;

/// PostgreSQL-backed route store implementation.
#[derive(Clone)]
pub struct PostgresRouteStore {
    pool: PgPool,
}

impl PostgresRouteStore {
    /// Creates a new PostgreSQL route store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool whose sessions run with `statement_timeout`.
    ///
    /// The server cancels and rolls back any statement that runs past the
    /// timeout and the call fails with [`StoreError::Timeout`], so a slow
    /// write never commits after its caller was told it failed.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        statement_timeout: Duration,
    ) -> Result<Self> {
        let options = url
            .parse::<PgConnectOptions>()?
            .options([("statement_timeout", statement_timeout.as_millis().to_string())]);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_route(row: PgRow) -> Result<Route> {
        let id = RouteId::new(row.try_get("id_route")?);
        let free_seats: i32 = row.try_get("free_seats")?;
        let all_seats: i32 = row.try_get("all_seats")?;

        Ok(Route {
            id,
            points: Points {
                start_point: row.try_get("start_point")?,
                end_point: row.try_get("end_point")?,
            },
            start: row.try_get("start_time")?,
            cost: row.try_get("cost")?,
            free_seats: seat_count(id, "free_seats", free_seats)?,
            all_seats: seat_count(id, "all_seats", all_seats)?,
        })
    }

    async fn fetch_routes(&self, filter: &str) -> Result<Vec<Route>> {
        let sql = format!("{SELECT_ROUTES} {filter} ORDER BY r.id_route ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_route).collect()
    }
}

fn seat_count(id: RouteId, column: &str, value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidRow(format!("route {id} has negative {column}: {value}")))
}

fn seat_param(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::InvalidRow(format!("seat count {value} does not fit the schema")))
}

#[async_trait]
impl RouteStore for PostgresRouteStore {
    async fn get_all(&self) -> Result<Vec<Route>> {
        self.fetch_routes("").await
    }

    async fn get_current(&self) -> Result<Vec<Route>> {
        self.fetch_routes("WHERE r.start_time >= date_trunc('day', now())")
            .await
    }

    async fn get_by_id(&self, id: RouteId) -> Result<Route> {
        let sql = format!("{SELECT_ROUTES} WHERE r.id_route = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        Self::row_to_route(row)
    }

    async fn delete_by_id(&self, id: RouteId) -> Result<()> {
        let result = sqlx::query("DELETE FROM routes WHERE id_route = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn get_by_endpoint(&self, endpoint: &str) -> Result<Vec<Route>> {
        let sql = format!("{SELECT_ROUTES} WHERE p.end_point = $1 ORDER BY r.start_time ASC");
        let rows = sqlx::query(&sql)
            .bind(endpoint)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Err(StoreError::NoRoutesByEndpoint(endpoint.to_string()));
        }
        rows.into_iter().map(Self::row_to_route).collect()
    }

    async fn insert(&self, route: &Route) -> Result<RouteId> {
        let free_seats = seat_param(route.free_seats)?;
        let all_seats = seat_param(route.all_seats)?;

        // Rolled back if dropped before commit
        let mut tx = self.pool.begin().await?;

        // The no-op update makes RETURNING yield the existing row on conflict.
        let points_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO points (start_point, end_point)
            VALUES ($1, $2)
            ON CONFLICT (start_point, end_point) DO UPDATE SET start_point = EXCLUDED.start_point
            RETURNING id_points
            "#,
        )
        .bind(&route.points.start_point)
        .bind(&route.points.end_point)
        .fetch_one(&mut *tx)
        .await?;

        let route_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO routes (id_points, start_time, cost, free_seats, all_seats)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id_route
            "#,
        )
        .bind(points_id)
        .bind(route.start)
        .bind(route.cost)
        .bind(free_seats)
        .bind(all_seats)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(route_id, points_id, "route stored");
        Ok(RouteId::new(route_id))
    }

    async fn decrement_seat_if_available(&self, id: RouteId) -> Result<Ticket> {
        // Conditional update: the row lock serializes concurrent buyers and
        // the predicate rejects the decrement once the route is full.
        let row = sqlx::query(
            r#"
            WITH taken AS (
                UPDATE routes
                SET free_seats = free_seats - 1
                WHERE id_route = $1 AND free_seats > 0
                RETURNING id_route, id_points, start_time, cost, free_seats, all_seats
            )
            SELECT t.id_route, t.start_time, t.cost, t.free_seats, t.all_seats,
                   p.start_point, p.end_point
            FROM taken t
            JOIN points p ON t.id_points = p.id_points
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut before = Self::row_to_route(row)?;
                before.free_seats += 1;
                Ok(Ticket::for_route(&before))
            }
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM routes WHERE id_route = $1)")
                        .bind(id.as_i64())
                        .fetch_one(&self.pool)
                        .await?;

                if exists {
                    Err(StoreError::NoFreeSeats(id))
                } else {
                    Err(StoreError::NotFound(id))
                }
            }
        }
    }
}
