use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a scheduled route.
///
/// Routes that have not been persisted yet carry [`RouteId::UNASSIGNED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(i64);

impl RouteId {
    /// Id of a route the store has not seen yet.
    pub const UNASSIGNED: RouteId = RouteId(0);

    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns true once the store has assigned an id.
    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RouteId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Origin and destination of a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Points {
    pub start_point: String,
    pub end_point: String,
}

impl Points {
    pub fn new(start_point: impl Into<String>, end_point: impl Into<String>) -> Self {
        Self {
            start_point: start_point.into(),
            end_point: end_point.into(),
        }
    }
}

impl std::fmt::Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.start_point, self.end_point)
    }
}

/// A scheduled bus departure with its seat inventory.
///
/// `free_seats` never exceeds `all_seats`; `all_seats` does not change after
/// the route is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub points: Points,
    pub start: DateTime<Utc>,
    /// Fare in minor currency units.
    pub cost: i64,
    pub free_seats: u32,
    pub all_seats: u32,
}

impl Route {
    /// Creates an unpersisted route with every seat free.
    pub fn new(points: Points, start: DateTime<Utc>, cost: i64, all_seats: u32) -> Self {
        Self {
            id: RouteId::UNASSIGNED,
            points,
            start,
            cost,
            free_seats: all_seats,
            all_seats,
        }
    }

    /// Returns a copy of this route carrying the given id.
    pub fn with_id(mut self, id: RouteId) -> Self {
        self.id = id;
        self
    }

    pub fn has_free_seats(&self) -> bool {
        self.free_seats > 0
    }

    /// Seat ordinal the next purchase on this route receives.
    pub fn next_place(&self) -> u32 {
        self.all_seats - self.free_seats + 1
    }

    /// Returns true if the departure falls in `[from, until)`.
    pub fn departs_within(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        self.start >= from && self.start < until
    }
}

/// Receipt for one purchased seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub points: Points,
    pub start_time: DateTime<Utc>,
    pub cost: i64,
    pub place: u32,
}

impl Ticket {
    /// Issues the ticket for the next free seat of `route`.
    ///
    /// `route` must be the state read before the seat was taken.
    pub fn for_route(route: &Route) -> Self {
        Self {
            points: route.points.clone(),
            start_time: route.start,
            cost: route.cost,
            place: route.next_place(),
        }
    }
}
