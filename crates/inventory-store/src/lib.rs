pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use common::{Points, Route, RouteId, Ticket};
pub use error::{Result, StoreError};
pub use memory::InMemoryRouteStore;
pub use postgres::PostgresRouteStore;
pub use store::RouteStore;
