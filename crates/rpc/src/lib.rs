//! Remote-procedure front end for the bus station.
//!
//! The wire format is one JSON object per line over TCP:
//!
//! ```text
//! -> {"id":1,"method":"buy_ticket","params":{"id":7}}
//! <- {"id":1,"result":{"points":{...},"start_time":"...","cost":1500,"place":3}}
//! <- {"id":2,"error":{"kind":"no_free_seats","message":"No free seats on route 7"}}
//! ```
//!
//! [`RpcServer`] serves the booking engine over this protocol and
//! [`RpcClient`] is the matching typed client.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::RpcClient;
pub use error::RpcError;
pub use server::RpcServer;
