//! Service configuration loaded from environment variables.

use std::time::Duration;

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address for both listeners (default: `"0.0.0.0"`)
/// - `REST_PORT`: REST listen port (default: `8000`)
/// - `RPC_PORT`: RPC listen port (default: `8001`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `SHUTDOWN_GRACE_SECS`: how long `stop()` waits for each listener (default: `10`)
/// - `REQUEST_TIMEOUT_SECS`: per-call deadline on both front ends (default: `5`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub rest_port: u16,
    pub rpc_port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub shutdown_grace: Duration,
    pub request_timeout: Duration,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            rest_port: parsed_var("REST_PORT").unwrap_or(defaults.rest_port),
            rpc_port: parsed_var("RPC_PORT").unwrap_or(defaults.rpc_port),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            database_max_connections: parsed_var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            shutdown_grace: parsed_var("SHUTDOWN_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
            request_timeout: parsed_var("REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Returns the REST `"host:port"` bind address string.
    pub fn rest_addr(&self) -> String {
        format!("{}:{}", self.host, self.rest_port)
    }

    /// Returns the RPC `"host:port"` bind address string.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.host, self.rpc_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            rest_port: 8000,
            rpc_port: 8001,
            database_url: None,
            database_max_connections: 5,
            shutdown_grace: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            log_level: "info".to_string(),
        }
    }
}

/// Reads and parses a variable; unset or unparsable values yield `None`.
fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    parse_value(std::env::var(name).ok().as_deref())
}

fn parse_value<T: std::str::FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|value| value.trim().parse().ok())
}
