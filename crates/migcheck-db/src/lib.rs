//! # migcheck-db
//!
//! Database connectivity for migcheck.
//!
//! - [`DatabaseConnection`] - the session trait the engine executes against.
//! - [`PostgresConnection`] - the PostgreSQL implementation, pinned to a
//!   single backend session for the lifetime of the connection.
//! - [`LoggingConnection`] - a wrapper that records every statement with its
//!   parameters rendered in, for display alongside the migration result.
//! - [`DatabaseConfig`] - connection parameters and pool construction.
//!
//! A connection is one database session. That matters: the engine inspects
//! `pg_locks` for the current backend PID after applying a migration, which
//! only makes sense when the introspection query runs on the same session as
//! the migration's own statements.

pub mod config;
pub mod connection;
pub mod logging;
pub mod postgres;
pub mod value;

pub use config::DatabaseConfig;
pub use connection::DatabaseConnection;
pub use logging::{LoggingConnection, QueryLog};
pub use postgres::PostgresConnection;
pub use value::{Row, Value};
