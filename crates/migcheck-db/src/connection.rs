//! The database session trait the engine executes against.

use migcheck_core::MigcheckError;

use crate::value::{Row, Value};

/// One database session.
///
/// All of the engine's database work goes through this trait: migration
/// statements, transaction control, lock introspection, and the
/// applied-migrations record. Implementations must pin a single backend
/// session for the lifetime of the value, because the lock introspection
/// query filters on the current backend PID and would otherwise observe a
/// different session's locks.
///
/// Methods are async because database I/O is; execution is still strictly
/// sequential — the engine never issues concurrent statements on one
/// connection.
#[async_trait::async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Returns the vendor name (e.g., "postgresql").
    fn vendor(&self) -> &str;

    /// Executes a statement that does not return rows.
    ///
    /// Returns the number of rows affected.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, MigcheckError>;

    /// Executes a query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, MigcheckError>;

    /// Opens a transaction on this session.
    async fn begin(&self) -> Result<(), MigcheckError>;

    /// Commits the open transaction.
    async fn commit(&self) -> Result<(), MigcheckError>;

    /// Rolls back the open transaction.
    async fn rollback(&self) -> Result<(), MigcheckError>;
}
