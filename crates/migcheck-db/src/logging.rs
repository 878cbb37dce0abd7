//! Query interception for migration runs.
//!
//! [`LoggingConnection`] wraps another [`DatabaseConnection`] and records
//! every statement that passes through it, with bound parameters rendered
//! into the SQL text. The rendered statements are what operators see next to
//! a migration result; they are for display, not for re-execution.

use std::sync::{Arc, Mutex};

use migcheck_core::MigcheckError;

use crate::connection::DatabaseConnection;
use crate::value::{Row, Value};

/// An ordered, shareable log of rendered SQL statements.
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl QueryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rendered statement.
    pub fn record(&self, sql: String) {
        self.entries.lock().expect("query log poisoned").push(sql);
    }

    /// Returns a snapshot of the statements recorded so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.entries.lock().expect("query log poisoned").clone()
    }

    /// Returns the number of recorded statements.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("query log poisoned").len()
    }

    /// Returns whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders `$n` placeholders into the SQL text as display literals.
///
/// Placeholders are substituted from the highest index down so that `$1`
/// never clobbers the prefix of `$10`.
pub fn render_sql(sql: &str, params: &[Value]) -> String {
    let mut rendered = sql.to_string();
    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        rendered = rendered.replace(&placeholder, &param.to_sql_literal());
    }
    rendered
}

/// A connection wrapper that records every statement it forwards.
///
/// Transaction control (`begin`/`commit`/`rollback`) is forwarded without
/// being logged; the log holds only the statements a migration itself
/// issues.
pub struct LoggingConnection<'a> {
    inner: &'a dyn DatabaseConnection,
    log: QueryLog,
}

impl<'a> LoggingConnection<'a> {
    /// Wraps a connection with a fresh log.
    pub fn new(inner: &'a dyn DatabaseConnection) -> Self {
        Self {
            inner,
            log: QueryLog::new(),
        }
    }

    /// Returns a handle to the query log.
    pub fn log(&self) -> QueryLog {
        self.log.clone()
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for LoggingConnection<'_> {
    fn vendor(&self) -> &str {
        self.inner.vendor()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, MigcheckError> {
        self.log.record(render_sql(sql, params));
        self.inner.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, MigcheckError> {
        self.log.record(render_sql(sql, params));
        self.inner.query(sql, params).await
    }

    async fn begin(&self) -> Result<(), MigcheckError> {
        self.inner.begin().await
    }

    async fn commit(&self) -> Result<(), MigcheckError> {
        self.inner.commit().await
    }

    async fn rollback(&self) -> Result<(), MigcheckError> {
        self.inner.rollback().await
    }
}
