//! PostgreSQL session over `tokio-postgres` and `deadpool-postgres`.

use migcheck_core::MigcheckError;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::connection::DatabaseConnection;
use crate::value::{Row, Value};

/// A PostgreSQL session.
///
/// Holds one client checked out of the pool for its whole lifetime instead
/// of checking out per statement. Lock introspection filters on
/// `pg_backend_pid()`, so every statement of a run has to go through the same
/// backend process.
pub struct PostgresConnection {
    client: deadpool_postgres::Object,
}

impl PostgresConnection {
    /// Checks a dedicated session out of the pool.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, MigcheckError> {
        let pool = config.create_pool()?;
        let client = pool
            .get()
            .await
            .map_err(|e| MigcheckError::Configuration(format!("Failed to get connection: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an already checked-out pool client.
    pub fn from_client(client: deadpool_postgres::Object) -> Self {
        Self { client }
    }

    fn to_pg_params(params: &[Value]) -> Vec<Box<dyn tokio_postgres::types::ToSql + Sync + Send>> {
        params
            .iter()
            .map(|v| -> Box<dyn tokio_postgres::types::ToSql + Sync + Send> {
                match v {
                    Value::Null => Box::new(Option::<String>::None),
                    Value::Bool(b) => Box::new(*b),
                    Value::Int(i) => Box::new(*i),
                    Value::Float(f) => Box::new(*f),
                    Value::Text(s) => Box::new(s.clone()),
                }
            })
            .collect()
    }

    fn convert_row(pg_row: &tokio_postgres::Row) -> Row {
        use tokio_postgres::types::Type;

        let columns: Vec<String> = pg_row
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let values: Vec<Value> = pg_row
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| match *col.type_() {
                Type::BOOL => pg_row
                    .try_get::<_, Option<bool>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Bool),
                Type::INT2 => pg_row
                    .try_get::<_, Option<i16>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                Type::INT4 => pg_row
                    .try_get::<_, Option<i32>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                Type::INT8 => pg_row
                    .try_get::<_, Option<i64>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Int),
                Type::FLOAT4 => pg_row
                    .try_get::<_, Option<f32>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Float(f64::from(v))),
                Type::FLOAT8 => pg_row
                    .try_get::<_, Option<f64>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Float),
                _ => pg_row
                    .try_get::<_, Option<String>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Text),
            })
            .collect();

        Row::new(columns, values)
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for PostgresConnection {
    fn vendor(&self) -> &str {
        "postgresql"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, MigcheckError> {
        debug!(sql, "executing statement");
        let boxed = Self::to_pg_params(params);
        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = boxed
            .iter()
            .map(|b| b.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();
        self.client
            .execute(sql, &refs)
            .await
            .map_err(|e| MigcheckError::Database(e.to_string()))
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, MigcheckError> {
        debug!(sql, "running query");
        let boxed = Self::to_pg_params(params);
        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = boxed
            .iter()
            .map(|b| b.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();
        let rows = self
            .client
            .query(sql, &refs)
            .await
            .map_err(|e| MigcheckError::Database(e.to_string()))?;
        Ok(rows.iter().map(Self::convert_row).collect())
    }

    async fn begin(&self) -> Result<(), MigcheckError> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| MigcheckError::Database(format!("BEGIN failed: {e}")))
    }

    async fn commit(&self) -> Result<(), MigcheckError> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| MigcheckError::Database(format!("COMMIT failed: {e}")))
    }

    async fn rollback(&self) -> Result<(), MigcheckError> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| MigcheckError::Database(format!("ROLLBACK failed: {e}")))
    }
}
