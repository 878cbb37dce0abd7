//! The migration orchestrator.
//!
//! [`MigrationRunner`] drives a run end to end: it asks the [`Planner`] for
//! the pending plan and the current schema snapshot, runs the static check
//! registry over each migration, and then applies it while capturing every
//! SQL statement issued and the locks held at commit time.
//!
//! Transactional migrations are applied inside a single transaction, with
//! the lock introspection query running right before commit so the query
//! sees exactly the locks the migration accumulated. Migrations classified
//! as non-transactional are applied statement by statement with no
//! transaction open; lock evidence is unavailable for those, and a failure
//! can leave the schema partially migrated.
//!
//! The session matters: lock introspection filters on `pg_backend_pid()`,
//! so the runner must be handed a connection pinned to one backend session
//! for its whole lifetime.

use std::collections::HashSet;

use migcheck_core::warnings::MULTIPLE_EXCLUSIVE_LOCKS;
use migcheck_core::{LockRecord, MigcheckError};
use migcheck_db::{DatabaseConnection, LoggingConnection, Value};
use tracing::{debug, info, warn};

use crate::checks::run_checks;
use crate::classify::requires_non_atomic;
use crate::migration::{Migration, Operation};
use crate::report::{ExecutionResult, ReportSink};
use crate::state::ProjectState;

/// Locks held by this session on user tables, via `pg_locks`.
///
/// System catalogs are excluded; a migration always touches some of them
/// and their locks say nothing about contention on user data.
const LOCK_QUERY: &str = "\
SELECT t.relname, l.mode \
FROM pg_locks l \
JOIN pg_stat_all_tables t ON l.relation = t.relid \
WHERE t.relname NOT LIKE 'pg\\_%' AND l.pid = pg_backend_pid() \
ORDER BY l.mode, l.relation ASC";

/// The source of the migration plan and schema snapshot.
///
/// Plan construction (dependency ordering, applied-set diffing) lives
/// outside the engine; the engine consumes the ordered result.
#[async_trait::async_trait]
pub trait Planner: Send + Sync {
    /// Fails when the recorded migration history contradicts the plan,
    /// for example when a migration is recorded as applied before one of
    /// its dependencies.
    async fn check_consistent_history(
        &self,
        conn: &dyn DatabaseConnection,
    ) -> Result<(), MigcheckError>;

    /// Returns the pending migrations in dependency order.
    async fn migration_plan(
        &self,
        conn: &dyn DatabaseConnection,
    ) -> Result<Vec<Migration>, MigcheckError>;

    /// Returns the schema snapshot reflecting every applied migration.
    async fn project_state(
        &self,
        conn: &dyn DatabaseConnection,
    ) -> Result<ProjectState, MigcheckError>;
}

/// Translates one operation into SQL against a connection.
///
/// The applier receives the snapshot as it stood before the operation, so
/// renames and removals can resolve the old names.
#[async_trait::async_trait]
pub trait SchemaApplier: Send + Sync {
    async fn apply(
        &self,
        app_label: &str,
        operation: &Operation,
        state: &ProjectState,
        conn: &dyn DatabaseConnection,
    ) -> Result<(), MigcheckError>;
}

/// Records which migrations have been applied.
///
/// The runner calls `record_applied` on the raw connection, not the logging
/// wrapper, so bookkeeping writes never appear in a migration's captured
/// SQL.
#[async_trait::async_trait]
pub trait AppliedMigrationsRecorder: Send + Sync {
    /// Ensures the record store exists. Called once per run, before any
    /// migration is applied.
    async fn prepare(&self, _conn: &dyn DatabaseConnection) -> Result<(), MigcheckError> {
        Ok(())
    }

    /// Marks one migration as applied.
    async fn record_applied(
        &self,
        conn: &dyn DatabaseConnection,
        app_label: &str,
        name: &str,
    ) -> Result<(), MigcheckError>;
}

/// Keeps the applied-migrations record in a table in the target database.
#[derive(Debug, Default)]
pub struct SqlRecorder;

impl SqlRecorder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl AppliedMigrationsRecorder for SqlRecorder {
    async fn prepare(&self, conn: &dyn DatabaseConnection) -> Result<(), MigcheckError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS migcheck_migrations (\
             id BIGSERIAL PRIMARY KEY, \
             app VARCHAR(255) NOT NULL, \
             name VARCHAR(255) NOT NULL, \
             applied TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            &[],
        )
        .await?;
        Ok(())
    }

    async fn record_applied(
        &self,
        conn: &dyn DatabaseConnection,
        app_label: &str,
        name: &str,
    ) -> Result<(), MigcheckError> {
        conn.execute(
            "INSERT INTO migcheck_migrations (app, name) VALUES ($1, $2)",
            &[
                Value::Text(app_label.to_string()),
                Value::Text(name.to_string()),
            ],
        )
        .await?;
        Ok(())
    }
}

/// Applies and checks a plan of migrations over one database session.
pub struct MigrationRunner<'a> {
    conn: &'a dyn DatabaseConnection,
    applier: Box<dyn SchemaApplier>,
    recorder: Box<dyn AppliedMigrationsRecorder>,
    sinks: Vec<Box<dyn ReportSink>>,
    apply_migrations: bool,
}

impl<'a> MigrationRunner<'a> {
    /// Creates a runner over the given session with the given applier.
    ///
    /// The connection must stay pinned to a single backend session; lock
    /// introspection is scoped to `pg_backend_pid()`.
    pub fn new(conn: &'a dyn DatabaseConnection, applier: Box<dyn SchemaApplier>) -> Self {
        Self {
            conn,
            applier,
            recorder: Box::new(SqlRecorder::new()),
            sinks: Vec::new(),
            apply_migrations: true,
        }
    }

    /// Replaces the applied-migrations recorder.
    #[must_use]
    pub fn recorder(mut self, recorder: Box<dyn AppliedMigrationsRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Adds a report sink. Sinks are notified in the order added.
    #[must_use]
    pub fn sink(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Runs static checks only: nothing is applied, no SQL is captured and
    /// no locks are introspected.
    #[must_use]
    pub fn check_only(mut self) -> Self {
        self.apply_migrations = false;
        self
    }

    /// Runs the full plan produced by the planner.
    ///
    /// Stops at the first failure. For a transactional migration the
    /// failed migration is rolled back; results already reported stand.
    pub async fn run(&mut self, planner: &dyn Planner) -> Result<(), MigcheckError> {
        planner.check_consistent_history(self.conn).await?;
        let plan = planner.migration_plan(self.conn).await?;
        if plan.is_empty() {
            for sink in &mut self.sinks {
                sink.no_migrations();
            }
            return Ok(());
        }

        info!(count = plan.len(), "starting migration run");
        for sink in &mut self.sinks {
            sink.begin(plan.len());
        }

        let mut state = planner.project_state(self.conn).await?;
        if self.apply_migrations {
            self.recorder.prepare(self.conn).await?;
        }

        for migration in &plan {
            let result = self.run_one(migration, &mut state).await?;
            for sink in &mut self.sinks {
                sink.migration_result(migration, &result);
            }
        }

        for sink in &mut self.sinks {
            sink.done();
        }
        Ok(())
    }

    async fn run_one(
        &self,
        migration: &Migration,
        state: &mut ProjectState,
    ) -> Result<ExecutionResult, MigcheckError> {
        let mut warnings = run_checks(migration, state);

        if !self.apply_migrations {
            migration.mutate_state(state);
            return Ok(ExecutionResult::static_only(warnings));
        }

        let non_atomic = !migration.atomic || requires_non_atomic(&migration.operations);
        debug!(
            app = %migration.app_label,
            name = %migration.name,
            non_atomic,
            "applying migration"
        );

        let (queries, locks) = if non_atomic {
            self.apply_non_atomic(migration, state).await?
        } else {
            self.apply_atomic(migration, state).await?
        };

        if let Some(locks) = &locks {
            if count_exclusive(locks) > 1 {
                warnings.push(MULTIPLE_EXCLUSIVE_LOCKS);
            }
        }

        Ok(ExecutionResult {
            queries,
            locks,
            warnings,
        })
    }

    /// Applies one migration inside a transaction, introspecting locks and
    /// recording the migration as applied before commit.
    async fn apply_atomic(
        &self,
        migration: &Migration,
        state: &mut ProjectState,
    ) -> Result<(Vec<String>, Option<Vec<LockRecord>>), MigcheckError> {
        self.conn.begin().await?;
        let logged = LoggingConnection::new(self.conn);

        let outcome = async {
            self.apply_operations(migration, state, &logged).await?;
            let locks = self.held_locks().await?;
            self.recorder
                .record_applied(self.conn, &migration.app_label, &migration.name)
                .await?;
            Ok::<_, MigcheckError>(locks)
        }
        .await;

        match outcome {
            Ok(locks) => {
                self.conn.commit().await?;
                Ok((logged.log().statements(), Some(locks)))
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.rollback().await {
                    warn!(%rollback_err, "rollback failed after apply error");
                }
                Err(MigcheckError::ApplyFailed {
                    app_label: migration.app_label.clone(),
                    name: migration.name.clone(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Applies one migration with no transaction open. No lock evidence is
    /// available; a failure can leave the schema partially migrated.
    async fn apply_non_atomic(
        &self,
        migration: &Migration,
        state: &mut ProjectState,
    ) -> Result<(Vec<String>, Option<Vec<LockRecord>>), MigcheckError> {
        let logged = LoggingConnection::new(self.conn);
        if let Err(err) = self.apply_operations(migration, state, &logged).await {
            return Err(MigcheckError::ApplyFailed {
                app_label: migration.app_label.clone(),
                name: migration.name.clone(),
                reason: format!(
                    "{err} (applied outside a transaction; the schema may be partially migrated)"
                ),
            });
        }
        self.recorder
            .record_applied(self.conn, &migration.app_label, &migration.name)
            .await?;
        Ok((logged.log().statements(), None))
    }

    async fn apply_operations(
        &self,
        migration: &Migration,
        state: &mut ProjectState,
        conn: &dyn DatabaseConnection,
    ) -> Result<(), MigcheckError> {
        for operation in &migration.operations {
            self.applier
                .apply(&migration.app_label, operation, state, conn)
                .await?;
            operation.state_forwards(&migration.app_label, state);
        }
        Ok(())
    }

    async fn held_locks(&self) -> Result<Vec<LockRecord>, MigcheckError> {
        let rows = self.conn.query(LOCK_QUERY, &[]).await?;
        let mut locks = Vec::with_capacity(rows.len());
        for row in &rows {
            locks.push(LockRecord::new(
                row.get_text("relname")?,
                row.get_text("mode")?,
            ));
        }
        Ok(locks)
    }
}

/// Counts distinct `(table, mode)` pairs in the exclusive tier. A table can
/// appear in `pg_locks` once per lockable object, so raw row counts
/// overstate contention.
fn count_exclusive(locks: &[LockRecord]) -> usize {
    locks
        .iter()
        .filter(|lock| lock.mode.is_exclusive_tier())
        .map(|lock| (lock.table.as_str(), &lock.mode))
        .collect::<HashSet<_>>()
        .len()
}
