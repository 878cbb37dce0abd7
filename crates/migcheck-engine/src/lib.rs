//! # migcheck-engine
//!
//! The migration safety engine. Given an ordered plan of pending migrations
//! and a schema-state snapshot (both produced by an external planner), the
//! engine:
//!
//! - runs a fixed registry of static risk checks over each migration
//!   ([`checks`]),
//! - decides whether the migration must run outside a transaction by
//!   lexically scanning any raw SQL it carries ([`classify`]),
//! - applies the migration while intercepting every SQL statement it issues,
//!   then introspects the locks actually held on the session
//!   ([`executor`]),
//! - merges the runtime lock evidence with the static warnings and hands the
//!   result to the configured report sinks ([`report`]).
//!
//! ## Module Overview
//!
//! - [`migration`] - `Migration` and the closed `Operation` taxonomy
//! - [`state`] - `ProjectState`, the mutable schema snapshot
//! - [`checks`] - the ordered registry of static risk checks
//! - [`classify`] - the transaction-discipline classifier
//! - [`executor`] - `MigrationRunner` and the collaborator traits
//! - [`report`] - `ExecutionResult`, `ReportSink`, console reporting
//!
//! ## Failure model
//!
//! There are no retries. A consistency failure aborts before anything is
//! applied; an apply failure aborts the run, rolling back the current
//! migration when a transaction is open. Non-transactional execution can
//! leave the schema partially migrated on failure — that is inherent to
//! running DDL outside a transaction and is surfaced in the error rather
//! than repaired.

// Clippy overrides appropriate for a migration analysis crate.
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]

pub mod checks;
pub mod classify;
pub mod executor;
pub mod migration;
pub mod report;
pub mod state;

pub use checks::run_checks;
pub use classify::requires_non_atomic;
pub use executor::{
    AppliedMigrationsRecorder, MigrationRunner, Planner, SchemaApplier, SqlRecorder,
};
pub use migration::{
    ConstraintDef, ConstraintKind, FieldDef, FieldType, IndexDef, Migration, Operation, RawSql,
    SqlStatement,
};
pub use report::{ConsoleReport, ExecutionResult, ReportSink};
pub use state::{ModelState, ProjectState};
