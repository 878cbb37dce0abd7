//! Error types for the migcheck crates.
//!
//! All fallible APIs return [`MigcheckError`]. There are no retries anywhere
//! in the engine: every failure propagates to the caller and halts the run.

use thiserror::Error;

/// The primary error type for migcheck.
///
/// Variants are grouped by where the failure originates: the database
/// session, the consistency precondition, SQL classification, or
/// configuration.
#[derive(Error, Debug)]
pub enum MigcheckError {
    /// A database statement or transaction control command failed.
    ///
    /// On the transactional path the database has already rolled the
    /// migration back. On the non-transactional path the schema may be left
    /// partially migrated; there is no automatic cleanup.
    #[error("Database error: {0}")]
    Database(String),

    /// An applied migration's dependencies were not themselves applied.
    ///
    /// Raised by the consistency precondition before any migration is
    /// applied. Proceeding would corrupt the applied-migrations record.
    #[error("Inconsistent migration history: {0}")]
    InconsistentHistory(String),

    /// A migration failed while being applied.
    ///
    /// Fatal for the whole run; migrations applied before this one were
    /// already reported and stay applied.
    #[error("Failed to apply migration {app_label}.{name}: {reason}")]
    ApplyFailed {
        /// The app label of the failing migration.
        app_label: String,
        /// The name of the failing migration.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// Raw SQL could not be tokenized for transaction-discipline
    /// classification.
    ///
    /// The classifier treats this conservatively (non-transactional
    /// execution), so this variant surfaces only when callers ask for a
    /// strict classification.
    #[error("Cannot classify SQL: {0}")]
    SqlClassification(String),

    /// A connection or pool could not be constructed from the configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_database() {
        let err = MigcheckError::Database("connection reset".into());
        assert_eq!(err.to_string(), "Database error: connection reset");
    }

    #[test]
    fn test_display_apply_failed() {
        let err = MigcheckError::ApplyFailed {
            app_label: "shop".into(),
            name: "0004_orderline".into(),
            reason: "relation does not exist".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to apply migration shop.0004_orderline: relation does not exist"
        );
    }

    #[test]
    fn test_display_inconsistent_history() {
        let err = MigcheckError::InconsistentHistory("shop.0002 before shop.0001".into());
        assert!(err.to_string().starts_with("Inconsistent migration history"));
    }
}
