//! Severity levels and the canonical catalog of migration safety warnings.
//!
//! A [`Warning`] is a plain value: two warnings with identical fields are the
//! same warning. That equality is load-bearing. Checks must return the
//! canonical constants defined here rather than equivalent-but-distinct
//! instances, so that aggregation can deduplicate and tests can assert exact
//! expected sets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How serious a warning is.
///
/// Ordered from most to least severe: `Danger` flags a likely outage risk,
/// `Warning` a probable one, `Notice` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Likely outage risk.
    Danger,
    /// Probable risk.
    Warning,
    /// Informational.
    Notice,
}

impl Level {
    /// Returns the display glyph for this level.
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Danger => "\u{1f6a8}",
            Self::Warning => "\u{26a0}\u{fe0f}",
            Self::Notice => "\u{1f4a1}",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Danger => "danger",
            Self::Warning => "warning",
            Self::Notice => "notice",
        };
        write!(f, "{name}")
    }
}

/// A migration safety warning.
///
/// Compared structurally; the catalog below defines the canonical instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Warning {
    /// The severity level.
    pub level: Level,
    /// A short human-readable title.
    pub title: &'static str,
    /// A longer explanation of the risk and what to do instead.
    pub description: &'static str,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level.glyph(), self.title)
    }
}

// ── The catalog ─────────────────────────────────────────────────────

/// The migration holds more than one exclusive-tier lock at commit time.
///
/// This is derived from runtime lock introspection, not from a static check.
pub const MULTIPLE_EXCLUSIVE_LOCKS: Warning = Warning {
    level: Level::Danger,
    title: "Multiple exclusive locks",
    description: "This migration takes multiple exclusive locks. \
        That can be problematic if the tables are queried frequently.",
};

/// An index is being created without `CONCURRENTLY`.
pub const USE_ADD_INDEX_CONCURRENTLY: Warning = Warning {
    level: Level::Warning,
    title: "Consider creating the index concurrently",
    description: "This migration adds an index to a table. That will take a share \
        lock on the table, blocking any updates on the table until the \
        index has been created. If the table is large it can take a long \
        time to create the index. Please consider adding the index \
        concurrently instead.",
};

/// An index is being added alongside other operations.
pub const ADD_INDEX_IN_SEPARATE_MIGRATION: Warning = Warning {
    level: Level::Warning,
    title: "Add index in separate migration",
    description: "Adding an index should be done alone in a migration to \
        avoid keeping locks longer than strictly required.",
};

/// A field without a nullability escape hatch is being added.
pub const ADDING_NON_NULLABLE_FIELD: Warning = Warning {
    level: Level::Warning,
    title: "Adding non-nullable field",
    description: "This migration is adding a field that is not nullable. \
        That will cause problems if the table is written to before \
        the new code has been rolled out.",
};

/// One atomic migration alters several tables.
pub const ALTERING_MULTIPLE_MODELS: Warning = Warning {
    level: Level::Danger,
    title: "Altering multiple models",
    description: "Consider splitting this migration into separate migrations. \
        This migration is making changes to multiple tables. That can be \
        problematic because exclusive locks are required when altering \
        a table. When multiple exclusive locks are required the chances \
        of deadlocks increase.",
};

/// A data-mutation step runs inside a transaction.
pub const ATOMIC_DATA_MIGRATION: Warning = Warning {
    level: Level::Warning,
    title: "Atomic data migration",
    description: "It looks like you are migrating data. Please note that this \
        sort of data migration should not be run inside a transaction \
        unless it is pretty fast. Have you considered marking the \
        migration as not atomic?",
};

/// Schema changes and data changes are mixed in one migration.
pub const SCHEMA_AND_DATA_CHANGES: Warning = Warning {
    level: Level::Notice,
    title: "Schema and data changes",
    description: "It looks like you are doing both schema and data changes in the \
        same migration. That should be avoided unless strictly required.",
};

/// A model is being renamed.
pub const RENAMING_MODEL: Warning = Warning {
    level: Level::Danger,
    title: "Renaming a model is not safe",
    description: "This migration is renaming a model. That is not safe if the model \
        is in use. Please add a new model, copy data, and remove the old \
        model instead.",
};

/// A field is being renamed.
pub const RENAMING_FIELD: Warning = Warning {
    level: Level::Danger,
    title: "Renaming a field is not safe",
    description: "This migration is renaming a field. That is not safe if the table \
        is in use. Please add a new field, copy data, and remove the old \
        field instead.",
};

/// A field is being dropped.
pub const REMOVING_FIELD: Warning = Warning {
    level: Level::Notice,
    title: "Removing a field",
    description: "This migration is removing a field. This is only safe if you \
        have already removed all references to the field, including the \
        field definition on the model.",
};

/// The new field's type adds an implicit database CHECK constraint.
pub const ADDING_FIELD_WITH_CHECK: Warning = Warning {
    level: Level::Warning,
    title: "Adding field with check constraint",
    description: "This migration adds a field whose type implies a database-level \
        check constraint, for example an unsigned integer type. Adding the \
        constraint requires validating all existing rows, which takes an \
        exclusive lock for the duration of the scan.",
};

/// A constraint is being added to an existing table.
pub const ADDING_CONSTRAINT: Warning = Warning {
    level: Level::Warning,
    title: "Adding constraint",
    description: "This migration adds a constraint to an existing table. Unless the \
        constraint is created as NOT VALID and validated separately, the \
        table is exclusively locked while every existing row is checked.",
};

/// A constraint validation shares a migration with other operations.
pub const VALIDATE_CONSTRAINT_SEPARATELY: Warning = Warning {
    level: Level::Warning,
    title: "Validate constraint in separate migration",
    description: "Validating a constraint scans the whole table. Doing that in the \
        same migration as other schema changes keeps their locks held for \
        the duration of the scan. Move the validation to its own \
        migration.",
};

/// An existing field is being altered to a non-nullable definition.
pub const ALTER_FIELD: Warning = Warning {
    level: Level::Warning,
    title: "Altering field",
    description: "This migration alters a field to a definition that is not \
        nullable. Depending on the change this can rewrite the table or \
        validate every row under an exclusive lock.",
};

#[cfg(test)]
mod tests {
    use super::*;

    // ── Level tests ─────────────────────────────────────────────────

    #[test]
    fn test_level_ordering() {
        assert!(Level::Danger < Level::Warning);
        assert!(Level::Warning < Level::Notice);
    }

    #[test]
    fn test_level_glyphs() {
        assert_eq!(Level::Danger.glyph(), "🚨");
        assert_eq!(Level::Warning.glyph(), "⚠️");
        assert_eq!(Level::Notice.glyph(), "💡");
    }

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Danger.to_string(), "danger");
        assert_eq!(Level::Notice.to_string(), "notice");
    }

    // ── Warning tests ───────────────────────────────────────────────

    #[test]
    fn test_warning_value_equality() {
        let copy = Warning {
            level: Level::Danger,
            title: "Renaming a field is not safe",
            description: RENAMING_FIELD.description,
        };
        assert_eq!(copy, RENAMING_FIELD);
    }

    #[test]
    fn test_warning_display_uses_glyph() {
        assert_eq!(
            RENAMING_MODEL.to_string(),
            "🚨 Renaming a model is not safe"
        );
        assert_eq!(REMOVING_FIELD.to_string(), "💡 Removing a field");
    }

    #[test]
    fn test_catalog_titles_are_distinct() {
        let catalog = [
            MULTIPLE_EXCLUSIVE_LOCKS,
            USE_ADD_INDEX_CONCURRENTLY,
            ADD_INDEX_IN_SEPARATE_MIGRATION,
            ADDING_NON_NULLABLE_FIELD,
            ALTERING_MULTIPLE_MODELS,
            ATOMIC_DATA_MIGRATION,
            SCHEMA_AND_DATA_CHANGES,
            RENAMING_MODEL,
            RENAMING_FIELD,
            REMOVING_FIELD,
            ADDING_FIELD_WITH_CHECK,
            ADDING_CONSTRAINT,
            VALIDATE_CONSTRAINT_SEPARATELY,
            ALTER_FIELD,
        ];
        let mut titles: Vec<_> = catalog.iter().map(|w| w.title).collect();
        titles.sort_unstable();
        titles.dedup();
        assert_eq!(titles.len(), catalog.len());
    }

    #[test]
    fn test_warning_serde_round_trip() {
        let json = serde_json::to_string(&SCHEMA_AND_DATA_CHANGES).unwrap();
        assert!(json.contains("\"level\":\"notice\""));
        assert!(json.contains("Schema and data changes"));
    }
}
