//! The PostgreSQL lock-mode vocabulary and its severity classification.
//!
//! Lock modes form a fixed scale from read-compatible to fully exclusive.
//! The classifier maps each mode to a severity glyph and a prose explanation
//! for reporting, and exposes the exclusive tier used by the
//! multiple-exclusive-locks aggregation. Modes not in the vocabulary are
//! preserved as [`LockMode::Other`] and classified generically rather than
//! failing.

use std::fmt;

use serde::Serialize;

/// A table-level lock mode, ordered from least to most restrictive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LockMode {
    /// Taken by plain reads; conflicts only with `AccessExclusive`.
    AccessShare,
    /// Taken by `SELECT ... FOR UPDATE/SHARE`.
    RowShare,
    /// Taken by writes (`INSERT`/`UPDATE`/`DELETE`).
    RowExclusive,
    /// Taken by `VACUUM`, concurrent index creation, and some `ALTER TABLE`
    /// forms; self-conflicting.
    ShareUpdateExclusive,
    /// Taken by non-concurrent `CREATE INDEX`; blocks writes.
    Share,
    /// Blocks writes and other share-tier locks.
    ShareRowExclusive,
    /// Blocks everything except plain reads.
    Exclusive,
    /// Blocks all access to the table, including reads.
    AccessExclusive,
    /// A mode outside the fixed vocabulary.
    Other(String),
}

impl LockMode {
    /// Parses a mode name as reported by `pg_locks.mode`.
    pub fn parse(mode: &str) -> Self {
        match mode {
            "AccessShareLock" => Self::AccessShare,
            "RowShareLock" => Self::RowShare,
            "RowExclusiveLock" => Self::RowExclusive,
            "ShareUpdateExclusiveLock" => Self::ShareUpdateExclusive,
            "ShareLock" => Self::Share,
            "ShareRowExclusiveLock" => Self::ShareRowExclusive,
            "ExclusiveLock" => Self::Exclusive,
            "AccessExclusiveLock" => Self::AccessExclusive,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the mode name as reported by `pg_locks.mode`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AccessShare => "AccessShareLock",
            Self::RowShare => "RowShareLock",
            Self::RowExclusive => "RowExclusiveLock",
            Self::ShareUpdateExclusive => "ShareUpdateExclusiveLock",
            Self::Share => "ShareLock",
            Self::ShareRowExclusive => "ShareRowExclusiveLock",
            Self::Exclusive => "ExclusiveLock",
            Self::AccessExclusive => "AccessExclusiveLock",
            Self::Other(name) => name,
        }
    }

    /// Returns whether this mode is in the exclusive tier.
    ///
    /// Holding more than one distinct exclusive-tier lock in a single
    /// migration raises the multiple-exclusive-locks warning.
    pub const fn is_exclusive_tier(&self) -> bool {
        matches!(self, Self::Exclusive | Self::AccessExclusive)
    }

    /// Returns the severity glyph used when reporting this lock.
    pub const fn severity_glyph(&self) -> &'static str {
        match self {
            Self::Share | Self::ShareRowExclusive => "\u{26a0}\u{fe0f}",
            Self::Exclusive | Self::AccessExclusive => "\u{1f6a8}",
            _ => "\u{1f511}",
        }
    }

    /// Returns a prose explanation of what holding this lock means.
    ///
    /// Unknown modes get a generic pointer at the database documentation.
    pub const fn explanation(&self) -> &'static str {
        match self {
            Self::AccessShare => {
                "Taken by plain reads. It only conflicts with operations that \
                 exclude all access to the table, so holding it is harmless."
            }
            Self::ShareUpdateExclusive => {
                "This lock allows concurrent reads and writes but conflicts \
                 with schema changes and with itself, so only one such \
                 operation can run against the table at a time."
            }
            Self::Share => {
                "This is a lock type that will block any concurrent updates to the \
                 table. That also means that it has to wait for all current updates \
                 to finish before it can be applied. If this takes long other \
                 updates are blocked in the mean time."
            }
            Self::AccessExclusive => {
                "An access exclusive lock will block any other queries to the \
                 table, including reads. This is the strictest level of locking in \
                 Postgres. Because this lock conflicts with any other lock type, \
                 it will have to wait until all other queries against the table have \
                 completed before being granted."
            }
            _ => "Unknown lock type, please check the Postgres documentation",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lock observed on the connection after applying a migration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LockRecord {
    /// The locked table name.
    pub table: String,
    /// The held lock mode.
    pub mode: LockMode,
}

impl LockRecord {
    /// Creates a lock record from the raw `pg_locks` row values.
    pub fn new(table: impl Into<String>, mode: &str) -> Self {
        Self {
            table: table.into(),
            mode: LockMode::parse(mode),
        }
    }
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.mode, self.table)
    }
}
