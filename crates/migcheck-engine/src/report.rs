//! The per-migration output contract and report sinks.
//!
//! The orchestrator is agnostic to what happens with results: it hands each
//! `(migration, result)` pair to every configured [`ReportSink`], in plan
//! order. [`ConsoleReport`] is the bundled sink; richer renderings (markdown,
//! pull-request comments) live with their own transports.

use std::io::Write;

use migcheck_core::{LockRecord, Warning};
use serde::Serialize;

use crate::migration::Migration;

/// Everything observed while applying one migration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Every SQL statement the migration issued, parameters rendered in,
    /// in execution order. For display, not re-execution.
    pub queries: Vec<String>,
    /// Locks held by the session at commit time.
    ///
    /// `None` means locks were not checked (non-transactional execution or
    /// static-only mode); `Some` with an empty list means checked and none
    /// held.
    pub locks: Option<Vec<LockRecord>>,
    /// Static warnings plus any runtime-derived ones.
    pub warnings: Vec<Warning>,
}

impl ExecutionResult {
    /// A result for a migration that was analyzed but not applied.
    pub fn static_only(warnings: Vec<Warning>) -> Self {
        Self {
            queries: Vec::new(),
            locks: None,
            warnings,
        }
    }
}

/// A consumer of migration results.
///
/// Calls arrive in a fixed order: either `no_migrations` alone, or `begin`,
/// then `migration_result` once per migration in plan order, then `done`.
pub trait ReportSink: Send {
    /// The plan was empty; nothing will be applied.
    fn no_migrations(&mut self);

    /// The run is starting with `count` pending migrations.
    fn begin(&mut self, count: usize);

    /// One migration was analyzed (and possibly applied).
    fn migration_result(&mut self, migration: &Migration, result: &ExecutionResult);

    /// The run finished.
    fn done(&mut self);
}

fn color(value: &str, code: &str) -> String {
    format!("\x1b[{code}m{value}\x1b[0m")
}

fn cyan(value: &str) -> String {
    color(value, "36")
}

fn red(value: &str) -> String {
    color(value, "91")
}

fn bold(value: &str) -> String {
    color(value, "1")
}

/// Wraps text at `width` columns, prefixing every line with `indent`.
fn fill(text: &str, indent: &str, width: usize) -> String {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(format!("{indent}{current}"));
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(format!("{indent}{current}"));
    }
    lines.join("\n")
}

/// Prints migration results to a terminal.
pub struct ConsoleReport<W: Write + Send> {
    out: W,
}

impl ConsoleReport<std::io::Stdout> {
    /// Creates a sink writing to stdout.
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write + Send> ConsoleReport<W> {
    /// Creates a sink writing to the given writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ReportSink for ConsoleReport<W> {
    fn no_migrations(&mut self) {
        let _ = writeln!(self.out, "No migrations to apply");
    }

    fn begin(&mut self, count: usize) {
        let _ = writeln!(self.out, "\u{1f50d} Applying and checking {count} migrations");
    }

    fn migration_result(&mut self, migration: &Migration, result: &ExecutionResult) {
        let heading = format!("{}.{}", migration.app_label, migration.name);
        let _ = writeln!(self.out, "\n{}", cyan(&heading));
        for operation in &migration.operations {
            let _ = writeln!(self.out, "    {}", operation.describe());
        }

        for warning in &result.warnings {
            let _ = writeln!(
                self.out,
                "\n    {} {}",
                warning.level.glyph(),
                bold(warning.title)
            );
            let _ = writeln!(self.out, "{}", fill(warning.description, "    ", 72));
        }

        if let Some(locks) = &result.locks {
            if !locks.is_empty() {
                let _ = writeln!(self.out);
            }
            for lock in locks {
                let _ = writeln!(
                    self.out,
                    "    \u{1f512} {} on {}",
                    red(lock.mode.as_str()),
                    bold(&lock.table)
                );
            }
        }
    }

    fn done(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use migcheck_core::warnings::RENAMING_FIELD;
    use migcheck_core::LockRecord;

    fn sample_migration() -> Migration {
        Migration::new("shop", "0002_rename").operation(crate::migration::Operation::RenameField {
            model_name: "order".into(),
            old_name: "total".into(),
            new_name: "amount".into(),
        })
    }

    #[test]
    fn test_fill_wraps_long_text() {
        let text = "one two three four five six seven eight nine ten";
        let wrapped = fill(text, "  ", 20);
        for line in wrapped.lines() {
            assert!(line.len() <= 23);
            assert!(line.starts_with("  "));
        }
        let unwrapped: Vec<&str> = wrapped.split_whitespace().collect();
        assert_eq!(unwrapped.len(), 10);
    }

    #[test]
    fn test_console_report_renders_result() {
        let mut sink = ConsoleReport::new(Vec::new());
        let result = ExecutionResult {
            queries: vec!["ALTER TABLE shop_order RENAME COLUMN total TO amount".into()],
            locks: Some(vec![LockRecord::new("shop_order", "AccessExclusiveLock")]),
            warnings: vec![RENAMING_FIELD],
        };

        sink.begin(1);
        sink.migration_result(&sample_migration(), &result);
        sink.done();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("shop.0002_rename"));
        assert!(output.contains("Renaming a field is not safe"));
        assert!(output.contains("AccessExclusiveLock"));
        assert!(output.contains("shop_order"));
    }

    #[test]
    fn test_console_report_no_migrations() {
        let mut sink = ConsoleReport::new(Vec::new());
        sink.no_migrations();
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output, "No migrations to apply\n");
    }

    #[test]
    fn test_execution_result_static_only() {
        let result = ExecutionResult::static_only(vec![RENAMING_FIELD]);
        assert!(result.queries.is_empty());
        assert!(result.locks.is_none());
    }

    #[test]
    fn test_execution_result_serializes() {
        let result = ExecutionResult {
            queries: vec!["select 1".into()],
            locks: Some(Vec::new()),
            warnings: Vec::new(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"locks\":[]"));
    }
}
