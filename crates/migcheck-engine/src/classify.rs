//! The transaction-discipline classifier.
//!
//! Some operations cannot run inside a database transaction: concurrent
//! index builds, and raw SQL that performs one. [`requires_non_atomic`]
//! decides, for a migration's operation list, whether the migration must be
//! applied outside a transaction.
//!
//! Raw SQL is classified lexically: the statement is tokenized (PostgreSQL
//! dialect) and matched on keyword tokens, so `CONCURRENTLY` inside a string
//! literal or a quoted identifier never triggers a match. SQL that cannot be
//! tokenized is classified as non-transactional — the conservative side:
//! running something transaction-safe outside a transaction loses lock
//! reporting, while running `CREATE INDEX CONCURRENTLY` inside one fails
//! outright.

use migcheck_core::MigcheckError;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::warn;

use crate::migration::Operation;

/// The two token patterns that force non-transactional execution: the DDL
/// verb, the INDEX keyword, and CONCURRENTLY, all present in one statement
/// in any order.
const PATTERNS: [[Keyword; 3]; 2] = [
    [Keyword::CREATE, Keyword::INDEX, Keyword::CONCURRENTLY],
    [Keyword::DROP, Keyword::INDEX, Keyword::CONCURRENTLY],
];

/// Returns whether any operation in the list must run outside a transaction.
///
/// Recurses into the database side of `SeparateDatabaseAndState`. Raw SQL
/// that fails to tokenize is treated as requiring non-transactional
/// execution.
pub fn requires_non_atomic(operations: &[Operation]) -> bool {
    operations.iter().any(|op| match op {
        Operation::AddIndexConcurrently { .. } | Operation::RemoveIndexConcurrently { .. } => true,
        Operation::SeparateDatabaseAndState {
            database_operations,
            ..
        } => requires_non_atomic(database_operations),
        Operation::RunSql { sql, .. } => sql.statements().iter().any(|statement| {
            statement_requires_non_atomic(statement).unwrap_or_else(|err| {
                warn!(%err, "could not tokenize raw SQL; assuming non-transactional");
                true
            })
        }),
        _ => false,
    })
}

/// Classifies one raw SQL string, which may contain several
/// semicolon-separated statements.
///
/// Errors if the text cannot be tokenized; [`requires_non_atomic`] maps that
/// to the conservative answer.
pub fn statement_requires_non_atomic(sql: &str) -> Result<bool, MigcheckError> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| MigcheckError::SqlClassification(e.to_string()))?;

    Ok(tokens
        .split(|token| matches!(token, Token::SemiColon))
        .any(|statement| {
            PATTERNS.iter().any(|pattern| {
                pattern
                    .iter()
                    .all(|keyword| statement.iter().any(|token| is_keyword(token, *keyword)))
            })
        }))
}

/// Matches an unquoted word token against a keyword. Quoted identifiers are
/// plain names, never keywords.
fn is_keyword(token: &Token, keyword: Keyword) -> bool {
    matches!(token, Token::Word(word) if word.quote_style.is_none() && word.keyword == keyword)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{IndexDef, RawSql, SqlStatement};
    use migcheck_db::Value;

    fn run_sql(sql: &str) -> Operation {
        Operation::RunSql {
            sql: sql.into(),
            reverse: None,
        }
    }

    // ── statement classification ────────────────────────────────────

    #[test]
    fn test_create_index_concurrently() {
        assert!(statement_requires_non_atomic(
            "CREATE INDEX CONCURRENTLY idx_foo ON foo (bar)"
        )
        .unwrap());
    }

    #[test]
    fn test_drop_index_concurrently() {
        assert!(statement_requires_non_atomic("DROP INDEX CONCURRENTLY idx_foo").unwrap());
    }

    #[test]
    fn test_case_insensitive() {
        assert!(
            statement_requires_non_atomic("create index concurrently idx_foo on foo (bar)")
                .unwrap()
        );
    }

    #[test]
    fn test_plain_create_index_is_atomic() {
        assert!(!statement_requires_non_atomic("CREATE INDEX foobar ON foo (bar)").unwrap());
    }

    #[test]
    fn test_select_is_atomic() {
        assert!(!statement_requires_non_atomic("select 1").unwrap());
    }

    #[test]
    fn test_concurrently_in_string_literal_is_atomic() {
        assert!(!statement_requires_non_atomic(
            "INSERT INTO log (note) VALUES ('CREATE INDEX CONCURRENTLY later')"
        )
        .unwrap());
    }

    #[test]
    fn test_concurrently_as_quoted_identifier_is_atomic() {
        assert!(!statement_requires_non_atomic(
            "SELECT \"CONCURRENTLY\", \"INDEX\" FROM \"CREATE\""
        )
        .unwrap());
    }

    #[test]
    fn test_multiple_statements_one_matching() {
        assert!(statement_requires_non_atomic(
            "select 1; CREATE INDEX CONCURRENTLY idx_foo ON foo (bar); select 2"
        )
        .unwrap());
    }

    #[test]
    fn test_keywords_split_across_statements_do_not_match() {
        // Each fragment alone is harmless; only co-occurrence within one
        // statement matches.
        assert!(!statement_requires_non_atomic(
            "CREATE TABLE t (id INT); DROP TABLE concurrently_log"
        )
        .unwrap());
    }

    // ── operation classification ────────────────────────────────────

    #[test]
    fn test_concurrent_index_operations() {
        let add = Operation::AddIndexConcurrently {
            model_name: "foo".into(),
            index: IndexDef::new("idx", vec!["bar".into()]),
        };
        let remove = Operation::RemoveIndexConcurrently {
            model_name: "foo".into(),
            name: "idx".into(),
        };
        assert!(requires_non_atomic(&[add]));
        assert!(requires_non_atomic(&[remove]));
    }

    #[test]
    fn test_plain_operations_are_atomic() {
        let op = Operation::AddIndex {
            model_name: "foo".into(),
            index: IndexDef::new("idx", vec!["bar".into()]),
        };
        assert!(!requires_non_atomic(&[op]));
        assert!(!requires_non_atomic(&[]));
    }

    #[test]
    fn test_run_sql_concurrent_index() {
        assert!(requires_non_atomic(&[run_sql(
            "CREATE INDEX CONCURRENTLY idx_foo ON foo (bar)"
        )]));
        assert!(!requires_non_atomic(&[run_sql("CREATE INDEX foobar ON foo (bar)")]));
    }

    #[test]
    fn test_run_sql_statement_list_with_params() {
        let op = Operation::RunSql {
            sql: RawSql::Statements(vec![
                SqlStatement::with_params("select $1", vec![Value::Int(1)]),
                SqlStatement::new("DROP INDEX CONCURRENTLY idx_foo"),
            ]),
            reverse: None,
        };
        assert!(requires_non_atomic(&[op]));
    }

    #[test]
    fn test_later_operation_still_detected() {
        // A harmless raw statement before the concurrent one must not mask
        // it.
        let ops = [
            run_sql("select 1"),
            Operation::AddIndexConcurrently {
                model_name: "foo".into(),
                index: IndexDef::new("idx", vec!["bar".into()]),
            },
        ];
        assert!(requires_non_atomic(&ops));
    }

    // ── recursion into the composite split ──────────────────────────

    #[test]
    fn test_separate_database_and_state_recurses_database_side() {
        let inner = Operation::SeparateDatabaseAndState {
            state_operations: vec![],
            database_operations: vec![run_sql("DROP INDEX CONCURRENTLY idx_foo")],
        };
        assert!(requires_non_atomic(&[inner]));
    }

    #[test]
    fn test_separate_database_and_state_ignores_state_side() {
        let inner = Operation::SeparateDatabaseAndState {
            state_operations: vec![Operation::AddIndexConcurrently {
                model_name: "foo".into(),
                index: IndexDef::new("idx", vec!["bar".into()]),
            }],
            database_operations: vec![run_sql("select 1")],
        };
        assert!(!requires_non_atomic(&[inner]));
    }

    #[test]
    fn test_separate_database_and_state_safe_inner() {
        let inner = Operation::SeparateDatabaseAndState {
            state_operations: vec![],
            database_operations: vec![run_sql("select 1")],
        };
        assert!(!requires_non_atomic(&[inner]));
    }

    #[test]
    fn test_untokenizable_sql_is_conservative() {
        // An unterminated string literal cannot be tokenized.
        assert!(statement_requires_non_atomic("SELECT 'oops").is_err());
        assert!(requires_non_atomic(&[run_sql("SELECT 'oops")]));
    }
}
