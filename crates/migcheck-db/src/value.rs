//! Minimal parameter and row types for the connection trait.

use migcheck_core::MigcheckError;

/// A SQL parameter or result value.
///
/// Only the types the engine actually reads back (lock introspection,
/// recorder bookkeeping) are represented.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A boolean.
    Bool(bool),
    /// Any integer type, widened to 64 bits.
    Int(i64),
    /// Any floating point type, widened to 64 bits.
    Float(f64),
    /// Any character type.
    Text(String),
}

impl Value {
    /// Renders this value as a SQL literal for display purposes.
    ///
    /// The output is meant for humans reading a query log, not for
    /// re-execution.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// One result row: column names paired with values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from parallel column and value lists.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Returns the value for a named column.
    pub fn get(&self, column: &str) -> Result<&Value, MigcheckError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
            .ok_or_else(|| MigcheckError::Database(format!("No column named '{column}' in row")))
    }

    /// Returns the value for a named column as text.
    ///
    /// NULL and non-text values are errors; callers use this for catalog
    /// columns that are known to be non-null strings.
    pub fn get_text(&self, column: &str) -> Result<&str, MigcheckError> {
        match self.get(column)? {
            Value::Text(s) => Ok(s),
            other => Err(MigcheckError::Database(format!(
                "Column '{column}' is not text: {other:?}"
            ))),
        }
    }
}
