//! Migrations and the closed operation taxonomy.
//!
//! A [`Migration`] is an immutable, named unit of schema change: an ordered
//! sequence of [`Operation`]s plus the `atomic` and `initial` flags the
//! checks care about. Operations are a closed enum rather than an open trait
//! hierarchy, so every check and the transaction-discipline classifier match
//! exhaustively: adding an operation kind forces every consumer to decide
//! how to treat it.

use migcheck_db::Value;

use crate::state::{ModelState, ProjectState};

/// A field type tag.
///
/// Only schema-relevant information is carried; the interesting property for
/// the checks is whether the type implies a database-level CHECK constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Auto-incrementing 32-bit primary key.
    Auto,
    /// Auto-incrementing 64-bit primary key.
    BigAuto,
    /// Boolean.
    Boolean,
    /// Bounded character string.
    Char,
    /// Unbounded text.
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// 16-bit integer.
    SmallInteger,
    /// 32-bit integer constrained to be non-negative.
    PositiveInteger,
    /// 16-bit integer constrained to be non-negative.
    PositiveSmallInteger,
    /// 64-bit integer constrained to be non-negative.
    PositiveBigInteger,
    /// Double-precision float.
    Float,
    /// Calendar date.
    Date,
    /// Date and time.
    DateTime,
    /// JSONB document.
    Json,
    /// UUID.
    Uuid,
}

impl FieldType {
    /// Returns whether a column of this type carries an implicit database
    /// CHECK constraint.
    ///
    /// The database has no unsigned integer types, so non-negative integer
    /// fields are emulated with a `CHECK (value >= 0)` constraint on the
    /// column.
    pub const fn has_implicit_check(self) -> bool {
        matches!(
            self,
            Self::PositiveInteger | Self::PositiveSmallInteger | Self::PositiveBigInteger
        )
    }
}

/// A field definition as carried by field-level operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// The field name.
    pub name: String,
    /// The field type tag.
    pub field_type: FieldType,
    /// Whether NULL is allowed.
    pub null: bool,
}

impl FieldDef {
    /// Creates a non-nullable field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            null: false,
        }
    }

    /// Marks the field as nullable.
    #[must_use]
    pub fn null(mut self) -> Self {
        self.null = true;
        self
    }
}

/// An index definition: a name and the columns it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// The index name.
    pub name: String,
    /// The indexed columns, in order.
    pub fields: Vec<String>,
}

impl IndexDef {
    /// Creates an index definition.
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// How a constraint is validated when added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// A CHECK constraint validated immediately.
    Check,
    /// A CHECK constraint added as NOT VALID, to be validated separately.
    CheckNotValid,
    /// A UNIQUE constraint (builds an index).
    Unique,
}

/// A table constraint definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDef {
    /// The constraint name.
    pub name: String,
    /// The validation kind.
    pub kind: ConstraintKind,
}

impl ConstraintDef {
    /// Creates a constraint definition.
    pub fn new(name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One raw SQL statement with optional bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// The statement text.
    pub sql: String,
    /// Bound parameters, if any.
    pub params: Option<Vec<Value>>,
}

impl SqlStatement {
    /// Creates a statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: None,
        }
    }

    /// Creates a statement with bound parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params: Some(params),
        }
    }
}

/// The raw SQL payload of a `RunSql` operation.
///
/// Either one bare statement string or a list of statements, each optionally
/// paired with bound parameters. Only the statement text is ever inspected
/// by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSql {
    /// A single statement.
    Statement(String),
    /// Multiple statements.
    Statements(Vec<SqlStatement>),
}

impl RawSql {
    /// Returns the statement texts, in order.
    pub fn statements(&self) -> Vec<&str> {
        match self {
            Self::Statement(sql) => vec![sql.as_str()],
            Self::Statements(list) => list.iter().map(|s| s.sql.as_str()).collect(),
        }
    }
}

impl From<&str> for RawSql {
    fn from(sql: &str) -> Self {
        Self::Statement(sql.to_string())
    }
}

impl From<String> for RawSql {
    fn from(sql: String) -> Self {
        Self::Statement(sql)
    }
}

/// A single schema or data change instruction within a migration.
///
/// The closed set of variants each carry exactly the fields the analysis
/// needs. The statement executor collaborator owns turning a variant into
/// SQL against a concrete schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Creates a new table.
    CreateModel {
        /// The model name.
        name: String,
        /// The fields of the new model.
        fields: Vec<FieldDef>,
    },
    /// Drops a table.
    DeleteModel {
        /// The model name.
        name: String,
    },
    /// Adds an index, holding a share lock while it builds.
    AddIndex {
        /// The model the index is added to.
        model_name: String,
        /// The index definition.
        index: IndexDef,
    },
    /// Adds an index with `CONCURRENTLY`; must run outside a transaction.
    ///
    /// Exempt from the add-index check: the planner marks migrations using
    /// it as non-atomic and the build does not block writes.
    AddIndexConcurrently {
        /// The model the index is added to.
        model_name: String,
        /// The index definition.
        index: IndexDef,
    },
    /// Drops an index with `CONCURRENTLY`; must run outside a transaction.
    RemoveIndexConcurrently {
        /// The model the index is dropped from.
        model_name: String,
        /// The index name.
        name: String,
    },
    /// Adds a column.
    AddField {
        /// The model the field is added to.
        model_name: String,
        /// The field definition.
        field: FieldDef,
    },
    /// Changes a column's definition.
    AlterField {
        /// The model the field belongs to.
        model_name: String,
        /// The new field definition.
        field: FieldDef,
    },
    /// Drops a column.
    RemoveField {
        /// The model the field is removed from.
        model_name: String,
        /// The field name.
        name: String,
    },
    /// Renames a column.
    RenameField {
        /// The model the field belongs to.
        model_name: String,
        /// The current field name.
        old_name: String,
        /// The new field name.
        new_name: String,
    },
    /// Renames a table.
    RenameModel {
        /// The current model name.
        old_name: String,
        /// The new model name.
        new_name: String,
    },
    /// Adds a table constraint.
    AddConstraint {
        /// The model the constraint is added to.
        model_name: String,
        /// The constraint definition.
        constraint: ConstraintDef,
    },
    /// Validates a constraint previously added as NOT VALID.
    ValidateConstraint {
        /// The model the constraint belongs to.
        model_name: String,
        /// The constraint name.
        name: String,
    },
    /// An opaque data-mutation step.
    ///
    /// The engine never executes the payload; it only needs to know the
    /// step exists. The description is used for reporting.
    RunPython {
        /// What the step does, for display.
        description: String,
    },
    /// One or more raw SQL statements.
    RunSql {
        /// The forward statements.
        sql: RawSql,
        /// The reverse statements, if the operation is reversible.
        reverse: Option<RawSql>,
    },
    /// Applies `state_operations` to the in-memory snapshot but executes
    /// `database_operations` against the database.
    SeparateDatabaseAndState {
        /// Operations applied to the snapshot only.
        state_operations: Vec<Operation>,
        /// Operations executed against the database only.
        database_operations: Vec<Operation>,
    },
}

impl Operation {
    /// Returns a human-readable description of this operation.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateModel { name, .. } => format!("Create model {name}"),
            Self::DeleteModel { name } => format!("Delete model {name}"),
            Self::AddIndex { model_name, index } => {
                format!("Add index {} to {model_name}", index.name)
            }
            Self::AddIndexConcurrently { model_name, index } => {
                format!("Concurrently add index {} to {model_name}", index.name)
            }
            Self::RemoveIndexConcurrently { model_name, name } => {
                format!("Concurrently remove index {name} from {model_name}")
            }
            Self::AddField { model_name, field } => {
                format!("Add field {} to {model_name}", field.name)
            }
            Self::AlterField { model_name, field } => {
                format!("Alter field {} on {model_name}", field.name)
            }
            Self::RemoveField { model_name, name } => {
                format!("Remove field {name} from {model_name}")
            }
            Self::RenameField {
                model_name,
                old_name,
                new_name,
            } => format!("Rename field {old_name} on {model_name} to {new_name}"),
            Self::RenameModel { old_name, new_name } => {
                format!("Rename model {old_name} to {new_name}")
            }
            Self::AddConstraint {
                model_name,
                constraint,
            } => format!("Add constraint {} to {model_name}", constraint.name),
            Self::ValidateConstraint { model_name, name } => {
                format!("Validate constraint {name} on {model_name}")
            }
            Self::RunPython { description } => format!("Run data migration: {description}"),
            Self::RunSql { .. } => "Run raw SQL".to_string(),
            Self::SeparateDatabaseAndState { .. } => "Separate database and state".to_string(),
        }
    }

    /// Returns whether this is a data operation (as opposed to a schema
    /// change).
    pub const fn is_data_operation(&self) -> bool {
        matches!(self, Self::RunPython { .. } | Self::RunSql { .. })
    }

    /// Returns the model this operation alters, if it is a field- or
    /// model-level operation.
    ///
    /// A rename reports the old name; data operations and the composite
    /// split report nothing.
    pub fn altered_model(&self) -> Option<&str> {
        match self {
            Self::CreateModel { name, .. } | Self::DeleteModel { name } => Some(name),
            Self::RenameModel { old_name, .. } => Some(old_name),
            Self::AddIndex { model_name, .. }
            | Self::AddIndexConcurrently { model_name, .. }
            | Self::RemoveIndexConcurrently { model_name, .. }
            | Self::AddField { model_name, .. }
            | Self::AlterField { model_name, .. }
            | Self::RemoveField { model_name, .. }
            | Self::RenameField { model_name, .. }
            | Self::AddConstraint { model_name, .. }
            | Self::ValidateConstraint { model_name, .. } => Some(model_name),
            Self::RunPython { .. } | Self::RunSql { .. } | Self::SeparateDatabaseAndState { .. } => {
                None
            }
        }
    }

    /// Applies this operation to the in-memory schema snapshot.
    pub fn state_forwards(&self, app_label: &str, state: &mut ProjectState) {
        match self {
            Self::CreateModel { name, fields } => {
                state.add_model(ModelState::new(app_label, name.clone(), fields.clone()));
            }
            Self::DeleteModel { name } => {
                state.remove_model(app_label, name);
            }
            Self::AddIndex { model_name, index }
            | Self::AddIndexConcurrently { model_name, index } => {
                if let Some(model) = state.get_model_mut(app_label, model_name) {
                    model.indexes.push(index.clone());
                }
            }
            Self::RemoveIndexConcurrently { model_name, name } => {
                if let Some(model) = state.get_model_mut(app_label, model_name) {
                    model.indexes.retain(|i| &i.name != name);
                }
            }
            Self::AddField { model_name, field } => {
                if let Some(model) = state.get_model_mut(app_label, model_name) {
                    model.fields.push(field.clone());
                }
            }
            Self::AlterField { model_name, field } => {
                if let Some(model) = state.get_model_mut(app_label, model_name) {
                    if let Some(existing) = model.fields.iter_mut().find(|f| f.name == field.name)
                    {
                        *existing = field.clone();
                    }
                }
            }
            Self::RemoveField { model_name, name } => {
                if let Some(model) = state.get_model_mut(app_label, model_name) {
                    model.fields.retain(|f| &f.name != name);
                }
            }
            Self::RenameField {
                model_name,
                old_name,
                new_name,
            } => {
                if let Some(model) = state.get_model_mut(app_label, model_name) {
                    if let Some(field) = model.fields.iter_mut().find(|f| &f.name == old_name) {
                        field.name.clone_from(new_name);
                    }
                }
            }
            Self::RenameModel { old_name, new_name } => {
                state.rename_model(app_label, old_name, new_name);
            }
            Self::AddConstraint {
                model_name,
                constraint,
            } => {
                if let Some(model) = state.get_model_mut(app_label, model_name) {
                    model.constraints.push(constraint.clone());
                }
            }
            // Validation has no schema-state effect; data operations touch
            // rows, not the snapshot.
            Self::ValidateConstraint { .. } | Self::RunPython { .. } | Self::RunSql { .. } => {}
            Self::SeparateDatabaseAndState {
                state_operations, ..
            } => {
                for op in state_operations {
                    op.state_forwards(app_label, state);
                }
            }
        }
    }
}

/// A single migration: an ordered set of operations for one app.
///
/// Migrations are identified by `(app_label, name)` and are immutable once
/// planned; the engine only reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    /// The application label this migration belongs to.
    pub app_label: String,
    /// The migration name (e.g., "0004_orderline_order").
    pub name: String,
    /// Dependencies on other migrations: `(app_label, migration_name)`.
    pub dependencies: Vec<(String, String)>,
    /// The operations to apply, in order.
    pub operations: Vec<Operation>,
    /// Whether this migration may run in one transaction.
    pub atomic: bool,
    /// Whether this is the initial migration for the app.
    pub initial: bool,
}

impl Migration {
    /// Creates a new atomic, non-initial migration.
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
            dependencies: Vec::new(),
            operations: Vec::new(),
            atomic: true,
            initial: false,
        }
    }

    /// Marks this migration as the initial migration for its app.
    #[must_use]
    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    /// Marks this migration as non-atomic.
    #[must_use]
    pub fn non_atomic(mut self) -> Self {
        self.atomic = false;
        self
    }

    /// Adds a dependency on another migration.
    #[must_use]
    pub fn depends_on(mut self, app_label: impl Into<String>, name: impl Into<String>) -> Self {
        self.dependencies.push((app_label.into(), name.into()));
        self
    }

    /// Adds an operation to this migration.
    #[must_use]
    pub fn operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Returns the `(app_label, name)` key for this migration.
    pub fn key(&self) -> (String, String) {
        (self.app_label.clone(), self.name.clone())
    }

    /// Applies every operation's state change to the snapshot, in order.
    pub fn mutate_state(&self, state: &mut ProjectState) {
        for op in &self.operations {
            op.state_forwards(&self.app_label, state);
        }
    }
}
