//! The static risk checks and their registry.
//!
//! Each check is a total, side-effect-free function over a migration and the
//! pre-migration schema snapshot, producing zero or more warnings drawn from
//! the canonical catalog in `migcheck_core::warnings`. The registry is an
//! ordered slice of function values; [`run_checks`] concatenates their
//! output in registry order.

use std::collections::HashSet;

use migcheck_core::warnings::{
    Warning, ADDING_CONSTRAINT, ADDING_FIELD_WITH_CHECK, ADDING_NON_NULLABLE_FIELD,
    ADD_INDEX_IN_SEPARATE_MIGRATION, ALTERING_MULTIPLE_MODELS, ALTER_FIELD,
    ATOMIC_DATA_MIGRATION, REMOVING_FIELD, RENAMING_FIELD, RENAMING_MODEL,
    SCHEMA_AND_DATA_CHANGES, USE_ADD_INDEX_CONCURRENTLY, VALIDATE_CONSTRAINT_SEPARATELY,
};

use crate::migration::{Migration, Operation};
use crate::state::ProjectState;

/// A static risk check.
pub type Check = fn(&Migration, &ProjectState) -> Vec<Warning>;

/// The fixed, ordered check registry.
pub const ALL_CHECKS: &[Check] = &[
    check_add_index,
    check_add_non_nullable_field,
    check_alter_multiple_tables,
    check_atomic_run_python,
    check_data_and_schema_changes,
    check_remove_field,
    check_rename_field,
    check_rename_model,
    check_add_field_with_check,
    check_add_constraint,
    check_validate_constraint_separately,
    check_alter_field,
];

/// Runs every registered check against a migration, in registry order.
pub fn run_checks(migration: &Migration, state: &ProjectState) -> Vec<Warning> {
    ALL_CHECKS
        .iter()
        .flat_map(|check| check(migration, state))
        .collect()
}

fn check_add_index(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    let mut found = Vec::new();

    if migration
        .operations
        .iter()
        .any(|op| matches!(op, Operation::AddIndex { .. }))
    {
        found.push(USE_ADD_INDEX_CONCURRENTLY);

        // TODO: Allow if the table was created in the same migration
        if !migration.initial && migration.operations.len() > 1 {
            found.push(ADD_INDEX_IN_SEPARATE_MIGRATION);
        }
    }

    found
}

fn check_add_non_nullable_field(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    let non_nullable = migration
        .operations
        .iter()
        .any(|op| matches!(op, Operation::AddField { field, .. } if !field.null));

    if non_nullable {
        // TODO: Allow if the model was added in the same migration
        vec![ADDING_NON_NULLABLE_FIELD]
    } else {
        Vec::new()
    }
}

fn check_alter_multiple_tables(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    let mut altered_models: HashSet<&str> = HashSet::new();

    if migration.atomic && !migration.initial {
        for op in &migration.operations {
            if let Some(model) = op.altered_model() {
                altered_models.insert(model);
            }
        }
    }

    // TODO: Allow if the models were created in the same migration
    if altered_models.len() > 1 {
        vec![ALTERING_MULTIPLE_MODELS]
    } else {
        Vec::new()
    }
}

fn check_atomic_run_python(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    let has_run_python = migration
        .operations
        .iter()
        .any(|op| matches!(op, Operation::RunPython { .. }));

    if migration.atomic && has_run_python {
        vec![ATOMIC_DATA_MIGRATION]
    } else {
        Vec::new()
    }
}

fn check_data_and_schema_changes(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    let mut data_migration = false;
    let mut schema_migration = false;
    for op in &migration.operations {
        if op.is_data_operation() {
            data_migration = true;
        } else {
            schema_migration = true;
        }
    }

    if data_migration && schema_migration {
        vec![SCHEMA_AND_DATA_CHANGES]
    } else {
        Vec::new()
    }
}

fn check_remove_field(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    if migration
        .operations
        .iter()
        .any(|op| matches!(op, Operation::RemoveField { .. }))
    {
        vec![REMOVING_FIELD]
    } else {
        Vec::new()
    }
}

fn check_rename_field(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    if migration
        .operations
        .iter()
        .any(|op| matches!(op, Operation::RenameField { .. }))
    {
        vec![RENAMING_FIELD]
    } else {
        Vec::new()
    }
}

fn check_rename_model(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    if migration
        .operations
        .iter()
        .any(|op| matches!(op, Operation::RenameModel { .. }))
    {
        vec![RENAMING_MODEL]
    } else {
        Vec::new()
    }
}

fn check_add_field_with_check(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    let with_check = migration.operations.iter().any(
        |op| matches!(op, Operation::AddField { field, .. } if field.field_type.has_implicit_check()),
    );

    if with_check {
        vec![ADDING_FIELD_WITH_CHECK]
    } else {
        Vec::new()
    }
}

fn check_add_constraint(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    if migration
        .operations
        .iter()
        .any(|op| matches!(op, Operation::AddConstraint { .. }))
    {
        vec![ADDING_CONSTRAINT]
    } else {
        Vec::new()
    }
}

fn check_validate_constraint_separately(
    migration: &Migration,
    _state: &ProjectState,
) -> Vec<Warning> {
    let has_validate = migration
        .operations
        .iter()
        .any(|op| matches!(op, Operation::ValidateConstraint { .. }));

    if has_validate && migration.operations.len() > 1 {
        vec![VALIDATE_CONSTRAINT_SEPARATELY]
    } else {
        Vec::new()
    }
}

fn check_alter_field(migration: &Migration, _state: &ProjectState) -> Vec<Warning> {
    let non_nullable_alter = migration
        .operations
        .iter()
        .any(|op| matches!(op, Operation::AlterField { field, .. } if !field.null));

    if non_nullable_alter {
        vec![ALTER_FIELD]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::migration::{ConstraintDef, ConstraintKind, FieldDef, FieldType, IndexDef};
    use crate::state::ModelState;

    /// Builds the snapshot left behind by an initial migration creating one
    /// model, then runs the checks over a non-initial migration holding the
    /// given operations.
    fn check_migration(operations: Vec<Operation>) -> HashSet<Warning> {
        let initial = Migration::new("foo", "0001_foo")
            .initial()
            .operation(Operation::CreateModel {
                name: "foo".into(),
                fields: vec![FieldDef::new("id", FieldType::Auto)],
            });

        let mut state = ProjectState::new();
        initial.mutate_state(&mut state);

        let mut migration = Migration::new("foo", "0002_foo");
        migration.operations = operations;

        run_checks(&migration, &state).into_iter().collect()
    }

    fn add_field(name: &str, field_type: FieldType, null: bool) -> Operation {
        let mut field = FieldDef::new(name, field_type);
        field.null = null;
        Operation::AddField {
            model_name: "foo".into(),
            field,
        }
    }

    #[test]
    fn test_add_index() {
        let op = Operation::AddIndex {
            model_name: "foo".into(),
            index: IndexDef::new("foo", vec!["foo".into()]),
        };
        assert_eq!(
            check_migration(vec![op]),
            HashSet::from([USE_ADD_INDEX_CONCURRENTLY])
        );
    }

    #[test]
    fn test_add_index_separately() {
        let ops = vec![
            add_field("bar", FieldType::Integer, true),
            Operation::AddIndex {
                model_name: "foo".into(),
                index: IndexDef::new("foo", vec!["foo".into()]),
            },
        ];
        assert_eq!(
            check_migration(ops),
            HashSet::from([USE_ADD_INDEX_CONCURRENTLY, ADD_INDEX_IN_SEPARATE_MIGRATION])
        );
    }

    #[test]
    fn test_add_index_initial_migration_exempt_from_separate_warning() {
        let initial = Migration::new("foo", "0001_foo")
            .initial()
            .operation(Operation::CreateModel {
                name: "foo".into(),
                fields: vec![FieldDef::new("id", FieldType::Auto)],
            })
            .operation(Operation::AddIndex {
                model_name: "foo".into(),
                index: IndexDef::new("foo", vec!["foo".into()]),
            });
        let warnings: HashSet<Warning> =
            run_checks(&initial, &ProjectState::new()).into_iter().collect();
        assert!(warnings.contains(&USE_ADD_INDEX_CONCURRENTLY));
        assert!(!warnings.contains(&ADD_INDEX_IN_SEPARATE_MIGRATION));
    }

    #[test]
    fn test_add_index_concurrently_is_exempt() {
        let op = Operation::AddIndexConcurrently {
            model_name: "foo".into(),
            index: IndexDef::new("foo", vec!["foo".into()]),
        };
        assert_eq!(check_migration(vec![op]), HashSet::new());
    }

    #[test]
    fn test_add_nullable_field() {
        assert_eq!(
            check_migration(vec![add_field("bar", FieldType::Integer, true)]),
            HashSet::new()
        );
    }

    #[test]
    fn test_add_non_nullable_field() {
        assert_eq!(
            check_migration(vec![add_field("bar", FieldType::Integer, false)]),
            HashSet::from([ADDING_NON_NULLABLE_FIELD])
        );
    }

    #[test]
    fn test_remove_field() {
        let op = Operation::RemoveField {
            model_name: "foo".into(),
            name: "bar".into(),
        };
        assert_eq!(check_migration(vec![op]), HashSet::from([REMOVING_FIELD]));
    }

    #[test]
    fn test_rename_model() {
        let op = Operation::RenameModel {
            old_name: "foo".into(),
            new_name: "bar".into(),
        };
        assert_eq!(check_migration(vec![op]), HashSet::from([RENAMING_MODEL]));
    }

    #[test]
    fn test_rename_field() {
        let op = Operation::RenameField {
            model_name: "foo".into(),
            old_name: "bar".into(),
            new_name: "baz".into(),
        };
        assert_eq!(check_migration(vec![op]), HashSet::from([RENAMING_FIELD]));
    }

    #[test]
    fn test_schema_and_data_changes() {
        let ops = vec![
            add_field("bar", FieldType::Integer, true),
            Operation::RunSql {
                sql: "select 1".into(),
                reverse: None,
            },
        ];
        assert_eq!(
            check_migration(ops),
            HashSet::from([SCHEMA_AND_DATA_CHANGES])
        );
    }

    #[test]
    fn test_atomic_run_python() {
        let op = Operation::RunPython {
            description: "backfill totals".into(),
        };
        assert_eq!(
            check_migration(vec![op]),
            HashSet::from([ATOMIC_DATA_MIGRATION])
        );
    }

    #[test]
    fn test_non_atomic_run_python_is_fine() {
        let mut migration = Migration::new("foo", "0002_foo").non_atomic();
        migration.operations = vec![Operation::RunPython {
            description: "backfill totals".into(),
        }];
        let warnings = run_checks(&migration, &ProjectState::new());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_alter_multiple_models() {
        let ops = vec![
            add_field("bar", FieldType::Integer, true),
            Operation::AddField {
                model_name: "baz".into(),
                field: FieldDef::new("bar", FieldType::Integer).null(),
            },
        ];
        assert_eq!(
            check_migration(ops),
            HashSet::from([ALTERING_MULTIPLE_MODELS])
        );
    }

    #[test]
    fn test_alter_multiple_models_non_atomic_exempt() {
        let mut migration = Migration::new("foo", "0002_foo").non_atomic();
        migration.operations = vec![
            add_field("bar", FieldType::Integer, true),
            Operation::AddField {
                model_name: "baz".into(),
                field: FieldDef::new("bar", FieldType::Integer).null(),
            },
        ];
        let warnings = run_checks(&migration, &ProjectState::new());
        assert!(!warnings.contains(&ALTERING_MULTIPLE_MODELS));
    }

    #[test]
    fn test_add_field_with_check() {
        assert_eq!(
            check_migration(vec![add_field("bar", FieldType::PositiveInteger, true)]),
            HashSet::from([ADDING_FIELD_WITH_CHECK])
        );
    }

    #[test]
    fn test_add_constraint() {
        let op = Operation::AddConstraint {
            model_name: "foo".into(),
            constraint: ConstraintDef::new("age_gte_18", ConstraintKind::Check),
        };
        assert_eq!(check_migration(vec![op]), HashSet::from([ADDING_CONSTRAINT]));
    }

    #[test]
    fn test_alter_field() {
        let op = Operation::AlterField {
            model_name: "foo".into(),
            field: FieldDef::new("id", FieldType::BigAuto),
        };
        assert_eq!(check_migration(vec![op]), HashSet::from([ALTER_FIELD]));
    }

    #[test]
    fn test_alter_field_to_nullable() {
        let op = Operation::AlterField {
            model_name: "foo".into(),
            field: FieldDef::new("id", FieldType::Auto).null(),
        };
        assert_eq!(check_migration(vec![op]), HashSet::new());
    }

    #[test]
    fn test_add_field_and_validate_constraint() {
        let ops = vec![
            add_field("bar", FieldType::Integer, true),
            Operation::ValidateConstraint {
                model_name: "foo".into(),
                name: "foo".into(),
            },
        ];
        assert_eq!(
            check_migration(ops),
            HashSet::from([VALIDATE_CONSTRAINT_SEPARATELY])
        );
    }

    #[test]
    fn test_validate_constraint_alone_is_fine() {
        let op = Operation::ValidateConstraint {
            model_name: "foo".into(),
            name: "foo".into(),
        };
        assert_eq!(check_migration(vec![op]), HashSet::new());
    }

    #[test]
    fn test_run_checks_is_idempotent() {
        let migration = Migration::new("foo", "0002_foo")
            .operation(add_field("bar", FieldType::Integer, false))
            .operation(Operation::AddIndex {
                model_name: "foo".into(),
                index: IndexDef::new("foo", vec!["bar".into()]),
            });
        let state = ProjectState::new();
        assert_eq!(
            run_checks(&migration, &state),
            run_checks(&migration, &state)
        );
    }
}
