//! The mutable schema snapshot threaded through a run.
//!
//! [`ProjectState`] is produced by the external planner to reflect all
//! previously applied migrations and is mutated in place as each pending
//! migration is applied. The orchestrator is its sole owner for the
//! duration of a run; it is never persisted.

use std::collections::HashMap;

use crate::migration::{ConstraintDef, FieldDef, IndexDef};

/// A snapshot of every known model, keyed by `(app_label, model_name)`.
#[derive(Debug, Clone, Default)]
pub struct ProjectState {
    models: HashMap<(String, String), ModelState>,
}

impl ProjectState {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a model to the snapshot.
    pub fn add_model(&mut self, model: ModelState) {
        let key = (model.app_label.clone(), model.name.clone());
        self.models.insert(key, model);
    }

    /// Removes a model from the snapshot.
    pub fn remove_model(&mut self, app_label: &str, name: &str) {
        self.models
            .remove(&(app_label.to_string(), name.to_string()));
    }

    /// Renames a model, keeping its fields.
    pub fn rename_model(&mut self, app_label: &str, old_name: &str, new_name: &str) {
        if let Some(mut model) = self
            .models
            .remove(&(app_label.to_string(), old_name.to_string()))
        {
            model.name = new_name.to_string();
            self.add_model(model);
        }
    }

    /// Returns a model, if present.
    pub fn get_model(&self, app_label: &str, name: &str) -> Option<&ModelState> {
        self.models
            .get(&(app_label.to_string(), name.to_string()))
    }

    /// Returns a mutable model, if present.
    pub fn get_model_mut(&mut self, app_label: &str, name: &str) -> Option<&mut ModelState> {
        self.models
            .get_mut(&(app_label.to_string(), name.to_string()))
    }

    /// Returns the number of models in the snapshot.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// The state of a single model at a point in the migration sequence.
#[derive(Debug, Clone)]
pub struct ModelState {
    /// The application label this model belongs to.
    pub app_label: String,
    /// The model name.
    pub name: String,
    /// The fields of this model.
    pub fields: Vec<FieldDef>,
    /// Indexes on this model.
    pub indexes: Vec<IndexDef>,
    /// Constraints on this model.
    pub constraints: Vec<ConstraintDef>,
}

impl ModelState {
    /// Creates a model state with the given fields and no indexes or
    /// constraints.
    pub fn new(
        app_label: impl Into<String>,
        name: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
            fields,
            indexes: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Returns the database table name for this model.
    pub fn db_table(&self) -> String {
        format!("{}_{}", self.app_label, self.name)
    }
}
