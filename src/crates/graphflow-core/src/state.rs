//! Shared state with per-field merge rules
//!
//! Graph state is a JSON object. Node outputs are merged field by field
//! according to the graph's [`StateSchema`]: most fields are last-write-wins
//! ([`Reducer::Replace`]), while fields registered as [`Reducer::Append`]
//! accumulate; the plan-review graph registers its message history this way
//! so every node's messages survive the run.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Merge strategy for one state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reducer {
    /// Replace the current value with the update (default)
    #[default]
    Replace,

    /// Concatenate array updates onto the current array value
    Append,
}

/// Per-field merge rules for a graph's shared state.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    reducers: HashMap<String, Reducer>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field as append-only.
    pub fn append(mut self, field: impl Into<String>) -> Self {
        self.reducers.insert(field.into(), Reducer::Append);
        self
    }

    /// The reducer for a field; `Replace` unless registered otherwise.
    pub fn reducer_for(&self, field: &str) -> Reducer {
        self.reducers.get(field).copied().unwrap_or_default()
    }

    /// Merge an update object into the state object in place.
    ///
    /// Non-object updates are ignored: nodes communicate exclusively through
    /// field maps. `Append` fields accept either an array (concatenated) or a
    /// single value (pushed).
    pub fn apply(&self, state: &mut Value, update: &Value) {
        let Some(update_map) = update.as_object() else {
            return;
        };

        if !state.is_object() {
            *state = Value::Object(Map::new());
        }
        let state_map = state.as_object_mut().expect("state forced to object above");

        for (field, new_value) in update_map {
            match self.reducer_for(field) {
                Reducer::Replace => {
                    state_map.insert(field.clone(), new_value.clone());
                }
                Reducer::Append => {
                    let entry = state_map
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !entry.is_array() {
                        *entry = Value::Array(vec![entry.clone()]);
                    }
                    let items = entry.as_array_mut().expect("entry forced to array above");
                    match new_value {
                        Value::Array(additions) => items.extend(additions.iter().cloned()),
                        other => items.push(other.clone()),
                    }
                }
            }
        }
    }
}
