//! State schema and snapshot types
//!
//! A widget tracks a fixed, ordered set of named parameters. Both the
//! Controller's canonical snapshot and the View's shadow snapshot are built
//! against the same [`StateSchema`], so every snapshot always holds exactly
//! the schema's keys.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A partial state update: parameter name -> value.
///
/// Keys outside the widget's schema are tolerated and ignored on merge.
pub type PartialState = Map<String, Value>;

/// Ordered set of parameter names fixed at widget construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSchema {
    params: Arc<[String]>,
}

impl StateSchema {
    /// Build a schema from parameter names. Duplicates keep their first position.
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for param in params {
            let param = param.into();
            if !ordered.contains(&param) {
                ordered.push(param);
            }
        }
        Self {
            params: ordered.into(),
        }
    }

    /// Parameter names in schema order
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Position of a parameter in the schema
    pub fn index_of(&self, param: &str) -> Option<usize> {
        self.params.iter().position(|p| p == param)
    }

    pub fn contains(&self, param: &str) -> bool {
        self.index_of(param).is_some()
    }
}

/// Snapshot of every schema parameter's value
///
/// Values are stored positionally against the schema, so the key set can
/// never drift from the schema. `Value::Null` is the absent value.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    schema: StateSchema,
    values: Vec<Value>,
}

impl StateSnapshot {
    /// Create a snapshot with every schema key set to null
    pub fn new(schema: &StateSchema) -> Self {
        Self {
            schema: schema.clone(),
            values: vec![Value::Null; schema.len()],
        }
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// Value of a parameter, `None` if the parameter is not in the schema
    pub fn get(&self, param: &str) -> Option<&Value> {
        self.schema.index_of(param).map(|idx| &self.values[idx])
    }

    /// Iterate `(param, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .params()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Set a single parameter. Returns false if the parameter is not in the schema.
    pub fn set(&mut self, param: &str, value: Value) -> bool {
        match self.schema.index_of(param) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Overwrite every schema key present in `partial`, unconditionally
    pub fn merge(&mut self, partial: &PartialState) {
        for (idx, param) in self.schema.params().iter().enumerate() {
            if let Some(value) = partial.get(param) {
                self.values[idx] = value.clone();
            }
        }
    }

    /// Overwrite only the schema keys whose value differs. Returns whether anything changed.
    pub fn merge_changed(&mut self, partial: &PartialState) -> bool {
        let mut changed = false;
        for (idx, param) in self.schema.params().iter().enumerate() {
            if let Some(value) = partial.get(param) {
                if self.values[idx] != *value {
                    self.values[idx] = value.clone();
                    changed = true;
                }
            }
        }
        changed
    }

    /// Schema keys present in `partial` whose value differs from this snapshot,
    /// in schema order
    pub fn changed_params(&self, partial: &PartialState) -> Vec<(String, Value)> {
        self.iter()
            .filter_map(|(param, current)| match partial.get(param) {
                Some(value) if value != current => Some((param.to_string(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Copy the snapshot into a plain map
    pub fn to_partial(&self) -> PartialState {
        self.iter()
            .map(|(param, value)| (param.to_string(), value.clone()))
            .collect()
    }
}

impl Serialize for StateSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (param, value) in self.iter() {
            map.serialize_entry(param, value)?;
        }
        map.end()
    }
}
