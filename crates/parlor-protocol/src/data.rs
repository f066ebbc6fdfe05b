//! Template data handed to a [`Renderer`](crate::Renderer).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A string-keyed bag of JSON values.
///
/// Callers build one per broadcast; the hub then merges per-participant
/// context into a copy before each render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Data(Map<String, Value>);

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// A value that cannot be represented as JSON is stored as `null` and
    /// logged; one odd field should not cost the whole fragment.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        let key = key.into();
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::warn!(%key, error = %e, "unserializable template value");
            Value::Null
        });
        self.0.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Convenience for string values.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}
