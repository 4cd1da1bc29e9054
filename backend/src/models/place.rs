//! The `Place` domain object exchanged with the presentation layer.
//!
//! A place is an ordered attribute map (identifier, coordinates, demand, ...).
//! Input places are flattened into a [`Table`](crate::table::Table) through
//! [`Place::to_dict`]; solver output rows come back through [`Place::from_dict`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single tabular record: named attributes in insertion order.
pub type Record = Map<String, Value>;

/// A candidate or input site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Place {
    attributes: Record,
}

impl Place {
    /// Create a place with no attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a place from a record.
    pub fn from_dict(attributes: Record) -> Self {
        Self { attributes }
    }

    /// Serialize the place into a record, preserving attribute order.
    pub fn to_dict(&self) -> Record {
        self.attributes.clone()
    }

    /// Consume the place and return its record.
    pub fn into_dict(self) -> Record {
        self.attributes
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Numeric attribute; numbers encoded as strings (as CSV outputs often are) are parsed.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.attributes.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The `id` attribute rendered as a string, whether stored as text or number.
    pub fn id(&self) -> Option<String> {
        match self.attributes.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl From<Record> for Place {
    fn from(attributes: Record) -> Self {
        Self::from_dict(attributes)
    }
}
