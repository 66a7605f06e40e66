//! Models and attributes.

use beanlink_types::{ModelId, WireValue};
use serde::{Deserialize, Serialize};

/// A named slot inside a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: WireValue,
}

impl Attribute {
    /// Creates an attribute holding `value`.
    pub fn new(name: impl Into<String>, value: impl Into<WireValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates an attribute holding null.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: WireValue::Null,
        }
    }
}

/// A point-in-time copy of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub id: ModelId,
    pub model_type: String,
    pub attributes: Vec<Attribute>,
}

impl ModelSnapshot {
    /// Looks up an attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&WireValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// Returns the attribute names in declaration order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }
}
