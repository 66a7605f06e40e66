//! Declarative bean class schemas.
//!
//! A schema lists the slots of a bean class: single-valued properties and
//! observable lists, each with a declared [`ValueType`]. Schemas are plain
//! data, so both sides of a connection derive identical class descriptors
//! from the same class name.

use beanlink_types::ValueType;

/// Whether a slot holds one value or an ordered list of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Property,
    List,
}

/// One declared slot of a bean class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSchema {
    pub name: String,
    pub kind: SlotKind,
    pub value_type: ValueType,
}

/// Schema of a bean class.
///
/// ```
/// use beanlink_remoting::ClassSchema;
/// use beanlink_types::ValueType;
///
/// let schema = ClassSchema::new("Person")
///     .property("name", ValueType::Text)
///     .reference("manager", "Person")
///     .list("tags", ValueType::Text);
/// assert_eq!(schema.slots().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSchema {
    name: String,
    slots: Vec<SlotSchema>,
}

impl ClassSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
        }
    }

    /// Adds a single-valued property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.slots.push(SlotSchema {
            name: name.into(),
            kind: SlotKind::Property,
            value_type,
        });
        self
    }

    /// Adds a property referencing a bean of class `class`.
    #[must_use]
    pub fn reference(self, name: impl Into<String>, class: impl Into<String>) -> Self {
        self.property(name, ValueType::Bean(class.into()))
    }

    /// Adds an observable list.
    #[must_use]
    pub fn list(mut self, name: impl Into<String>, element_type: ValueType) -> Self {
        self.slots.push(SlotSchema {
            name: name.into(),
            kind: SlotKind::List,
            value_type: element_type,
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slots in declaration order.
    #[must_use]
    pub fn slots(&self) -> &[SlotSchema] {
        &self.slots
    }
}
