//! Schema-driven beans without a backing Rust type.
//!
//! A [`DynamicBean`] exposes the slots of a class as name-addressed
//! accessors over the same attribute and list bindings a typed bean uses.
//! Values are checked by the slot's converter, so a dynamic bean enforces
//! its schema exactly like a typed one.

use crate::bean::Binder;
use crate::class_repository::ClassInfo;
use crate::error::{RemotingError, RemotingResult};
use crate::list::ObservableList;
use crate::property::Property;
use beanlink_types::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A bean whose shape comes from a runtime [`ClassSchema`](crate::ClassSchema).
pub struct DynamicBean {
    class: Arc<ClassInfo>,
    properties: HashMap<String, Property<Value>>,
    lists: HashMap<String, ObservableList<Value>>,
}

impl DynamicBean {
    pub(crate) fn new(class: Arc<ClassInfo>) -> Self {
        let properties = class
            .properties()
            .iter()
            .map(|p| (p.attribute_name.clone(), Property::new()))
            .collect();
        let lists = class
            .lists()
            .iter()
            .map(|l| (l.attribute_name.clone(), ObservableList::new()))
            .collect();
        Self {
            class,
            properties,
            lists,
        }
    }

    pub(crate) fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()> {
        for (name, property) in &mut self.properties {
            binder.property(name, property)?;
        }
        for (name, list) in &self.lists {
            binder.list(name, list)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        self.class.class_name()
    }

    #[must_use]
    pub fn class_info(&self) -> &ClassInfo {
        &self.class
    }

    fn property(&self, name: &str) -> RemotingResult<&Property<Value>> {
        self.properties
            .get(name)
            .ok_or_else(|| self.unknown(name))
    }

    fn unknown(&self, name: &str) -> RemotingError {
        RemotingError::UnknownAttribute {
            class: self.class.class_name().to_string(),
            name: name.to_string(),
        }
    }

    /// Reads a property; [`Value::Null`] when unset.
    pub fn get(&self, name: &str) -> RemotingResult<Value> {
        Ok(self.property(name)?.get()?.unwrap_or(Value::Null))
    }

    /// Writes a property. The value must match the declared type.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> RemotingResult<()> {
        self.property(name)?.set(value.into())
    }

    pub fn clear(&self, name: &str) -> RemotingResult<()> {
        self.property(name)?.clear()
    }

    /// Reads a bean-reference property as a typed bean.
    pub fn get_bean<T: Any + Send + Sync>(&self, name: &str) -> RemotingResult<Option<Arc<T>>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::Bean(handle) => handle.downcast::<T>().map(Some).ok_or_else(|| {
                RemotingError::mismatch(std::any::type_name::<T>(), "bean of another type")
            }),
            other => Err(RemotingError::mismatch("bean", other.type_name())),
        }
    }

    /// Returns the list slot `name`.
    pub fn list(&self, name: &str) -> RemotingResult<&ObservableList<Value>> {
        self.lists.get(name).ok_or_else(|| self.unknown(name))
    }
}
