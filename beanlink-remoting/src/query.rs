//! Filtering managed beans by property values.
//!
//! Conditions compare wire forms: the expected value goes through the same
//! converter the property uses, so bean references match by model id and
//! a value of the wrong type is rejected instead of never matching.

use crate::bean_repository::BeanRepository;
use crate::class_repository::ClassInfo;
use crate::error::{RemotingError, RemotingResult};
use crate::property::PropertyValue;
use beanlink_store::{ModelStore, StoreError};
use beanlink_types::{Value, WireValue};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Test {
    Equals,
    NotEquals,
}

#[derive(Debug, Clone)]
struct Condition {
    property: String,
    test: Test,
    value: Value,
}

/// A query over the managed beans of one class.
///
/// Built by [`RemotingContext::query`](crate::RemotingContext::query);
/// every condition must hold for a bean to match.
pub struct BeanQuery<'a, T> {
    beans: &'a BeanRepository,
    store: &'a dyn ModelStore,
    class: Arc<ClassInfo>,
    conditions: Vec<Condition>,
    _bean: PhantomData<fn() -> T>,
}

impl<'a, T: Any + Send + Sync> BeanQuery<'a, T> {
    pub(crate) fn new(
        beans: &'a BeanRepository,
        store: &'a dyn ModelStore,
        class: Arc<ClassInfo>,
    ) -> Self {
        Self {
            beans,
            store,
            class,
            conditions: Vec::new(),
            _bean: PhantomData,
        }
    }

    /// Keeps beans whose `property` equals `value`.
    #[must_use]
    pub fn with_equals(self, property: &str, value: impl PropertyValue) -> Self {
        self.with(property, Test::Equals, value.into_value())
    }

    /// Keeps beans whose `property` differs from `value`.
    #[must_use]
    pub fn with_not_equals(self, property: &str, value: impl PropertyValue) -> Self {
        self.with(property, Test::NotEquals, value.into_value())
    }

    /// Keeps beans whose `property` is unset.
    #[must_use]
    pub fn with_null(self, property: &str) -> Self {
        self.with(property, Test::Equals, Value::Null)
    }

    fn with(mut self, property: &str, test: Test, value: Value) -> Self {
        self.conditions.push(Condition {
            property: property.to_string(),
            test,
            value,
        });
        self
    }

    /// Matching beans, in registration order.
    pub fn run(&self) -> RemotingResult<Vec<Arc<T>>> {
        let expected = self
            .conditions
            .iter()
            .map(|c| {
                let info = self.class.property(&c.property).ok_or_else(|| {
                    RemotingError::UnknownAttribute {
                        class: self.class.class_name().to_string(),
                        name: c.property.clone(),
                    }
                })?;
                Ok((info.attribute_name.as_str(), c.test, info.converter.to_wire(&c.value)?))
            })
            .collect::<RemotingResult<Vec<(&str, Test, WireValue)>>>()?;

        let mut found = Vec::new();
        'beans: for handle in self.beans.find_all(self.class.class_name()) {
            let (Ok(id), Some(bean)) = (self.beans.get_handle_id(&handle), handle.downcast::<T>())
            else {
                continue;
            };
            for (attribute, test, wire) in &expected {
                let actual = match self.store.get_attribute(&id, attribute) {
                    Ok(actual) => actual,
                    // Deleted while the query ran.
                    Err(StoreError::ModelNotFound(_)) => continue 'beans,
                    Err(e) => return Err(e.into()),
                };
                if (actual == *wire) != (*test == Test::Equals) {
                    continue 'beans;
                }
            }
            found.push(bean);
        }
        trace!(
            "Query on {} with {} conditions matched {} beans",
            self.class.class_name(),
            expected.len(),
            found.len()
        );
        Ok(found)
    }

    /// Number of matching beans.
    pub fn count(&self) -> RemotingResult<usize> {
        self.run().map(|beans| beans.len())
    }
}
