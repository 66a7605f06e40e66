//! Single-valued bean properties bound to model attributes.

use crate::bean::Bean;
use crate::converters::Converter;
use crate::error::{RemotingError, RemotingResult};
use beanlink_store::ModelStore;
use beanlink_types::{BeanHandle, ModelId, Period, Value, ValueType};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// A Rust type that can live in a property or list slot.
pub trait PropertyValue: Clone + Send + Sync + Sized + 'static {
    /// Returns true if slots declared as `value_type` can hold `Self`.
    fn accepts(value_type: &ValueType) -> bool;

    /// Describes `Self` in binding errors.
    fn type_label() -> String;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> RemotingResult<Self>;
}

macro_rules! property_value {
    ($ty:ty, $variant:ident, $label:literal) => {
        impl PropertyValue for $ty {
            fn accepts(value_type: &ValueType) -> bool {
                matches!(value_type, ValueType::$variant)
            }

            fn type_label() -> String {
                $label.to_string()
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> RemotingResult<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(RemotingError::mismatch($label, other.type_name())),
                }
            }
        }
    };
}

property_value!(bool, Bool, "bool");
property_value!(i32, Int, "int");
property_value!(i64, Long, "long");
property_value!(f64, Double, "double");
property_value!(String, Text, "text");
property_value!(Uuid, Uuid, "uuid");
property_value!(DateTime<Utc>, DateTime, "datetime");
property_value!(NaiveDateTime, LocalDateTime, "local_datetime");
property_value!(TimeDelta, Duration, "duration");
property_value!(Period, Period, "period");

/// The untyped escape hatch; accepted by every slot. Dynamic beans use it.
impl PropertyValue for Value {
    fn accepts(_: &ValueType) -> bool {
        true
    }

    fn type_label() -> String {
        "value".to_string()
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> RemotingResult<Self> {
        Ok(value)
    }
}

/// References to other beans.
impl<T: Bean> PropertyValue for Arc<T> {
    fn accepts(value_type: &ValueType) -> bool {
        matches!(value_type, ValueType::Bean(class) if class == T::CLASS_NAME)
    }

    fn type_label() -> String {
        format!("bean<{}>", T::CLASS_NAME)
    }

    fn into_value(self) -> Value {
        Value::Bean(BeanHandle::new(self))
    }

    fn from_value(value: Value) -> RemotingResult<Self> {
        match value {
            Value::Bean(handle) => handle
                .downcast::<T>()
                .ok_or_else(|| RemotingError::mismatch(Self::type_label(), "bean of another type")),
            other => Err(RemotingError::mismatch(Self::type_label(), other.type_name())),
        }
    }
}

/// Live link between a property and one model attribute.
#[derive(Clone)]
pub(crate) struct AttributeBinding {
    pub(crate) store: Arc<dyn ModelStore>,
    pub(crate) model: ModelId,
    pub(crate) attribute: String,
    pub(crate) converter: Arc<dyn Converter>,
}

/// A single-valued bean property.
///
/// Until the bean builder binds it, every access fails with
/// [`RemotingError::Unbound`]. Once bound, reads and writes go straight to
/// the backing attribute; there is no local copy.
pub struct Property<T> {
    binding: Option<AttributeBinding>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Self {
            binding: None,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            Some(b) => write!(f, "Property({}.{})", b.model, b.attribute),
            None => f.write_str("Property(unbound)"),
        }
    }
}

impl<T: PropertyValue> Property<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn binding(&self) -> RemotingResult<&AttributeBinding> {
        self.binding.as_ref().ok_or(RemotingError::Unbound)
    }

    /// Reads the current value; `None` when the attribute is null.
    pub fn get(&self) -> RemotingResult<Option<T>> {
        let b = self.binding()?;
        let wire = b.store.get_attribute(&b.model, &b.attribute)?;
        match b.converter.from_wire(&wire)? {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }

    pub fn set(&self, value: T) -> RemotingResult<()> {
        self.set_value(Some(value))
    }

    /// Writes a value, or null for `None`. A value the converter rejects
    /// leaves the attribute untouched.
    pub fn set_value(&self, value: Option<T>) -> RemotingResult<()> {
        let b = self.binding()?;
        let value = value.map_or(Value::Null, PropertyValue::into_value);
        let wire = b.converter.to_wire(&value)?;
        b.store.set_attribute(&b.model, &b.attribute, wire)?;
        Ok(())
    }

    pub fn clear(&self) -> RemotingResult<()> {
        self.set_value(None)
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub(crate) fn bind(&mut self, binding: AttributeBinding) {
        self.binding = Some(binding);
    }
}
