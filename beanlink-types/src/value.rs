//! Domain values carried by bean properties and list elements.
//!
//! [`Value`] is what application code reads and writes; [`ValueType`] is the
//! declared type of a property slot. The remoting layer converts between
//! `Value` and the store's [`WireValue`](crate::WireValue) through a
//! converter selected by the slot's `ValueType`.

use crate::{Error, Period};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// Type-erased handle to a bean instance.
///
/// Equality and hashing are by instance identity, never by content: two
/// handles are equal only if they point at the same allocation.
#[derive(Clone)]
pub struct BeanHandle(Arc<dyn Any + Send + Sync>);

impl BeanHandle {
    /// Wraps a typed bean.
    pub fn new<T: Any + Send + Sync>(bean: Arc<T>) -> Self {
        Self(bean)
    }

    /// Wraps an already type-erased bean.
    pub fn from_any(bean: Arc<dyn Any + Send + Sync>) -> Self {
        Self(bean)
    }

    /// Returns the identity key of a typed bean, matching [`BeanHandle::key`]
    /// for a handle built from the same `Arc`.
    pub fn key_of<T: ?Sized>(bean: &Arc<T>) -> usize {
        Arc::as_ptr(bean) as *const () as usize
    }

    /// Returns the identity key of this handle.
    #[must_use]
    pub fn key(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Recovers the typed bean, if the handle holds a `T`.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    /// Returns true if the handle holds a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        (*self.0).type_id() == std::any::TypeId::of::<T>()
    }
}

impl PartialEq for BeanHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for BeanHandle {}

impl Hash for BeanHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for BeanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BeanHandle({:#x})", self.key())
    }
}

/// A domain value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Text(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    LocalDateTime(NaiveDateTime),
    Duration(TimeDelta),
    Period(Period),
    /// Name of an enum variant.
    Enum(String),
    /// Reference to another managed bean.
    Bean(BeanHandle),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::DateTime(_) => "datetime",
            Value::LocalDateTime(_) => "local_datetime",
            Value::Duration(_) => "duration",
            Value::Period(_) => "period",
            Value::Enum(_) => "enum",
            Value::Bean(_) => "bean",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<BeanHandle> for Value {
    fn from(v: BeanHandle) -> Self {
        Value::Bean(v)
    }
}

/// Declared type of a property slot or list element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Long,
    Double,
    Text,
    Uuid,
    DateTime,
    LocalDateTime,
    Duration,
    Period,
    /// String-backed enum with a fixed set of variant names.
    Enum(&'static [&'static str]),
    /// Reference to a bean of the named class.
    Bean(String),
}

impl ValueType {
    /// Shorthand for a bean reference to `class_name`.
    pub fn bean(class_name: impl Into<String>) -> Self {
        ValueType::Bean(class_name.into())
    }

    /// The wire-level field type published in class models.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            ValueType::Bool => FieldType::Bool,
            ValueType::Int => FieldType::Int,
            ValueType::Long => FieldType::Long,
            ValueType::Double => FieldType::Double,
            ValueType::Text => FieldType::Text,
            ValueType::Uuid => FieldType::Uuid,
            ValueType::DateTime => FieldType::DateTime,
            ValueType::LocalDateTime => FieldType::LocalDateTime,
            ValueType::Duration => FieldType::Duration,
            ValueType::Period => FieldType::Period,
            ValueType::Enum(_) => FieldType::Enum,
            ValueType::Bean(_) => FieldType::Bean,
        }
    }

    /// Returns true if values of this type are bean references.
    #[must_use]
    pub fn is_bean_reference(&self) -> bool {
        matches!(self, ValueType::Bean(_))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Enum(variants) => write!(f, "enum[{}]", variants.join("|")),
            ValueType::Bean(class) => write!(f, "bean<{class}>"),
            other => f.write_str(other.field_type().name()),
        }
    }
}

/// Field type codes shared by both sides of a connection.
///
/// The numeric codes are part of the class-model format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Int,
    Long,
    Double,
    Text,
    Uuid,
    DateTime,
    LocalDateTime,
    Duration,
    Period,
    Enum,
    Bean,
    List,
}

impl FieldType {
    /// Numeric code used in class models.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            FieldType::Bool => 1,
            FieldType::Int => 2,
            FieldType::Long => 3,
            FieldType::Double => 4,
            FieldType::Text => 5,
            FieldType::Uuid => 6,
            FieldType::DateTime => 7,
            FieldType::LocalDateTime => 8,
            FieldType::Duration => 9,
            FieldType::Period => 10,
            FieldType::Enum => 11,
            FieldType::Bean => 12,
            FieldType::List => 20,
        }
    }

    /// Inverse of [`FieldType::code`].
    pub fn from_code(code: i64) -> Result<Self, Error> {
        Ok(match code {
            1 => FieldType::Bool,
            2 => FieldType::Int,
            3 => FieldType::Long,
            4 => FieldType::Double,
            5 => FieldType::Text,
            6 => FieldType::Uuid,
            7 => FieldType::DateTime,
            8 => FieldType::LocalDateTime,
            9 => FieldType::Duration,
            10 => FieldType::Period,
            11 => FieldType::Enum,
            12 => FieldType::Bean,
            20 => FieldType::List,
            other => return Err(Error::UnknownFieldType(other)),
        })
    }

    /// Lower-case name, as used in serialized form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Text => "text",
            FieldType::Uuid => "uuid",
            FieldType::DateTime => "datetime",
            FieldType::LocalDateTime => "local_datetime",
            FieldType::Duration => "duration",
            FieldType::Period => "period",
            FieldType::Enum => "enum",
            FieldType::Bean => "bean",
            FieldType::List => "list",
        }
    }
}
