//! Value converters.
//!
//! A converter translates a domain [`Value`] of one declared type to and
//! from the store's [`WireValue`]. Every converter maps null to null in both
//! directions and rejects values of any other type with
//! [`RemotingError::TypeMismatch`]; nothing is coerced.
//!
//! | value type      | wire form                              |
//! |-----------------|----------------------------------------|
//! | bool            | `Bool`                                 |
//! | int, long       | `Int`                                  |
//! | double          | `Double`                               |
//! | text            | `Text`                                 |
//! | uuid            | `Text`, hyphenated                     |
//! | datetime        | `Text`, RFC 3339 in UTC                |
//! | local datetime  | `Text`, `YYYY-MM-DDTHH:MM:SS[.f]`      |
//! | duration        | `Text`, `[-]PT<secs>.<nanos>S`         |
//! | period          | `Text`, `P[nY][nM][nD]`                |
//! | enum            | `Text`, the variant name               |
//! | bean reference  | `Text`, the referenced model id        |
//!
//! A reference to a model id with no managed bean, such as a deleted one,
//! decodes as null.

use crate::bean_repository::BeanRepository;
use crate::error::{RemotingError, RemotingResult};
use beanlink_types::{FieldType, ModelId, Period, Value, ValueType, WireValue};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;
use uuid::Uuid;

const LOCAL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Translates values of one type to and from their wire form.
pub trait Converter: Send + Sync {
    /// Encodes a domain value.
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue>;

    /// Decodes a wire value.
    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value>;
}

/// Registry of converters keyed by value type.
pub struct Converters {
    builtins: HashMap<FieldType, Arc<dyn Converter>>,
    beans: Weak<BeanRepository>,
}

impl Converters {
    /// Creates the registry with every built-in converter. Bean references
    /// resolve through `beans`.
    pub fn new(beans: &Arc<BeanRepository>) -> Self {
        let mut builtins: HashMap<FieldType, Arc<dyn Converter>> = HashMap::new();
        builtins.insert(FieldType::Bool, Arc::new(BoolConverter));
        builtins.insert(FieldType::Int, Arc::new(IntConverter));
        builtins.insert(FieldType::Long, Arc::new(LongConverter));
        builtins.insert(FieldType::Double, Arc::new(DoubleConverter));
        builtins.insert(FieldType::Text, Arc::new(TextConverter));
        builtins.insert(FieldType::Uuid, Arc::new(UuidConverter));
        builtins.insert(FieldType::DateTime, Arc::new(DateTimeConverter));
        builtins.insert(FieldType::LocalDateTime, Arc::new(LocalDateTimeConverter));
        builtins.insert(FieldType::Duration, Arc::new(DurationConverter));
        builtins.insert(FieldType::Period, Arc::new(PeriodConverter));
        Self {
            builtins,
            beans: Arc::downgrade(beans),
        }
    }

    /// Replaces the converter used for a field type.
    ///
    /// Enum and bean-reference converters are parameterized by their value
    /// type and cannot be replaced here.
    pub fn register(&mut self, field_type: FieldType, converter: Arc<dyn Converter>) {
        self.builtins.insert(field_type, converter);
    }

    /// Returns the converter for a value type.
    pub fn get_converter(&self, value_type: &ValueType) -> Arc<dyn Converter> {
        match value_type {
            ValueType::Enum(variants) => Arc::new(EnumConverter { variants }),
            ValueType::Bean(class) => Arc::new(BeanReferenceConverter {
                class: class.clone(),
                beans: Weak::clone(&self.beans),
            }),
            other => match self.builtins.get(&other.field_type()) {
                Some(converter) => Arc::clone(converter),
                None => Arc::new(UnsupportedConverter {
                    value_type: other.clone(),
                }),
            },
        }
    }
}

struct BoolConverter;

impl Converter for BoolConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Bool(b) => Ok(WireValue::Bool(*b)),
            other => Err(RemotingError::mismatch("bool", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            WireValue::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(RemotingError::mismatch("bool", other.type_name())),
        }
    }
}

struct IntConverter;

impl Converter for IntConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Int(i) => Ok(WireValue::Int(i64::from(*i))),
            other => Err(RemotingError::mismatch("int", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            WireValue::Int(i) => i32::try_from(*i)
                .map(Value::Int)
                .map_err(|_| RemotingError::invalid_wire("int", i)),
            other => Err(RemotingError::mismatch("int", other.type_name())),
        }
    }
}

struct LongConverter;

impl Converter for LongConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Long(i) => Ok(WireValue::Int(*i)),
            other => Err(RemotingError::mismatch("long", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            WireValue::Int(i) => Ok(Value::Long(*i)),
            other => Err(RemotingError::mismatch("long", other.type_name())),
        }
    }
}

struct DoubleConverter;

impl Converter for DoubleConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Double(d) => Ok(WireValue::Double(*d)),
            other => Err(RemotingError::mismatch("double", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            WireValue::Double(d) => Ok(Value::Double(*d)),
            other => Err(RemotingError::mismatch("double", other.type_name())),
        }
    }
}

struct TextConverter;

impl Converter for TextConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Text(s) => Ok(WireValue::Text(s.clone())),
            other => Err(RemotingError::mismatch("text", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            WireValue::Text(s) => Ok(Value::Text(s.clone())),
            other => Err(RemotingError::mismatch("text", other.type_name())),
        }
    }
}

/// Shared decode path for converters whose wire form is text.
fn decode_text<F>(wire: &WireValue, expected: &str, parse: F) -> RemotingResult<Value>
where
    F: FnOnce(&str) -> Option<Value>,
{
    match wire {
        WireValue::Null => Ok(Value::Null),
        WireValue::Text(s) => parse(s).ok_or_else(|| RemotingError::invalid_wire(expected, s)),
        other => Err(RemotingError::mismatch(expected, other.type_name())),
    }
}

struct UuidConverter;

impl Converter for UuidConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Uuid(u) => Ok(WireValue::Text(u.hyphenated().to_string())),
            other => Err(RemotingError::mismatch("uuid", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        decode_text(wire, "uuid", |s| Uuid::parse_str(s).ok().map(Value::Uuid))
    }
}

struct DateTimeConverter;

impl Converter for DateTimeConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::DateTime(dt) => Ok(WireValue::Text(
                dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            other => Err(RemotingError::mismatch("datetime", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        decode_text(wire, "datetime", |s| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
        })
    }
}

struct LocalDateTimeConverter;

impl Converter for LocalDateTimeConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::LocalDateTime(dt) => {
                Ok(WireValue::Text(dt.format(LOCAL_DATETIME_FORMAT).to_string()))
            }
            other => Err(RemotingError::mismatch("local_datetime", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        decode_text(wire, "local_datetime", |s| {
            NaiveDateTime::parse_from_str(s, LOCAL_DATETIME_FORMAT)
                .ok()
                .map(Value::LocalDateTime)
        })
    }
}

struct DurationConverter;

impl DurationConverter {
    fn encode(delta: TimeDelta) -> String {
        let negative = delta < TimeDelta::zero();
        let magnitude = if negative { -delta } else { delta };
        format!(
            "{}PT{}.{:09}S",
            if negative { "-" } else { "" },
            magnitude.num_seconds(),
            magnitude.subsec_nanos()
        )
    }

    fn decode(s: &str) -> Option<TimeDelta> {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let body = body.strip_prefix("PT")?.strip_suffix('S')?;
        let (secs, nanos) = body.split_once('.')?;
        if nanos.len() != 9 || secs.starts_with(['-', '+']) {
            return None;
        }
        let secs: i64 = secs.parse().ok()?;
        let nanos: u32 = nanos.parse().ok()?;
        let magnitude = TimeDelta::new(secs, nanos)?;
        Some(if negative { -magnitude } else { magnitude })
    }
}

impl Converter for DurationConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Duration(d) => Ok(WireValue::Text(Self::encode(*d))),
            other => Err(RemotingError::mismatch("duration", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        decode_text(wire, "duration", |s| Self::decode(s).map(Value::Duration))
    }
}

struct PeriodConverter;

impl Converter for PeriodConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Period(p) => Ok(WireValue::Text(p.to_string())),
            other => Err(RemotingError::mismatch("period", other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        decode_text(wire, "period", |s| s.parse::<Period>().ok().map(Value::Period))
    }
}

struct EnumConverter {
    variants: &'static [&'static str],
}

impl EnumConverter {
    fn expected(&self) -> String {
        ValueType::Enum(self.variants).to_string()
    }
}

impl Converter for EnumConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Enum(name) if self.variants.contains(&name.as_str()) => {
                Ok(WireValue::Text(name.clone()))
            }
            Value::Enum(name) => Err(RemotingError::mismatch(self.expected(), name)),
            other => Err(RemotingError::mismatch(self.expected(), other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        decode_text(wire, &self.expected(), |s| {
            self.variants
                .contains(&s)
                .then(|| Value::Enum(s.to_string()))
        })
    }
}

/// Converts bean references to model ids and back through the bean
/// repository, so the wire only ever carries identities.
struct BeanReferenceConverter {
    class: String,
    beans: Weak<BeanRepository>,
}

impl BeanReferenceConverter {
    fn repository(&self) -> RemotingResult<Arc<BeanRepository>> {
        self.beans.upgrade().ok_or(RemotingError::Closed)
    }

    fn expected(&self) -> String {
        ValueType::Bean(self.class.clone()).to_string()
    }
}

impl Converter for BeanReferenceConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            Value::Bean(handle) => {
                let beans = self.repository()?;
                let (id, class) = beans.describe_handle(handle)?;
                if class != self.class {
                    return Err(RemotingError::mismatch(self.expected(), format!("bean<{class}>")));
                }
                Ok(WireValue::Text(id.into_string()))
            }
            other => Err(RemotingError::mismatch(self.expected(), other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            WireValue::Text(id) => {
                let beans = self.repository()?;
                let id = ModelId::new(id.as_str());
                match beans.get_bean(&id) {
                    Some(handle) => Ok(Value::Bean(handle)),
                    None => {
                        debug!("Reference to unmanaged bean {} reads as null", id);
                        Ok(Value::Null)
                    }
                }
            }
            other => Err(RemotingError::mismatch(self.expected(), other.type_name())),
        }
    }
}

/// Stands in for a field type whose converter was never registered.
struct UnsupportedConverter {
    value_type: ValueType,
}

impl Converter for UnsupportedConverter {
    fn to_wire(&self, value: &Value) -> RemotingResult<WireValue> {
        match value {
            Value::Null => Ok(WireValue::Null),
            other => Err(RemotingError::mismatch(&self.value_type, other.type_name())),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> RemotingResult<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            other => Err(RemotingError::mismatch(&self.value_type, other.type_name())),
        }
    }
}
