mod common;

use beanlink_remoting::{BeanRepository, Converter, Converters, RemotingError};
use beanlink_store::{InMemoryModelStore, ModelStore};
use beanlink_types::{BeanHandle, FieldType, Period, Value, ValueType, WireValue};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use common::{controller, Person, PRIORITIES};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

fn converters() -> (Arc<BeanRepository>, Converters) {
    let store: Arc<dyn ModelStore> = Arc::new(InMemoryModelStore::new());
    let beans = Arc::new(BeanRepository::new(store));
    let converters = Converters::new(&beans);
    (beans, converters)
}

fn round_trip(value_type: &ValueType, value: Value) -> Value {
    let (_beans, converters) = converters();
    let converter = converters.get_converter(value_type);
    let wire = converter.to_wire(&value).unwrap();
    converter.from_wire(&wire).unwrap()
}

// ── Null ────────────────────────────────────────────────────────

#[test]
fn null_maps_to_null_for_every_type() {
    let (_beans, converters) = converters();
    let types = [
        ValueType::Bool,
        ValueType::Int,
        ValueType::Long,
        ValueType::Double,
        ValueType::Text,
        ValueType::Uuid,
        ValueType::DateTime,
        ValueType::LocalDateTime,
        ValueType::Duration,
        ValueType::Period,
        ValueType::Enum(PRIORITIES),
        ValueType::bean("Person"),
    ];
    for value_type in &types {
        let converter = converters.get_converter(value_type);
        assert_eq!(converter.to_wire(&Value::Null).unwrap(), WireValue::Null, "{value_type}");
        assert_eq!(converter.from_wire(&WireValue::Null).unwrap(), Value::Null, "{value_type}");
    }
}

// ── Wire forms ──────────────────────────────────────────────────

#[test]
fn primitives_use_native_wire_variants() {
    let (_beans, converters) = converters();
    let cases = [
        (ValueType::Bool, Value::Bool(true), WireValue::Bool(true)),
        (ValueType::Int, Value::Int(-7), WireValue::Int(-7)),
        (ValueType::Long, Value::Long(1 << 40), WireValue::Int(1 << 40)),
        (ValueType::Double, Value::Double(2.5), WireValue::Double(2.5)),
        (ValueType::Text, Value::from("hi"), WireValue::from("hi")),
    ];
    for (value_type, value, wire) in cases {
        assert_eq!(converters.get_converter(&value_type).to_wire(&value).unwrap(), wire);
    }
}

#[test]
fn uuid_is_hyphenated_text() {
    let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let (_beans, converters) = converters();
    let wire = converters
        .get_converter(&ValueType::Uuid)
        .to_wire(&Value::Uuid(id))
        .unwrap();
    assert_eq!(wire, WireValue::from("67e55044-10b1-426f-9247-bb680e5fe0c8"));
}

#[test]
fn datetime_is_rfc3339_utc() {
    let at = DateTime::parse_from_rfc3339("2024-03-01T12:30:00+02:00")
        .unwrap()
        .with_timezone(&Utc);
    let (_beans, converters) = converters();
    let wire = converters
        .get_converter(&ValueType::DateTime)
        .to_wire(&Value::DateTime(at))
        .unwrap();
    assert_eq!(wire, WireValue::from("2024-03-01T10:30:00Z"));
}

#[test]
fn local_datetime_has_no_offset() {
    let at = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_milli_opt(8, 15, 0, 250)
        .unwrap();
    let (_beans, converters) = converters();
    let wire = converters
        .get_converter(&ValueType::LocalDateTime)
        .to_wire(&Value::LocalDateTime(at))
        .unwrap();
    assert_eq!(wire, WireValue::from("2024-03-01T08:15:00.250"));
}

#[test]
fn duration_text_form() {
    let (_beans, converters) = converters();
    let converter = converters.get_converter(&ValueType::Duration);
    let positive = TimeDelta::milliseconds(1_500);
    assert_eq!(
        converter.to_wire(&Value::Duration(positive)).unwrap(),
        WireValue::from("PT1.500000000S")
    );
    assert_eq!(
        converter.to_wire(&Value::Duration(-positive)).unwrap(),
        WireValue::from("-PT1.500000000S")
    );
}

#[test]
fn period_text_form() {
    let (_beans, converters) = converters();
    let wire = converters
        .get_converter(&ValueType::Period)
        .to_wire(&Value::Period(Period::new(1, 2, 10)))
        .unwrap();
    assert_eq!(wire, WireValue::from("P1Y2M10D"));
}

#[test]
fn enum_is_variant_name() {
    let value = round_trip(&ValueType::Enum(PRIORITIES), Value::Enum("HIGH".to_string()));
    assert_eq!(value, Value::Enum("HIGH".to_string()));
}

// ── Type mismatches ─────────────────────────────────────────────

#[test]
fn to_wire_rejects_other_value_types() {
    let (_beans, converters) = converters();
    let err = converters
        .get_converter(&ValueType::Int)
        .to_wire(&Value::from("12"))
        .unwrap_err();
    assert!(matches!(err, RemotingError::TypeMismatch { .. }), "{err}");

    let err = converters
        .get_converter(&ValueType::Long)
        .to_wire(&Value::Int(12))
        .unwrap_err();
    assert!(matches!(err, RemotingError::TypeMismatch { .. }), "{err}");
}

#[test]
fn from_wire_rejects_other_wire_types() {
    let (_beans, converters) = converters();
    let err = converters
        .get_converter(&ValueType::Bool)
        .from_wire(&WireValue::Int(1))
        .unwrap_err();
    assert!(matches!(err, RemotingError::TypeMismatch { .. }), "{err}");

    let err = converters
        .get_converter(&ValueType::Double)
        .from_wire(&WireValue::Int(1))
        .unwrap_err();
    assert!(matches!(err, RemotingError::TypeMismatch { .. }), "{err}");
}

#[test]
fn int_out_of_range_is_invalid() {
    let (_beans, converters) = converters();
    let err = converters
        .get_converter(&ValueType::Int)
        .from_wire(&WireValue::Int(i64::from(i32::MAX) + 1))
        .unwrap_err();
    assert!(matches!(err, RemotingError::InvalidWireValue { .. }), "{err}");
}

#[test]
fn malformed_text_is_invalid() {
    let (_beans, converters) = converters();
    for value_type in [
        ValueType::Uuid,
        ValueType::DateTime,
        ValueType::LocalDateTime,
        ValueType::Duration,
        ValueType::Period,
    ] {
        let err = converters
            .get_converter(&value_type)
            .from_wire(&WireValue::from("garbage"))
            .unwrap_err();
        assert!(matches!(err, RemotingError::InvalidWireValue { .. }), "{value_type}: {err}");
    }
}

#[test]
fn enum_rejects_unknown_variant() {
    let (_beans, converters) = converters();
    let converter = converters.get_converter(&ValueType::Enum(PRIORITIES));
    assert!(converter.to_wire(&Value::Enum("MEDIUM".to_string())).is_err());
    assert!(converter.from_wire(&WireValue::from("MEDIUM")).is_err());
}

// ── Bean references ─────────────────────────────────────────────

#[test]
fn unmanaged_bean_reference_is_rejected() {
    let (_beans, converters) = converters();
    let handle = BeanHandle::new(Arc::new(Person::default()));
    let err = converters
        .get_converter(&ValueType::bean("Person"))
        .to_wire(&Value::Bean(handle))
        .unwrap_err();
    assert!(matches!(err, RemotingError::NotManaged(_)), "{err}");
}

#[test]
fn unknown_model_id_reads_as_null() {
    let (_beans, converters) = converters();
    let value = converters
        .get_converter(&ValueType::bean("Person"))
        .from_wire(&WireValue::from("no-such-model"))
        .unwrap();
    assert!(value.is_null());
}

#[test]
fn reference_to_deleted_bean_reads_as_null() {
    let (store, ctx) = controller();
    let lead = ctx.create::<Person>().unwrap();
    let dev = ctx.create::<Person>().unwrap();
    dev.manager.set(Arc::clone(&lead)).unwrap();
    let lead_id = ctx.get_id(&lead).unwrap();

    ctx.delete(&lead).unwrap();

    assert!(dev.manager.get().unwrap().is_none());
    // The stale id stays until someone overwrites it.
    let dev_id = ctx.get_id(&dev).unwrap();
    assert_eq!(
        store.get_attribute(&dev_id, "manager").unwrap(),
        WireValue::from(lead_id.as_str())
    );
    let other = ctx.create::<Person>().unwrap();
    dev.manager.set(Arc::clone(&other)).unwrap();
    assert!(Arc::ptr_eq(&dev.manager.get().unwrap().unwrap(), &other));
}

#[test]
fn bean_reference_after_repository_dropped_is_closed() {
    let (beans, converters) = converters();
    let converter = converters.get_converter(&ValueType::bean("Person"));
    drop(beans);
    let err = converter.from_wire(&WireValue::from("any")).unwrap_err();
    assert!(matches!(err, RemotingError::Closed), "{err}");
}

// ── Registry ────────────────────────────────────────────────────

struct ShoutingText;

impl Converter for ShoutingText {
    fn to_wire(&self, value: &Value) -> beanlink_remoting::RemotingResult<WireValue> {
        match value {
            Value::Text(s) => Ok(WireValue::Text(s.to_uppercase())),
            _ => Ok(WireValue::Null),
        }
    }

    fn from_wire(&self, wire: &WireValue) -> beanlink_remoting::RemotingResult<Value> {
        Ok(wire.as_text().map_or(Value::Null, |s| Value::from(s.to_lowercase())))
    }
}

#[test]
fn registered_converter_replaces_builtin() {
    let (_beans, mut converters) = converters();
    converters.register(FieldType::Text, Arc::new(ShoutingText));
    let wire = converters
        .get_converter(&ValueType::Text)
        .to_wire(&Value::from("quiet"))
        .unwrap();
    assert_eq!(wire, WireValue::from("QUIET"));
}

// ── Round-trip law ──────────────────────────────────────────────

proptest! {
    #[test]
    fn int_round_trip(v in any::<i32>()) {
        prop_assert_eq!(round_trip(&ValueType::Int, Value::Int(v)), Value::Int(v));
    }

    #[test]
    fn long_round_trip(v in any::<i64>()) {
        prop_assert_eq!(round_trip(&ValueType::Long, Value::Long(v)), Value::Long(v));
    }

    #[test]
    fn double_round_trip(v in -1.0e12f64..1.0e12) {
        prop_assert_eq!(round_trip(&ValueType::Double, Value::Double(v)), Value::Double(v));
    }

    #[test]
    fn text_round_trip(v in ".*") {
        prop_assert_eq!(round_trip(&ValueType::Text, Value::Text(v.clone())), Value::Text(v));
    }

    #[test]
    fn uuid_round_trip(bytes in any::<[u8; 16]>()) {
        let v = Value::Uuid(Uuid::from_bytes(bytes));
        prop_assert_eq!(round_trip(&ValueType::Uuid, v.clone()), v);
    }

    #[test]
    fn datetime_round_trip(secs in 0i64..4_000_000_000, nanos in 0u32..1_000_000_000) {
        let at = DateTime::from_timestamp(secs, nanos).unwrap();
        let v = Value::DateTime(at);
        prop_assert_eq!(round_trip(&ValueType::DateTime, v.clone()), v);
    }

    #[test]
    fn local_datetime_round_trip(secs in 0i64..4_000_000_000, nanos in 0u32..1_000_000_000) {
        let at = DateTime::from_timestamp(secs, nanos).unwrap().naive_utc();
        let v = Value::LocalDateTime(at);
        prop_assert_eq!(round_trip(&ValueType::LocalDateTime, v.clone()), v);
    }

    #[test]
    fn duration_round_trip(secs in -1_000_000_000i64..1_000_000_000, nanos in 0u32..1_000_000_000) {
        let v = Value::Duration(TimeDelta::new(secs, nanos).unwrap());
        prop_assert_eq!(round_trip(&ValueType::Duration, v.clone()), v);
    }

    #[test]
    fn period_round_trip(years in any::<i32>(), months in any::<i32>(), days in any::<i32>()) {
        let v = Value::Period(Period::new(years, months, days));
        prop_assert_eq!(round_trip(&ValueType::Period, v.clone()), v);
    }
}
