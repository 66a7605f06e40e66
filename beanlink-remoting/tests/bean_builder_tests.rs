mod common;

use beanlink_remoting::protocol::{ADD_FROM_SERVER, ELEMENT, POS};
use beanlink_remoting::{BeanKind, Property, RemotingError};
use beanlink_store::{ModelStore, StoreError};
use beanlink_types::{ModelId, Value, WireValue};
use common::{
    contact_schema, controller, HalfBound, Misbound, Person, Priority, Seeded, Team, Unbuildable,
    Unfinished,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

// ── Creation ────────────────────────────────────────────────────

#[test]
fn create_backs_bean_with_model() {
    let (store, ctx) = controller();
    let person = ctx.create::<Person>().unwrap();

    let models = store.find_models_by_type("Person");
    assert_eq!(models.len(), 1);
    assert_eq!(ctx.get_id(&person).unwrap(), models[0].id);

    // One null attribute per property, none for the list.
    let names: Vec<&str> = models[0].attribute_names().collect();
    assert_eq!(names, vec!["age", "manager", "name"]);
    assert!(models[0].attributes.iter().all(|a| a.value == WireValue::Null));
}

#[test]
fn properties_read_and_write_the_model() {
    let (store, ctx) = controller();
    let person = ctx.create::<Person>().unwrap();
    let id = ctx.get_id(&person).unwrap();

    assert_eq!(person.name.get().unwrap(), None);
    person.name.set("Ada".to_string()).unwrap();
    person.age.set(36).unwrap();

    assert_eq!(person.name.get().unwrap().as_deref(), Some("Ada"));
    assert_eq!(person.age.get().unwrap(), Some(36));
    assert_eq!(store.get_attribute(&id, "name").unwrap(), WireValue::from("Ada"));
    assert_eq!(store.get_attribute(&id, "age").unwrap(), WireValue::Int(36));

    person.age.clear().unwrap();
    assert_eq!(person.age.get().unwrap(), None);
}

#[test]
fn reference_property_stores_model_id() {
    let (store, ctx) = controller();
    let boss = ctx.create::<Person>().unwrap();
    let worker = ctx.create::<Person>().unwrap();

    worker.manager.set(Arc::clone(&boss)).unwrap();

    let boss_id = ctx.get_id(&boss).unwrap();
    let worker_id = ctx.get_id(&worker).unwrap();
    assert_eq!(
        store.get_attribute(&worker_id, "manager").unwrap(),
        WireValue::from(boss_id.as_str())
    );
    assert!(Arc::ptr_eq(&worker.manager.get().unwrap().unwrap(), &boss));
}

#[test]
fn reference_to_unmanaged_bean_leaves_attribute_untouched() {
    let (store, ctx) = controller();
    let worker = ctx.create::<Person>().unwrap();
    let id = ctx.get_id(&worker).unwrap();

    let err = worker.manager.set(Arc::new(Person::default())).unwrap_err();
    assert!(matches!(err, RemotingError::NotManaged(_)), "{err}");
    assert_eq!(store.get_attribute(&id, "manager").unwrap(), WireValue::Null);
}

#[test]
fn enum_property_round_trips() {
    let (store, ctx) = controller();
    let team = ctx.create::<Team>().unwrap();
    team.priority.set(Priority::High).unwrap();

    let id = ctx.get_id(&team).unwrap();
    assert_eq!(store.get_attribute(&id, "priority").unwrap(), WireValue::from("HIGH"));
    assert_eq!(team.priority.get().unwrap(), Some(Priority::High));
}

#[test]
fn unbound_property_is_an_error() {
    let property: Property<String> = Property::new();
    assert!(!property.is_bound());
    assert!(matches!(property.get(), Err(RemotingError::Unbound)));
    assert!(matches!(property.set("x".to_string()), Err(RemotingError::Unbound)));
}

// ── Failures ────────────────────────────────────────────────────

#[test]
fn failed_instantiation_leaves_no_model() {
    let (store, ctx) = controller();
    let err = ctx.create::<Unbuildable>().unwrap_err();
    assert!(matches!(err, RemotingError::Construction { .. }), "{err}");
    assert!(store.find_models_by_type("Unbuildable").is_empty());
    assert!(ctx.beans().is_empty());
}

#[test]
fn unbound_slot_rolls_back_model() {
    let (store, ctx) = controller();
    let err = ctx.create::<HalfBound>().unwrap_err();
    match err {
        RemotingError::Construction { reason, .. } => assert!(reason.contains("second"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.find_models_by_type("HalfBound").is_empty());
    assert!(ctx.beans().is_empty());
}

#[test]
fn wrongly_typed_slot_is_rejected() {
    let (store, ctx) = controller();
    let err = ctx.create::<Misbound>().unwrap_err();
    assert!(matches!(err, RemotingError::KindMismatch { .. }), "{err}");
    assert!(store.find_models_by_type("Misbound").is_empty());
}

// ── Lists ───────────────────────────────────────────────────────

#[test]
fn prepopulated_list_is_announced() {
    let (store, ctx) = controller();
    let seeded = ctx.create::<Seeded>().unwrap();
    assert!(seeded.numbers.is_bound());

    let records = store.find_models_by_type(ADD_FROM_SERVER);
    let added: Vec<(WireValue, WireValue)> = records
        .iter()
        .map(|r| {
            (
                r.attribute(POS).cloned().unwrap(),
                r.attribute(ELEMENT).cloned().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        added,
        vec![
            (WireValue::Int(0), WireValue::Int(1)),
            (WireValue::Int(1), WireValue::Int(2)),
            (WireValue::Int(2), WireValue::Int(3)),
        ]
    );
}

#[test]
fn failed_creation_announces_nothing() {
    let (store, ctx) = controller();
    let err = ctx.create::<Unfinished>().unwrap_err();
    assert!(err.to_string().contains("label"), "{err}");
    assert!(store.find_models_by_type("Unfinished").is_empty());
    assert!(store.find_models_by_type(ADD_FROM_SERVER).is_empty());
}

#[test]
fn pushes_follow_the_announcement() {
    let (store, ctx) = controller();
    let seeded = ctx.create::<Seeded>().unwrap();
    seeded.numbers.push(4).unwrap();
    let positions: Vec<WireValue> = store
        .find_models_by_type(ADD_FROM_SERVER)
        .iter()
        .map(|r| r.attribute(POS).cloned().unwrap())
        .collect();
    assert_eq!(positions, (0..4).map(WireValue::Int).collect::<Vec<_>>());
}

#[test]
fn empty_list_announces_nothing() {
    let (store, ctx) = controller();
    ctx.create::<Person>().unwrap();
    assert!(store.find_models_by_type(ADD_FROM_SERVER).is_empty());
}

#[test]
fn bean_list_rejects_unmanaged_element() {
    let (store, ctx) = controller();
    let team = ctx.create::<Team>().unwrap();
    let before = store.model_count();

    let err = team.members.push(Arc::new(Person::default())).unwrap_err();
    assert!(matches!(err, RemotingError::NotManaged(_)), "{err}");
    assert!(team.members.is_empty());
    assert_eq!(store.model_count(), before);
}

// ── Materialization ─────────────────────────────────────────────

#[test]
fn materialize_adopts_existing_model() {
    let (store, ctx) = controller();
    let person = ctx.create::<Person>().unwrap();
    person.name.set("Grace".to_string()).unwrap();
    let id = ctx.get_id(&person).unwrap();
    ctx.beans().forget(&id).unwrap();

    let twin = ctx.builder().materialize::<Person>(&id).unwrap();
    assert_eq!(twin.name.get().unwrap().as_deref(), Some("Grace"));
    assert_eq!(ctx.get_id(&twin).unwrap(), id);
    assert_eq!(store.find_models_by_type("Person").len(), 1);
}

#[test]
fn materialized_lists_start_empty() {
    let (store, ctx) = controller();
    let seeded = ctx.create::<Seeded>().unwrap();
    let id = ctx.get_id(&seeded).unwrap();
    ctx.beans().forget(&id);
    let announced = store.find_models_by_type(ADD_FROM_SERVER).len();

    let twin = ctx.builder().materialize::<Seeded>(&id).unwrap();
    assert!(twin.numbers.is_empty());
    assert_eq!(store.find_models_by_type(ADD_FROM_SERVER).len(), announced);

    twin.numbers.push(9).unwrap();
    assert_eq!(store.find_models_by_type(ADD_FROM_SERVER).len(), announced + 1);
}

#[test]
fn materialize_checks_model() {
    let (_store, ctx) = controller();
    let err = ctx
        .builder()
        .materialize::<Person>(&ModelId::new("missing"))
        .unwrap_err();
    assert!(
        matches!(err, RemotingError::Store(StoreError::ModelNotFound(_))),
        "{err}"
    );

    let team = ctx.create::<Team>().unwrap();
    let team_id = ctx.get_id(&team).unwrap();
    let err = ctx.builder().materialize::<Person>(&team_id).unwrap_err();
    assert!(matches!(err, RemotingError::TypeMismatch { .. }), "{err}");
}

// ── Dynamic beans ───────────────────────────────────────────────

#[test]
fn dynamic_bean_reads_and_writes() {
    let (store, ctx) = controller();
    let contact = ctx.create_dynamic(&contact_schema()).unwrap();
    let id = ctx.get_id(&contact).unwrap();

    assert_eq!(contact.class_name(), "Contact");
    assert_eq!(ctx.beans().kind_of(&id), Some(BeanKind::Virtual));
    assert_eq!(contact.get("email").unwrap(), Value::Null);

    contact.set("email", "ada@example.com").unwrap();
    contact.set("score", 4.5).unwrap();
    assert_eq!(contact.get("email").unwrap(), Value::from("ada@example.com"));
    assert_eq!(store.get_attribute(&id, "score").unwrap(), WireValue::Double(4.5));

    contact.list("phones").unwrap().push(Value::from("555-0100")).unwrap();
    assert_eq!(contact.list("phones").unwrap().len(), 1);
}

#[test]
fn dynamic_bean_rejects_bad_names_and_types() {
    let (store, ctx) = controller();
    let contact = ctx.create_dynamic(&contact_schema()).unwrap();
    let id = ctx.get_id(&contact).unwrap();

    let err = contact.get("phone").unwrap_err();
    assert!(matches!(err, RemotingError::UnknownAttribute { .. }), "{err}");
    assert!(contact.list("email").is_err());

    let err = contact.set("score", "high").unwrap_err();
    assert!(matches!(err, RemotingError::TypeMismatch { .. }), "{err}");
    assert_eq!(store.get_attribute(&id, "score").unwrap(), WireValue::Null);
}

#[test]
fn dynamic_beans_are_found_by_class() {
    let (_store, ctx) = controller();
    let first = ctx.create_dynamic(&contact_schema()).unwrap();
    let second = ctx.create_dynamic(&contact_schema()).unwrap();
    ctx.create::<Person>().unwrap();

    let all = ctx.find_all_dynamic("Contact");
    assert_eq!(all.len(), 2);
    assert!(Arc::ptr_eq(&all[0], &first));
    assert!(Arc::ptr_eq(&all[1], &second));

    let id = ctx.get_id(&second).unwrap();
    assert!(Arc::ptr_eq(&ctx.find_dynamic_by_id(&id).unwrap(), &second));
}
