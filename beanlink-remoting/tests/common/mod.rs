//! Shared beans and helpers for remoting tests.

#![allow(dead_code)]

use beanlink_remoting::{
    Bean, Binder, ClassSchema, ObservableList, Property, PropertyValue, RemotingConfig,
    RemotingContext, RemotingError, RemotingResult,
};
use beanlink_store::{InMemoryModelStore, ModelStore, StoreSubscription, TypeFilter};
use beanlink_types::{Value, ValueType};
use std::sync::Arc;

// ── Beans ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Person {
    pub name: Property<String>,
    pub age: Property<i32>,
    pub manager: Property<Arc<Person>>,
    pub tags: ObservableList<String>,
}

impl Bean for Person {
    const CLASS_NAME: &'static str = "Person";

    fn schema() -> ClassSchema {
        ClassSchema::new(Self::CLASS_NAME)
            .property("name", ValueType::Text)
            .property("age", ValueType::Int)
            .reference("manager", Self::CLASS_NAME)
            .list("tags", ValueType::Text)
    }

    fn instantiate() -> RemotingResult<Self> {
        Ok(Self::default())
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()> {
        binder.property("name", &mut self.name)?;
        binder.property("age", &mut self.age)?;
        binder.property("manager", &mut self.manager)?;
        binder.list("tags", &self.tags)
    }
}

pub const PRIORITIES: &[&str] = &["LOW", "HIGH"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    High,
}

impl PropertyValue for Priority {
    fn accepts(value_type: &ValueType) -> bool {
        *value_type == ValueType::Enum(PRIORITIES)
    }

    fn type_label() -> String {
        "Priority".to_string()
    }

    fn into_value(self) -> Value {
        match self {
            Priority::Low => Value::Enum("LOW".to_string()),
            Priority::High => Value::Enum("HIGH".to_string()),
        }
    }

    fn from_value(value: Value) -> RemotingResult<Self> {
        match value {
            Value::Enum(name) if name == "LOW" => Ok(Priority::Low),
            Value::Enum(name) if name == "HIGH" => Ok(Priority::High),
            other => Err(RemotingError::TypeMismatch {
                expected: "Priority".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct Team {
    pub title: Property<String>,
    pub priority: Property<Priority>,
    pub members: ObservableList<Arc<Person>>,
}

impl Bean for Team {
    const CLASS_NAME: &'static str = "Team";

    fn schema() -> ClassSchema {
        ClassSchema::new(Self::CLASS_NAME)
            .property("title", ValueType::Text)
            .property("priority", ValueType::Enum(PRIORITIES))
            .list("members", ValueType::bean(Person::CLASS_NAME))
    }

    fn instantiate() -> RemotingResult<Self> {
        Ok(Self::default())
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()> {
        binder.property("title", &mut self.title)?;
        binder.property("priority", &mut self.priority)?;
        binder.list("members", &self.members)
    }
}

/// A bean whose lists start out populated.
#[derive(Debug)]
pub struct Seeded {
    pub numbers: ObservableList<i64>,
}

impl Bean for Seeded {
    const CLASS_NAME: &'static str = "Seeded";

    fn schema() -> ClassSchema {
        ClassSchema::new(Self::CLASS_NAME).list("numbers", ValueType::Long)
    }

    fn instantiate() -> RemotingResult<Self> {
        Ok(Self {
            numbers: ObservableList::from_vec(vec![1, 2, 3]),
        })
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()> {
        binder.list("numbers", &self.numbers)
    }
}

/// A bean that cannot be instantiated.
#[derive(Debug)]
pub struct Unbuildable;

impl Bean for Unbuildable {
    const CLASS_NAME: &'static str = "Unbuildable";

    fn schema() -> ClassSchema {
        ClassSchema::new(Self::CLASS_NAME).property("value", ValueType::Text)
    }

    fn instantiate() -> RemotingResult<Self> {
        Err(RemotingError::Construction {
            class: Self::CLASS_NAME.to_string(),
            reason: "no usable constructor".to_string(),
        })
    }

    fn bind(&mut self, _binder: &mut Binder<'_>) -> RemotingResult<()> {
        Ok(())
    }
}

/// A bean that forgets to bind one of its slots.
#[derive(Debug, Default)]
pub struct HalfBound {
    pub first: Property<String>,
}

impl Bean for HalfBound {
    const CLASS_NAME: &'static str = "HalfBound";

    fn schema() -> ClassSchema {
        ClassSchema::new(Self::CLASS_NAME)
            .property("first", ValueType::Text)
            .property("second", ValueType::Text)
    }

    fn instantiate() -> RemotingResult<Self> {
        Ok(Self::default())
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()> {
        binder.property("first", &mut self.first)
    }
}

/// A bean with a populated list that forgets to bind its property.
#[derive(Debug)]
pub struct Unfinished {
    pub numbers: ObservableList<i64>,
    pub label: Property<String>,
}

impl Bean for Unfinished {
    const CLASS_NAME: &'static str = "Unfinished";

    fn schema() -> ClassSchema {
        ClassSchema::new(Self::CLASS_NAME)
            .property("label", ValueType::Text)
            .list("numbers", ValueType::Long)
    }

    fn instantiate() -> RemotingResult<Self> {
        Ok(Self {
            numbers: ObservableList::from_vec(vec![1, 2]),
            label: Property::new(),
        })
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()> {
        binder.list("numbers", &self.numbers)
    }
}

/// A bean that binds a text slot as an integer.
#[derive(Debug, Default)]
pub struct Misbound {
    pub value: Property<i32>,
}

impl Bean for Misbound {
    const CLASS_NAME: &'static str = "Misbound";

    fn schema() -> ClassSchema {
        ClassSchema::new(Self::CLASS_NAME).property("value", ValueType::Text)
    }

    fn instantiate() -> RemotingResult<Self> {
        Ok(Self::default())
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()> {
        binder.property("value", &mut self.value)
    }
}

pub fn contact_schema() -> ClassSchema {
    ClassSchema::new("Contact")
        .property("email", ValueType::Text)
        .property("score", ValueType::Double)
        .list("phones", ValueType::Text)
}

// ── Contexts ────────────────────────────────────────────────────

/// Routes log output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn store() -> Arc<InMemoryModelStore> {
    Arc::new(InMemoryModelStore::new())
}

pub fn context(store: &Arc<InMemoryModelStore>, config: RemotingConfig) -> RemotingContext {
    let store: Arc<dyn ModelStore> = store.clone();
    RemotingContext::new(store, config)
}

pub fn controller() -> (Arc<InMemoryModelStore>, RemotingContext) {
    let store = store();
    let context = context(&store, RemotingConfig::controller());
    (store, context)
}

/// Two stores joined the way a transport joins them: each side's local
/// changes are replayed on the other as remote changes.
pub struct Link {
    left: Arc<InMemoryModelStore>,
    right: Arc<InMemoryModelStore>,
    left_rx: StoreSubscription,
    right_rx: StoreSubscription,
}

impl Link {
    pub fn new(left: &Arc<InMemoryModelStore>, right: &Arc<InMemoryModelStore>) -> Self {
        Self {
            left_rx: left.subscribe(TypeFilter::All),
            right_rx: right.subscribe(TypeFilter::All),
            left: Arc::clone(left),
            right: Arc::clone(right),
        }
    }

    /// Forwards changes and lets both contexts react until nothing moves.
    pub fn settle(&mut self, left: &RemotingContext, right: &RemotingContext) {
        loop {
            let mut moved = forward(&mut self.left_rx, &self.right);
            moved += forward(&mut self.right_rx, &self.left);
            moved += left.process_pending();
            moved += right.process_pending();
            if moved == 0 {
                break;
            }
        }
    }
}

fn forward(rx: &mut StoreSubscription, to: &InMemoryModelStore) -> usize {
    let mut forwarded = 0;
    while let Ok(event) = rx.try_recv() {
        if let Some(change) = event.to_remote_change() {
            to.apply_remote(change).expect("peer store rejected change");
            forwarded += 1;
        }
    }
    forwarded
}

/// A controller and a presentation context over linked stores.
pub struct Pair {
    pub controller_store: Arc<InMemoryModelStore>,
    pub presentation_store: Arc<InMemoryModelStore>,
    pub controller: RemotingContext,
    pub presentation: RemotingContext,
    pub link: Link,
}

impl Pair {
    pub fn new() -> Self {
        let controller_store = store();
        let presentation_store = store();
        let link = Link::new(&controller_store, &presentation_store);
        let controller = context(&controller_store, RemotingConfig::controller());
        let presentation = context(&presentation_store, RemotingConfig::presentation());
        Self {
            controller_store,
            presentation_store,
            controller,
            presentation,
            link,
        }
    }

    pub fn settle(&mut self) {
        self.link.settle(&self.controller, &self.presentation);
    }
}
