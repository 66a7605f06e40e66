//! The bean contract and the binder that wires bean slots to a model.

use crate::class_repository::{ClassInfo, PropertyInfo};
use crate::error::{RemotingError, RemotingResult};
use crate::list::{ListBinding, ListMapper, ListSlot, ObservableList};
use crate::property::{AttributeBinding, Property, PropertyValue};
use crate::schema::ClassSchema;
use beanlink_store::ModelStore;
use beanlink_types::ModelId;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A type whose state is mirrored through the model store.
///
/// ```
/// use beanlink_remoting::{Bean, Binder, ClassSchema, ObservableList, Property, RemotingResult};
/// use beanlink_types::ValueType;
///
/// #[derive(Default)]
/// struct Person {
///     name: Property<String>,
///     tags: ObservableList<String>,
/// }
///
/// impl Bean for Person {
///     const CLASS_NAME: &'static str = "Person";
///
///     fn schema() -> ClassSchema {
///         ClassSchema::new(Self::CLASS_NAME)
///             .property("name", ValueType::Text)
///             .list("tags", ValueType::Text)
///     }
///
///     fn instantiate() -> RemotingResult<Self> {
///         Ok(Self::default())
///     }
///
///     fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()> {
///         binder.property("name", &mut self.name)?;
///         binder.list("tags", &self.tags)
///     }
/// }
/// ```
pub trait Bean: Any + Send + Sync + Sized {
    /// Class name shared by both sides of a connection.
    const CLASS_NAME: &'static str;

    fn schema() -> ClassSchema;

    /// Creates an unbound instance.
    fn instantiate() -> RemotingResult<Self>;

    /// Hands every declared slot to the binder.
    fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()>;
}

/// Wires the slots of one bean to its backing model.
///
/// Each declared slot must be bound exactly once, with a Rust type its
/// declared value type accepts.
pub struct Binder<'a> {
    store: &'a Arc<dyn ModelStore>,
    mapper: &'a Arc<ListMapper>,
    class: &'a ClassInfo,
    model: &'a ModelId,
    properties: HashSet<String>,
    lists: HashMap<String, Arc<dyn ListSlot>>,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(
        store: &'a Arc<dyn ModelStore>,
        mapper: &'a Arc<ListMapper>,
        class: &'a ClassInfo,
        model: &'a ModelId,
    ) -> Self {
        Self {
            store,
            mapper,
            class,
            model,
            properties: HashSet::new(),
            lists: HashMap::new(),
        }
    }

    /// The id of the model being bound.
    #[must_use]
    pub fn model_id(&self) -> &ModelId {
        self.model
    }

    /// Binds a single-valued property to its attribute.
    pub fn property<T: PropertyValue>(
        &mut self,
        name: &str,
        property: &mut Property<T>,
    ) -> RemotingResult<()> {
        let info = self.slot::<T>(name, self.class.property(name))?;
        if !self.properties.insert(name.to_string()) {
            return Err(self.duplicate(name));
        }
        property.bind(AttributeBinding {
            store: Arc::clone(self.store),
            model: self.model.clone(),
            attribute: info.attribute_name.clone(),
            converter: Arc::clone(&info.converter),
        });
        Ok(())
    }

    /// Binds an observable list. Its current contents are announced once the
    /// bean is registered.
    pub fn list<T: PropertyValue>(
        &mut self,
        name: &str,
        list: &ObservableList<T>,
    ) -> RemotingResult<()> {
        let info = self.slot::<T>(name, self.class.list(name))?;
        if self.lists.contains_key(name) {
            return Err(self.duplicate(name));
        }
        let slot = list.bind(ListBinding {
            mapper: Arc::downgrade(self.mapper),
            source: self.model.clone(),
            attribute: info.attribute_name.clone(),
            converter: Arc::clone(&info.converter),
            announced: false,
        })?;
        self.lists.insert(name.to_string(), slot);
        Ok(())
    }

    fn slot<T: PropertyValue>(
        &self,
        name: &str,
        info: Option<&'a PropertyInfo>,
    ) -> RemotingResult<&'a PropertyInfo> {
        let Some(info) = info else {
            return Err(match self.class.slot(name) {
                Some(other) => RemotingError::KindMismatch {
                    class: self.class.class_name().to_string(),
                    name: name.to_string(),
                    declared: format!("{:?}", other.kind).to_lowercase(),
                    requested: T::type_label(),
                },
                None => RemotingError::UnknownAttribute {
                    class: self.class.class_name().to_string(),
                    name: name.to_string(),
                },
            });
        };
        if !T::accepts(&info.value_type) {
            return Err(RemotingError::KindMismatch {
                class: self.class.class_name().to_string(),
                name: name.to_string(),
                declared: info.value_type.to_string(),
                requested: T::type_label(),
            });
        }
        Ok(info)
    }

    fn duplicate(&self, name: &str) -> RemotingError {
        RemotingError::InvalidSchema {
            class: self.class.class_name().to_string(),
            reason: format!("slot {name} bound twice"),
        }
    }

    /// Checks that every declared slot was bound and returns the bound lists.
    pub(crate) fn finish(self) -> RemotingResult<HashMap<String, Arc<dyn ListSlot>>> {
        let missing = self
            .class
            .properties()
            .iter()
            .filter(|p| !self.properties.contains(&p.attribute_name))
            .chain(
                self.class
                    .lists()
                    .iter()
                    .filter(|l| !self.lists.contains_key(&l.attribute_name)),
            )
            .map(|p| p.attribute_name.as_str())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(RemotingError::Construction {
                class: self.class.class_name().to_string(),
                reason: format!("unbound slots: {}", missing.join(", ")),
            });
        }
        Ok(self.lists)
    }
}
