//! Class descriptors and class-metadata models.
//!
//! A [`ClassInfo`] is derived once per class name from its [`ClassSchema`]
//! and cached for the lifetime of the repository. Slot names are sorted so
//! that both sides of a connection publish identical class models whatever
//! order the schema declared them in.

use crate::converters::{Converter, Converters};
use crate::error::{RemotingError, RemotingResult};
use crate::protocol::{CLASS_MODEL_TYPE, CLASS_NAME_ATTRIBUTE};
use crate::schema::{ClassSchema, SlotKind};
use beanlink_store::{Attribute, ModelSnapshot, ModelStore};
use beanlink_types::{FieldType, ModelId, ValueType, WireValue};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// How a slot is backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// One attribute holding a converted value.
    Value,
    /// One attribute holding the model id of another bean.
    Reference,
    /// No attribute; mutations travel as list change records.
    List,
}

/// Descriptor of one slot.
#[derive(Clone)]
pub struct PropertyInfo {
    pub attribute_name: String,
    pub kind: PropertyKind,
    pub value_type: ValueType,
    pub converter: Arc<dyn Converter>,
}

impl PropertyInfo {
    /// Field type code published in the class model.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self.kind {
            PropertyKind::List => FieldType::List,
            _ => self.value_type.field_type(),
        }
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("attribute_name", &self.attribute_name)
            .field("kind", &self.kind)
            .field("value_type", &self.value_type)
            .finish_non_exhaustive()
    }
}

/// Immutable descriptor of a bean class.
#[derive(Debug)]
pub struct ClassInfo {
    class_name: String,
    schema: ClassSchema,
    properties: Vec<PropertyInfo>,
    lists: Vec<PropertyInfo>,
}

impl ClassInfo {
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The schema this descriptor was derived from.
    #[must_use]
    pub fn schema(&self) -> &ClassSchema {
        &self.schema
    }

    /// Single-valued slots, sorted by name.
    #[must_use]
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    /// List slots, sorted by name.
    #[must_use]
    pub fn lists(&self) -> &[PropertyInfo] {
        &self.lists
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.attribute_name == name)
    }

    #[must_use]
    pub fn list(&self, name: &str) -> Option<&PropertyInfo> {
        self.lists.iter().find(|p| p.attribute_name == name)
    }

    /// Looks up a slot of either kind.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&PropertyInfo> {
        self.property(name).or_else(|| self.list(name))
    }

    /// Names of all slots, sorted.
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .properties
            .iter()
            .chain(&self.lists)
            .map(|p| p.attribute_name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Attributes of the class-metadata model describing this class.
    fn class_model_attributes(&self) -> Vec<Attribute> {
        let mut slots: Vec<&PropertyInfo> = self.properties.iter().chain(&self.lists).collect();
        slots.sort_by(|a, b| a.attribute_name.cmp(&b.attribute_name));
        std::iter::once(Attribute::new(CLASS_NAME_ATTRIBUTE, self.class_name.as_str()))
            .chain(
                slots
                    .into_iter()
                    .map(|p| Attribute::new(p.attribute_name.as_str(), p.field_type().code())),
            )
            .collect()
    }
}

/// Derives and caches class descriptors.
pub struct ClassRepository {
    store: Arc<dyn ModelStore>,
    converters: Converters,
    publish_class_models: bool,
    classes: RwLock<HashMap<String, Arc<ClassInfo>>>,
    published: Mutex<HashSet<ModelId>>,
}

impl ClassRepository {
    pub fn new(
        store: Arc<dyn ModelStore>,
        converters: Converters,
        publish_class_models: bool,
    ) -> Self {
        Self {
            store,
            converters,
            publish_class_models,
            classes: RwLock::new(HashMap::new()),
            published: Mutex::new(HashSet::new()),
        }
    }

    /// Returns the descriptor for `schema`, building and caching it on first
    /// use. The first call for a class name also publishes its
    /// class-metadata model.
    ///
    /// A schema that disagrees with the one cached under the same class name
    /// is rejected.
    pub fn get_class_info(&self, schema: &ClassSchema) -> RemotingResult<Arc<ClassInfo>> {
        if let Some(info) = self.lookup(schema.name()) {
            return Self::check_cached(info, schema);
        }

        let built = self.describe(schema)?;
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = classes.get(schema.name()) {
            return Self::check_cached(Arc::clone(info), schema);
        }
        let info = Arc::new(built);
        if self.publish_class_models {
            let id = self
                .store
                .create_model(CLASS_MODEL_TYPE, info.class_model_attributes())?;
            debug!("Published class model {} for {}", id, info.class_name);
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id);
        }
        classes.insert(info.class_name.clone(), Arc::clone(&info));
        info!("Registered bean class {}", info.class_name);
        Ok(info)
    }

    /// Returns the cached descriptor for a class name.
    #[must_use]
    pub fn lookup(&self, class_name: &str) -> Option<Arc<ClassInfo>> {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_name)
            .cloned()
    }

    /// Number of cached classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compares `schema` with the class model the peer published for the
    /// same class name.
    ///
    /// Returns `None` if the peer has not published one, otherwise whether
    /// the slot names and field types agree.
    pub fn remote_class_matches(&self, schema: &ClassSchema) -> RemotingResult<Option<bool>> {
        let expected = self.describe(schema)?.class_model_attributes();
        let published = self
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let remote = self
            .store
            .find_models_by_type(CLASS_MODEL_TYPE)
            .into_iter()
            .filter(|model| !published.contains(&model.id))
            .find(|model| {
                model.attribute(CLASS_NAME_ATTRIBUTE) == Some(&WireValue::from(schema.name()))
            });
        Ok(remote.map(|model| Self::same_layout(&model, &expected)))
    }

    fn same_layout(model: &ModelSnapshot, expected: &[Attribute]) -> bool {
        let mut actual: Vec<&Attribute> = model.attributes.iter().collect();
        actual.sort_by(|a, b| a.name.cmp(&b.name));
        let mut expected: Vec<&Attribute> = expected.iter().collect();
        expected.sort_by(|a, b| a.name.cmp(&b.name));
        actual == expected
    }

    fn check_cached(info: Arc<ClassInfo>, schema: &ClassSchema) -> RemotingResult<Arc<ClassInfo>> {
        if info.schema != *schema {
            return Err(RemotingError::InvalidSchema {
                class: schema.name().to_string(),
                reason: "conflicts with a previously registered schema".to_string(),
            });
        }
        Ok(info)
    }

    fn describe(&self, schema: &ClassSchema) -> RemotingResult<ClassInfo> {
        let invalid = |reason: String| RemotingError::InvalidSchema {
            class: schema.name().to_string(),
            reason,
        };
        if schema.name().is_empty() {
            return Err(invalid("empty class name".to_string()));
        }

        let mut seen = HashSet::new();
        let mut properties = Vec::new();
        let mut lists = Vec::new();
        for slot in schema.slots() {
            if slot.name.is_empty() || slot.name.starts_with("@@@") {
                return Err(invalid(format!("illegal slot name {:?}", slot.name)));
            }
            if !seen.insert(slot.name.as_str()) {
                return Err(invalid(format!("duplicate slot {}", slot.name)));
            }
            let kind = match (slot.kind, slot.value_type.is_bean_reference()) {
                (SlotKind::List, _) => PropertyKind::List,
                (SlotKind::Property, true) => PropertyKind::Reference,
                (SlotKind::Property, false) => PropertyKind::Value,
            };
            let info = PropertyInfo {
                attribute_name: slot.name.clone(),
                kind,
                value_type: slot.value_type.clone(),
                converter: self.converters.get_converter(&slot.value_type),
            };
            match kind {
                PropertyKind::List => lists.push(info),
                _ => properties.push(info),
            }
        }
        properties.sort_by(|a, b| a.attribute_name.cmp(&b.attribute_name));
        lists.sort_by(|a, b| a.attribute_name.cmp(&b.attribute_name));

        Ok(ClassInfo {
            class_name: schema.name().to_string(),
            schema: schema.clone(),
            properties,
            lists,
        })
    }
}
