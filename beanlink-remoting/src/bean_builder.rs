//! Creation and wiring of beans.
//!
//! A locally created bean gets a fresh backing model; a materialized bean
//! adopts a model the peer created. Either way the bean is fully bound and
//! registered before the caller sees it, and a failed local creation
//! leaves no model behind.
//!
//! A created bean's lists are announced to the peer only once the bean is
//! registered. A materialized bean's lists start empty: their contents
//! arrive as records, including any that came before the bean did.

use crate::bean::{Bean, Binder};
use crate::bean_repository::{BeanEntry, BeanKind, BeanRepository};
use crate::class_repository::{ClassInfo, ClassRepository};
use crate::dynamic::DynamicBean;
use crate::error::{RemotingError, RemotingResult};
use crate::list::ListMapper;
use crate::schema::ClassSchema;
use beanlink_store::{Attribute, ModelStore, StoreError};
use beanlink_types::{BeanHandle, ModelId};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// How a bean's lists start out once it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lists {
    /// Emit the current contents.
    Announce,
    /// Drop the local contents and take the peer's.
    Adopt,
}

/// Builds and binds beans.
pub struct BeanBuilder {
    store: Arc<dyn ModelStore>,
    classes: Arc<ClassRepository>,
    beans: Arc<BeanRepository>,
    mapper: Arc<ListMapper>,
}

impl BeanBuilder {
    pub fn new(
        store: Arc<dyn ModelStore>,
        classes: Arc<ClassRepository>,
        beans: Arc<BeanRepository>,
        mapper: Arc<ListMapper>,
    ) -> Self {
        Self {
            store,
            classes,
            beans,
            mapper,
        }
    }

    /// Creates a bean of type `T` backed by a new model.
    pub fn create<T: Bean>(&self) -> RemotingResult<Arc<T>> {
        let class = self.class_info::<T>()?;
        let bean = T::instantiate().map_err(|e| RemotingError::Construction {
            class: T::CLASS_NAME.to_string(),
            reason: e.to_string(),
        })?;
        let id = self.create_model(&class)?;
        let created = self.wire(bean, class, &id, BeanKind::Concrete, Lists::Announce, T::bind);
        self.rollback_on_error(&id, created)
    }

    /// Wraps the existing model `id` in a new bean of type `T`.
    pub fn materialize<T: Bean>(&self, id: &ModelId) -> RemotingResult<Arc<T>> {
        let class = self.class_info::<T>()?;
        self.check_model(&class, id)?;
        let bean = T::instantiate().map_err(|e| RemotingError::Construction {
            class: T::CLASS_NAME.to_string(),
            reason: e.to_string(),
        })?;
        let bean = self.wire(bean, class, id, BeanKind::Concrete, Lists::Adopt, T::bind)?;
        self.mapper.replay_deferred(id);
        Ok(bean)
    }

    /// Creates a dynamic bean of the class `schema` describes.
    pub fn create_dynamic(&self, schema: &ClassSchema) -> RemotingResult<Arc<DynamicBean>> {
        let class = self.classes.get_class_info(schema)?;
        let bean = DynamicBean::new(Arc::clone(&class));
        let id = self.create_model(&class)?;
        let created = self.wire(
            bean,
            class,
            &id,
            BeanKind::Virtual,
            Lists::Announce,
            DynamicBean::bind,
        );
        self.rollback_on_error(&id, created)
    }

    /// Wraps the existing model `id` in a new dynamic bean.
    pub fn materialize_dynamic(
        &self,
        schema: &ClassSchema,
        id: &ModelId,
    ) -> RemotingResult<Arc<DynamicBean>> {
        let class = self.classes.get_class_info(schema)?;
        self.check_model(&class, id)?;
        let bean = DynamicBean::new(Arc::clone(&class));
        let bean = self.wire(
            bean,
            class,
            id,
            BeanKind::Virtual,
            Lists::Adopt,
            DynamicBean::bind,
        )?;
        self.mapper.replay_deferred(id);
        Ok(bean)
    }

    fn class_info<T: Bean>(&self) -> RemotingResult<Arc<ClassInfo>> {
        let schema = T::schema();
        if schema.name() != T::CLASS_NAME {
            return Err(RemotingError::InvalidSchema {
                class: T::CLASS_NAME.to_string(),
                reason: format!("schema is named {}", schema.name()),
            });
        }
        self.classes.get_class_info(&schema)
    }

    /// One null attribute per property; lists own no attribute.
    fn create_model(&self, class: &ClassInfo) -> RemotingResult<ModelId> {
        let attributes = class
            .properties()
            .iter()
            .map(|p| Attribute::empty(p.attribute_name.as_str()))
            .collect();
        let id = self.store.create_model(class.class_name(), attributes)?;
        trace!("Created model {} for class {}", id, class.class_name());
        Ok(id)
    }

    fn check_model(&self, class: &ClassInfo, id: &ModelId) -> RemotingResult<()> {
        let model = self
            .store
            .find_model(id)
            .ok_or_else(|| StoreError::ModelNotFound(id.clone()))?;
        if model.model_type != class.class_name() {
            return Err(RemotingError::mismatch(class.class_name(), model.model_type));
        }
        Ok(())
    }

    fn wire<B, F>(
        &self,
        mut bean: B,
        class: Arc<ClassInfo>,
        id: &ModelId,
        kind: BeanKind,
        mode: Lists,
        bind: F,
    ) -> RemotingResult<Arc<B>>
    where
        B: Send + Sync + 'static,
        F: FnOnce(&mut B, &mut Binder<'_>) -> RemotingResult<()>,
    {
        let lists = {
            let mut binder = Binder::new(&self.store, &self.mapper, &class, id);
            bind(&mut bean, &mut binder)?;
            binder.finish()?
        };
        if mode == Lists::Adopt {
            for slot in lists.values() {
                slot.adopt();
            }
        }
        let bean = Arc::new(bean);
        let entry = BeanEntry::new(id.clone(), class, BeanHandle::new(Arc::clone(&bean)), kind)
            .with_lists(lists.clone());
        self.beans.register(entry)?;
        if mode == Lists::Announce {
            for slot in lists.values() {
                if let Err(e) = slot.announce() {
                    self.beans.forget(id);
                    return Err(e);
                }
            }
        }
        Ok(bean)
    }

    fn rollback_on_error<B>(
        &self,
        id: &ModelId,
        result: RemotingResult<Arc<B>>,
    ) -> RemotingResult<Arc<B>> {
        if let Err(e) = &result {
            warn!("Bean creation for model {} failed: {}", id, e);
            if let Err(remove) = self.store.remove_model(id) {
                debug!("Rollback of model {} failed: {}", id, remove);
            }
        }
        result
    }
}
