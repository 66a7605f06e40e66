//! The identity registry.
//!
//! Every managed bean maps to exactly one model id and back. The map is the
//! only place bean identities live; converters and the list mapper resolve
//! model ids through it.

use crate::class_repository::ClassInfo;
use crate::error::{RemotingError, RemotingResult};
use crate::list::ListSlot;
use beanlink_store::{ModelStore, StoreError};
use beanlink_types::{BeanHandle, ModelId};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

/// Whether a bean is a user type or a schema-driven dynamic bean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeanKind {
    Concrete,
    Virtual,
}

/// Everything the registry knows about one managed bean.
pub struct BeanEntry {
    pub id: ModelId,
    pub class: Arc<ClassInfo>,
    pub bean: BeanHandle,
    pub kind: BeanKind,
    lists: HashMap<String, Arc<dyn ListSlot>>,
    seq: u64,
}

impl BeanEntry {
    pub fn new(id: ModelId, class: Arc<ClassInfo>, bean: BeanHandle, kind: BeanKind) -> Self {
        Self {
            id,
            class,
            bean,
            kind,
            lists: HashMap::new(),
            seq: 0,
        }
    }

    /// Attaches the bean's bound lists, keyed by attribute name.
    #[must_use]
    pub fn with_lists(mut self, lists: HashMap<String, Arc<dyn ListSlot>>) -> Self {
        self.lists = lists;
        self
    }

    fn detach(&self) {
        for list in self.lists.values() {
            list.unbind();
        }
    }
}

#[derive(Default)]
struct Registry {
    by_id: HashMap<ModelId, BeanEntry>,
    by_key: HashMap<usize, ModelId>,
    next_seq: u64,
}

impl Registry {
    fn remove_by_id(&mut self, id: &ModelId) -> Option<BeanEntry> {
        let entry = self.by_id.remove(id)?;
        self.by_key.remove(&entry.bean.key());
        Some(entry)
    }

    fn sorted<'a>(&'a self, class: &'a str) -> Vec<&'a BeanEntry> {
        let mut entries: Vec<&BeanEntry> = self
            .by_id
            .values()
            .filter(|e| e.class.class_name() == class)
            .collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }
}

/// Bidirectional bean ↔ model id map.
pub struct BeanRepository {
    store: Arc<dyn ModelStore>,
    registry: RwLock<Registry>,
}

impl BeanRepository {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store,
            registry: RwLock::new(Registry::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new bean. Fails if either the bean or its id is already
    /// registered.
    pub fn register(&self, mut entry: BeanEntry) -> RemotingResult<()> {
        let mut registry = self.write();
        if let Some(id) = registry.by_key.get(&entry.bean.key()) {
            return Err(RemotingError::AlreadyManaged(id.clone()));
        }
        if registry.by_id.contains_key(&entry.id) {
            return Err(RemotingError::AlreadyManaged(entry.id));
        }
        entry.seq = registry.next_seq;
        registry.next_seq += 1;
        trace!("Registered bean {} of class {}", entry.id, entry.class.class_name());
        registry.by_key.insert(entry.bean.key(), entry.id.clone());
        registry.by_id.insert(entry.id.clone(), entry);
        Ok(())
    }

    pub fn is_managed<T: ?Sized>(&self, bean: &Arc<T>) -> bool {
        self.read().by_key.contains_key(&BeanHandle::key_of(bean))
    }

    pub fn is_managed_handle(&self, bean: &BeanHandle) -> bool {
        self.read().by_key.contains_key(&bean.key())
    }

    /// Returns the bean registered under `id`.
    #[must_use]
    pub fn get_bean(&self, id: &ModelId) -> Option<BeanHandle> {
        self.read().by_id.get(id).map(|e| e.bean.clone())
    }

    /// Returns the bean registered under `id` if it is a `T`.
    #[must_use]
    pub fn get_bean_as<T: Any + Send + Sync>(&self, id: &ModelId) -> Option<Arc<T>> {
        self.get_bean(id).and_then(|h| h.downcast::<T>())
    }

    /// Returns the model id of a managed bean.
    pub fn get_id<T: ?Sized>(&self, bean: &Arc<T>) -> RemotingResult<ModelId> {
        self.id_for_key(BeanHandle::key_of(bean))
    }

    pub fn get_handle_id(&self, bean: &BeanHandle) -> RemotingResult<ModelId> {
        self.id_for_key(bean.key())
    }

    fn id_for_key(&self, key: usize) -> RemotingResult<ModelId> {
        self.read()
            .by_key
            .get(&key)
            .cloned()
            .ok_or_else(|| RemotingError::NotManaged(format!("bean at {key:#x}")))
    }

    /// Returns the model id and class name of a managed bean.
    pub fn describe_handle(&self, bean: &BeanHandle) -> RemotingResult<(ModelId, String)> {
        let registry = self.read();
        registry
            .by_key
            .get(&bean.key())
            .and_then(|id| registry.by_id.get(id))
            .map(|e| (e.id.clone(), e.class.class_name().to_string()))
            .ok_or_else(|| RemotingError::NotManaged(format!("{bean:?}")))
    }

    /// Class descriptor of the bean registered under `id`.
    #[must_use]
    pub fn class_of(&self, id: &ModelId) -> Option<Arc<ClassInfo>> {
        self.read().by_id.get(id).map(|e| Arc::clone(&e.class))
    }

    #[must_use]
    pub fn kind_of(&self, id: &ModelId) -> Option<BeanKind> {
        self.read().by_id.get(id).map(|e| e.kind)
    }

    /// Returns the bound list `attribute` of the bean registered under `id`.
    #[must_use]
    pub fn list_slot(&self, id: &ModelId, attribute: &str) -> Option<Arc<dyn ListSlot>> {
        self.read()
            .by_id
            .get(id)
            .and_then(|e| e.lists.get(attribute))
            .cloned()
    }

    /// Detaches a bean and removes its backing model.
    ///
    /// Deleting a bean that is not managed, including a second delete of
    /// the same bean, fails with [`RemotingError::NotManaged`].
    pub fn delete<T: ?Sized>(&self, bean: &Arc<T>) -> RemotingResult<()> {
        self.delete_key(BeanHandle::key_of(bean))
    }

    pub fn delete_handle(&self, bean: &BeanHandle) -> RemotingResult<()> {
        self.delete_key(bean.key())
    }

    fn delete_key(&self, key: usize) -> RemotingResult<()> {
        let mut registry = self.write();
        let id = registry
            .by_key
            .get(&key)
            .cloned()
            .ok_or_else(|| RemotingError::NotManaged(format!("bean at {key:#x}")))?;
        let entry = registry.remove_by_id(&id);
        let removed = self.remove_model(&id);
        drop(registry);
        // Lists lock themselves; never unbind under the registry lock.
        if let Some(entry) = entry {
            entry.detach();
        }
        removed
    }

    /// Deletes every managed bean whose class is exactly `class_name`.
    ///
    /// The registry stays write-locked for the whole sweep, so a bean of the
    /// same class registered concurrently is either deleted or survives
    /// intact. Returns the number of beans deleted.
    pub fn delete_all(&self, class_name: &str) -> RemotingResult<usize> {
        let mut registry = self.write();
        let ids: Vec<ModelId> = registry
            .sorted(class_name)
            .into_iter()
            .map(|e| e.id.clone())
            .collect();
        let mut detached = Vec::with_capacity(ids.len());
        let mut removed = Ok(());
        for id in &ids {
            detached.extend(registry.remove_by_id(id));
            if let Err(e) = self.remove_model(id) {
                removed = Err(e);
                break;
            }
        }
        drop(registry);
        for entry in &detached {
            entry.detach();
        }
        removed?;
        debug!("Deleted {} beans of class {}", detached.len(), class_name);
        Ok(detached.len())
    }

    /// Drops the mapping for `id` without touching the store. Used when the
    /// peer removed the backing model.
    pub fn forget(&self, id: &ModelId) -> Option<BeanHandle> {
        let entry = self.write().remove_by_id(id)?;
        entry.detach();
        trace!("Forgot bean {}", id);
        Some(entry.bean)
    }

    /// Managed beans of exactly `class_name`, in registration order.
    #[must_use]
    pub fn find_all(&self, class_name: &str) -> Vec<BeanHandle> {
        self.read()
            .sorted(class_name)
            .into_iter()
            .map(|e| e.bean.clone())
            .collect()
    }

    /// Typed variant of [`BeanRepository::find_all`].
    #[must_use]
    pub fn find_all_as<T: Any + Send + Sync>(&self, class_name: &str) -> Vec<Arc<T>> {
        self.find_all(class_name)
            .into_iter()
            .filter_map(|h| h.downcast::<T>())
            .collect()
    }

    /// Number of managed beans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_model(&self, id: &ModelId) -> RemotingResult<()> {
        match self.store.remove_model(id) {
            Ok(_) => Ok(()),
            Err(StoreError::ModelNotFound(_)) => {
                debug!("Backing model {} already removed", id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
