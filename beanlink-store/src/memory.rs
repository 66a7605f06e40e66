//! In-memory model store.
//!
//! Models live in a single map behind one mutex. Events are published while
//! the lock is held, so every subscriber observes mutations in exactly the
//! order they were applied, regardless of which thread made them.

use crate::{
    Attribute, ModelSnapshot, ModelStore, Origin, RemoteChange, StoreError, StoreEvent,
    StoreResult, StoreSubscription, TypeFilter,
};
use beanlink_types::{ModelId, WireValue};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, trace};

#[derive(Debug)]
struct StoredModel {
    seq: u64,
    model_type: String,
    attributes: Vec<Attribute>,
}

impl StoredModel {
    fn snapshot(&self, id: &ModelId) -> ModelSnapshot {
        ModelSnapshot {
            id: id.clone(),
            model_type: self.model_type.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

struct Subscriber {
    filter: TypeFilter,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

#[derive(Default)]
struct StoreState {
    models: HashMap<ModelId, StoredModel>,
    next_seq: u64,
    subscribers: Vec<Subscriber>,
}

impl StoreState {
    fn publish(&mut self, event: StoreEvent) {
        // Closed receivers are pruned on the way.
        self.subscribers.retain(|sub| {
            if !sub.filter.matches(event.model_type()) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(event.clone()).is_ok()
        });
    }

    fn insert(
        &mut self,
        id: ModelId,
        model_type: &str,
        attributes: Vec<Attribute>,
        origin: Origin,
    ) -> StoreResult<()> {
        if self.models.contains_key(&id) {
            return Err(StoreError::DuplicateModel(id));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let stored = StoredModel {
            seq,
            model_type: model_type.to_string(),
            attributes,
        };
        let model = stored.snapshot(&id);
        self.models.insert(id, stored);
        self.publish(StoreEvent::ModelAdded { model, origin });
        Ok(())
    }

    fn remove(&mut self, id: &ModelId, origin: Origin) -> StoreResult<ModelSnapshot> {
        let stored = self
            .models
            .remove(id)
            .ok_or_else(|| StoreError::ModelNotFound(id.clone()))?;
        let model = stored.snapshot(id);
        self.publish(StoreEvent::ModelRemoved {
            model: model.clone(),
            origin,
        });
        Ok(model)
    }

    fn set(
        &mut self,
        id: &ModelId,
        attribute: &str,
        value: WireValue,
        origin: Origin,
    ) -> StoreResult<()> {
        let stored = self
            .models
            .get_mut(id)
            .ok_or_else(|| StoreError::ModelNotFound(id.clone()))?;
        let slot = stored
            .attributes
            .iter_mut()
            .find(|a| a.name == attribute)
            .ok_or_else(|| StoreError::AttributeNotFound {
                model: id.clone(),
                attribute: attribute.to_string(),
            })?;
        if slot.value == value {
            return Ok(());
        }
        let old = std::mem::replace(&mut slot.value, value.clone());
        let model_type = stored.model_type.clone();
        self.publish(StoreEvent::AttributeChanged {
            id: id.clone(),
            model_type,
            attribute: attribute.to_string(),
            old,
            new: value,
            origin,
        });
        Ok(())
    }
}

/// A [`ModelStore`] kept entirely in process memory.
#[derive(Default)]
pub struct InMemoryModelStore {
    state: Mutex<StoreState>,
}

impl InMemoryModelStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns snapshots of every model, in creation order.
    pub fn list_models(&self) -> Vec<ModelSnapshot> {
        let state = self.state();
        let mut models: Vec<(&ModelId, &StoredModel)> = state.models.iter().collect();
        models.sort_by_key(|(_, m)| m.seq);
        models.into_iter().map(|(id, m)| m.snapshot(id)).collect()
    }
}

impl ModelStore for InMemoryModelStore {
    fn create_model(&self, model_type: &str, attributes: Vec<Attribute>) -> StoreResult<ModelId> {
        let id = ModelId::generate();
        self.state()
            .insert(id.clone(), model_type, attributes, Origin::Local)?;
        trace!(%id, model_type, "model created");
        Ok(id)
    }

    fn remove_model(&self, id: &ModelId) -> StoreResult<ModelSnapshot> {
        let model = self.state().remove(id, Origin::Local)?;
        trace!(%id, model_type = %model.model_type, "model removed");
        Ok(model)
    }

    fn find_model(&self, id: &ModelId) -> Option<ModelSnapshot> {
        self.state().models.get(id).map(|m| m.snapshot(id))
    }

    fn find_models_by_type(&self, model_type: &str) -> Vec<ModelSnapshot> {
        let state = self.state();
        let mut models: Vec<(&ModelId, &StoredModel)> = state
            .models
            .iter()
            .filter(|(_, m)| m.model_type == model_type)
            .collect();
        models.sort_by_key(|(_, m)| m.seq);
        models.into_iter().map(|(id, m)| m.snapshot(id)).collect()
    }

    fn contains_model(&self, id: &ModelId) -> bool {
        self.state().models.contains_key(id)
    }

    fn model_count(&self) -> usize {
        self.state().models.len()
    }

    fn get_attribute(&self, id: &ModelId, attribute: &str) -> StoreResult<WireValue> {
        let state = self.state();
        let model = state
            .models
            .get(id)
            .ok_or_else(|| StoreError::ModelNotFound(id.clone()))?;
        model
            .attributes
            .iter()
            .find(|a| a.name == attribute)
            .map(|a| a.value.clone())
            .ok_or_else(|| StoreError::AttributeNotFound {
                model: id.clone(),
                attribute: attribute.to_string(),
            })
    }

    fn set_attribute(&self, id: &ModelId, attribute: &str, value: WireValue) -> StoreResult<()> {
        self.state().set(id, attribute, value, Origin::Local)
    }

    fn apply_remote(&self, change: RemoteChange) -> StoreResult<()> {
        debug!(?change, "applying remote change");
        let mut state = self.state();
        match change {
            RemoteChange::ModelAdded {
                id,
                model_type,
                attributes,
            } => state.insert(id, &model_type, attributes, Origin::Remote),
            RemoteChange::ModelRemoved { id } => state.remove(&id, Origin::Remote).map(|_| ()),
            RemoteChange::AttributeChanged {
                id,
                attribute,
                value,
            } => state.set(&id, &attribute, value, Origin::Remote),
        }
    }

    fn subscribe(&self, filter: TypeFilter) -> StoreSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscribers.push(Subscriber { filter, tx });
        rx
    }
}
