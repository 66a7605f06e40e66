//! Shared model store for beanlink.
//!
//! The store is the substrate the remoting engine builds on: a flat set of
//! typed models, each a bag of named attributes holding [`WireValue`]s.
//! Every mutation is published as a [`StoreEvent`] to subscribers whose
//! [`TypeFilter`] matches the model's type.
//!
//! # Origins
//!
//! Mutations made through [`ModelStore::create_model`],
//! [`ModelStore::remove_model`] and [`ModelStore::set_attribute`] are *local*.
//! A transport replays the peer's mutations through
//! [`ModelStore::apply_remote`], which publishes the same events tagged
//! [`Origin::Remote`]. Consumers use the tag to tell mirrored state from
//! their own writes; a transport forwards only local events.
//!
//! [`WireValue`]: beanlink_types::WireValue

mod error;
mod event;
mod memory;
mod model;

pub use error::{StoreError, StoreResult};
pub use event::{Origin, RemoteChange, StoreEvent, StoreSubscription, TypeFilter};
pub use memory::InMemoryModelStore;
pub use model::{Attribute, ModelSnapshot};

use beanlink_types::{ModelId, WireValue};

/// The shared model store contract.
///
/// Implementations must be usable from any thread and must publish events
/// to each subscriber in the order the mutations were applied.
pub trait ModelStore: Send + Sync {
    /// Creates a model with the given attributes and returns its new id.
    fn create_model(&self, model_type: &str, attributes: Vec<Attribute>) -> StoreResult<ModelId>;

    /// Removes a model.
    fn remove_model(&self, id: &ModelId) -> StoreResult<ModelSnapshot>;

    /// Returns a snapshot of one model.
    fn find_model(&self, id: &ModelId) -> Option<ModelSnapshot>;

    /// Returns snapshots of every model of the given type, in creation order.
    fn find_models_by_type(&self, model_type: &str) -> Vec<ModelSnapshot>;

    /// Returns true if a model with this id exists.
    fn contains_model(&self, id: &ModelId) -> bool {
        self.find_model(id).is_some()
    }

    /// Returns the total number of models.
    fn model_count(&self) -> usize;

    /// Reads one attribute.
    fn get_attribute(&self, id: &ModelId, attribute: &str) -> StoreResult<WireValue>;

    /// Writes one attribute. Writing an equal value publishes nothing.
    fn set_attribute(&self, id: &ModelId, attribute: &str, value: WireValue) -> StoreResult<()>;

    /// Applies a mutation that originated on the peer.
    fn apply_remote(&self, change: RemoteChange) -> StoreResult<()>;

    /// Registers a listener for models matching `filter`.
    fn subscribe(&self, filter: TypeFilter) -> StoreSubscription;
}
