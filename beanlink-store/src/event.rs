//! Store notifications.

use crate::{Attribute, ModelSnapshot};
use beanlink_types::{ModelId, WireValue};
use std::collections::HashSet;
use tokio::sync::mpsc;

/// Receiving end of a store subscription.
///
/// Events arrive in the order the store applied the mutations. The channel
/// closes when the store is dropped.
pub type StoreSubscription = mpsc::UnboundedReceiver<StoreEvent>;

/// Where a mutation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Made by this process.
    Local,
    /// Replayed from the peer by the transport.
    Remote,
}

/// A change published by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    ModelAdded {
        model: ModelSnapshot,
        origin: Origin,
    },
    ModelRemoved {
        model: ModelSnapshot,
        origin: Origin,
    },
    AttributeChanged {
        id: ModelId,
        model_type: String,
        attribute: String,
        old: WireValue,
        new: WireValue,
        origin: Origin,
    },
}

impl StoreEvent {
    /// The type of the model this event concerns.
    #[must_use]
    pub fn model_type(&self) -> &str {
        match self {
            StoreEvent::ModelAdded { model, .. } | StoreEvent::ModelRemoved { model, .. } => {
                &model.model_type
            }
            StoreEvent::AttributeChanged { model_type, .. } => model_type,
        }
    }

    /// The id of the model this event concerns.
    #[must_use]
    pub fn model_id(&self) -> &ModelId {
        match self {
            StoreEvent::ModelAdded { model, .. } | StoreEvent::ModelRemoved { model, .. } => {
                &model.id
            }
            StoreEvent::AttributeChanged { id, .. } => id,
        }
    }

    #[must_use]
    pub fn origin(&self) -> Origin {
        match self {
            StoreEvent::ModelAdded { origin, .. }
            | StoreEvent::ModelRemoved { origin, .. }
            | StoreEvent::AttributeChanged { origin, .. } => *origin,
        }
    }

    /// Translates a local event into the change a peer store should apply.
    /// Returns `None` for remote events, which must not be echoed back.
    #[must_use]
    pub fn to_remote_change(&self) -> Option<RemoteChange> {
        if self.origin() == Origin::Remote {
            return None;
        }
        Some(match self {
            StoreEvent::ModelAdded { model, .. } => RemoteChange::ModelAdded {
                id: model.id.clone(),
                model_type: model.model_type.clone(),
                attributes: model.attributes.clone(),
            },
            StoreEvent::ModelRemoved { model, .. } => RemoteChange::ModelRemoved {
                id: model.id.clone(),
            },
            StoreEvent::AttributeChanged {
                id, attribute, new, ..
            } => RemoteChange::AttributeChanged {
                id: id.clone(),
                attribute: attribute.clone(),
                value: new.clone(),
            },
        })
    }
}

/// A mutation received from the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    ModelAdded {
        id: ModelId,
        model_type: String,
        attributes: Vec<Attribute>,
    },
    ModelRemoved {
        id: ModelId,
    },
    AttributeChanged {
        id: ModelId,
        attribute: String,
        value: WireValue,
    },
}

/// Selects which model types a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// Every model type.
    All,
    /// Only the listed model types.
    Types(HashSet<String>),
}

impl TypeFilter {
    /// Builds a filter for the given types.
    pub fn types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeFilter::Types(types.into_iter().map(Into::into).collect())
    }

    /// Returns true if events for `model_type` pass the filter.
    #[must_use]
    pub fn matches(&self, model_type: &str) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Types(types) => types.contains(model_type),
        }
    }
}
