//! Diff and replay of list changes.
//!
//! Outbound, each raw [`ListChange`] becomes the shortest record sequence
//! that reproduces it:
//!
//! 1. `REPLACE` for each of the first `min(to - from, removed_count)`
//!    positions, which were removed and re-filled in place;
//! 2. then `ADD` for every remaining inserted element, left to right,
//!    or else a single `REMOVE` for the remaining removed range.
//!
//! Inbound, each record is decoded, applied to the target list without
//! re-emitting, and retired from the store whether it applied or not. A
//! record whose source model is in the store but has no bean yet is kept
//! and replayed when the bean is materialized.

use super::ListChange;
use crate::bean_repository::BeanRepository;
use crate::config::Side;
use crate::error::{RemotingError, RemotingResult};
use crate::protocol::{ListChangeRecord, ListOp};
use beanlink_store::{ModelSnapshot, ModelStore, StoreEvent, StoreSubscription, TypeFilter};
use beanlink_types::{ModelId, WireValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

/// Removes a consumed record model when dropped.
struct RetireOnDrop<'a> {
    store: &'a dyn ModelStore,
    id: &'a ModelId,
}

impl Drop for RetireOnDrop<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.remove_model(self.id) {
            debug!("Record {} already retired: {}", self.id, e);
        }
    }
}

/// The list diff/replay engine for one side of a connection.
pub struct ListMapper {
    store: Arc<dyn ModelStore>,
    beans: Arc<BeanRepository>,
    side: Side,
    /// Records waiting for their source bean, by source model. The lock is
    /// held while any inbound record is applied.
    deferred: Mutex<HashMap<ModelId, Vec<ListChangeRecord>>>,
}

impl ListMapper {
    pub fn new(store: Arc<dyn ModelStore>, beans: Arc<BeanRepository>, side: Side) -> Self {
        Self {
            store,
            beans,
            side,
            deferred: Mutex::new(HashMap::new()),
        }
    }

    fn deferred(&self) -> MutexGuard<'_, HashMap<ModelId, Vec<ListChangeRecord>>> {
        self.deferred.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Translates a batch of raw changes into list operations.
    ///
    /// `element(i)` returns the converted element at index `i` of the list
    /// after the batch; it is only called for inserted positions.
    pub fn diff<F>(changes: &[ListChange], mut element: F) -> RemotingResult<Vec<ListOp>>
    where
        F: FnMut(usize) -> RemotingResult<WireValue>,
    {
        let mut ops = Vec::new();
        for change in changes {
            let to = change.to;
            let mut from = change.from;
            let mut removed = change.removed_count;

            if change.is_replaced() {
                let n = (to - from).min(removed);
                for pos in from..from + n {
                    ops.push(ListOp::Replace {
                        pos,
                        element: element(pos)?,
                    });
                }
                from += n;
                removed -= n;
            }
            if to > from {
                for pos in from..to {
                    ops.push(ListOp::Add {
                        pos,
                        element: element(pos)?,
                    });
                }
            } else if removed > 0 {
                ops.push(ListOp::Remove {
                    from,
                    to: from + removed,
                });
            }
        }
        Ok(ops)
    }

    /// Diffs a batch of changes to `attribute` of bean `source` and emits
    /// the resulting records. Returns the number of records emitted.
    pub fn process_event<F>(
        &self,
        source: &ModelId,
        attribute: &str,
        changes: &[ListChange],
        element: F,
    ) -> RemotingResult<usize>
    where
        F: FnMut(usize) -> RemotingResult<WireValue>,
    {
        let ops = Self::diff(changes, element)?;
        let count = ops.len();
        self.emit(source, attribute, ops)?;
        Ok(count)
    }

    /// Emits one record model per operation, in order.
    pub fn emit(&self, source: &ModelId, attribute: &str, ops: Vec<ListOp>) -> RemotingResult<()> {
        for op in ops {
            let model_type = self.side.outbound_record_type(op.kind());
            trace!("Emitting {} on {}.{}", op, source, attribute);
            let record = ListChangeRecord {
                source: source.clone(),
                attribute: attribute.to_string(),
                op,
            };
            self.store.create_model(model_type, record.to_attributes())?;
        }
        Ok(())
    }

    /// Returns true for the record types this side replays.
    #[must_use]
    pub fn handles(&self, model_type: &str) -> bool {
        self.side.inbound_kind(model_type).is_some()
    }

    /// Replays one inbound record model and retires it.
    ///
    /// Malformed records are logged and discarded. Returns whether the
    /// record applied now; a deferred record returns false, as do models of
    /// other types, which are ignored and left alone.
    pub fn apply_record(&self, model: &ModelSnapshot) -> bool {
        let Some(kind) = self.side.inbound_kind(&model.model_type) else {
            return false;
        };
        let _retire = RetireOnDrop {
            store: self.store.as_ref(),
            id: &model.id,
        };
        let mut deferred = self.deferred();
        let applied = ListChangeRecord::from_model(model, kind).and_then(|record| {
            if self.beans.class_of(&record.source).is_none()
                && self.store.contains_model(&record.source)
            {
                debug!("Deferring {} on {} until it is managed", record.op, record.source);
                deferred.entry(record.source.clone()).or_default().push(record);
                return Ok(false);
            }
            self.apply(&record).map(|()| true)
        });
        match applied {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Discarding invalid {} record {}: {}", model.model_type, model.id, e);
                false
            }
        }
    }

    /// Replays the records deferred for `source`, in arrival order. Returns
    /// the number that applied.
    pub fn replay_deferred(&self, source: &ModelId) -> usize {
        let mut deferred = self.deferred();
        let Some(records) = deferred.remove(source) else {
            return 0;
        };
        let mut applied = 0;
        for record in &records {
            match self.apply(record) {
                Ok(()) => applied += 1,
                Err(e) => warn!("Discarding deferred {} on {}: {}", record.op, source, e),
            }
        }
        debug!("Replayed {} of {} deferred records on {}", applied, records.len(), source);
        applied
    }

    /// Drops the records deferred for `source`. Returns how many there were.
    pub fn discard_deferred(&self, source: &ModelId) -> usize {
        self.deferred().remove(source).map_or(0, |records| records.len())
    }

    /// Number of records waiting for their source bean.
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.deferred().values().map(Vec::len).sum()
    }

    fn apply(&self, record: &ListChangeRecord) -> RemotingResult<()> {
        let slot = self
            .beans
            .list_slot(&record.source, &record.attribute)
            .ok_or_else(|| match self.beans.class_of(&record.source) {
                Some(class) => RemotingError::UnknownAttribute {
                    class: class.class_name().to_string(),
                    name: record.attribute.clone(),
                },
                None => RemotingError::NotManaged(record.source.to_string()),
            })?;
        trace!("Applying {} to {}.{}", record.op, record.source, record.attribute);
        match &record.op {
            ListOp::Add { pos, element } => slot.apply_add(*pos, element),
            ListOp::Remove { from, to } => slot.apply_remove(*from, *to),
            ListOp::Replace { pos, element } => slot.apply_replace(*pos, element),
        }
    }

    /// Subscribes to the record types this side replays.
    pub fn subscribe(&self) -> StoreSubscription {
        self.store
            .subscribe(TypeFilter::types(self.side.inbound_record_types()))
    }

    /// Applies every record queued on `records` without waiting. Returns the
    /// number applied.
    pub fn drain(&self, records: &mut StoreSubscription) -> usize {
        let mut applied = 0;
        while let Ok(event) = records.try_recv() {
            if let StoreEvent::ModelAdded { model, .. } = event {
                if self.apply_record(&model) {
                    applied += 1;
                }
            }
        }
        applied
    }
}
