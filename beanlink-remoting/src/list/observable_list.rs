//! Lists whose local mutations are mirrored as list change records.
//!
//! Every bound list carries a [`ListPhase`]. A local mutation claims the
//! list as `Emitting` and a replayed record claims it as `Applying`; a
//! claim waits until the list is `Idle` again. The claim spans the store
//! writes that follow a mutation, so records leave in the same order the
//! list changed, and a replay never lands between a change and its
//! records. The list mutex only guards the contents and is never held
//! across a store call.

use super::{ListMapper, ListSlot};
use crate::converters::Converter;
use crate::error::{RemotingError, RemotingResult};
use crate::property::PropertyValue;
use beanlink_types::{ModelId, WireValue};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use tracing::trace;

/// One raw list change: the elements at `[from, to)` of the resulting list
/// replaced `removed_count` elements that used to start at `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListChange {
    pub from: usize,
    pub to: usize,
    pub removed_count: usize,
}

impl ListChange {
    /// True if the change both removed and inserted elements.
    #[must_use]
    pub fn is_replaced(&self) -> bool {
        self.removed_count > 0 && self.to > self.from
    }

    /// Number of inserted elements; 0 for an inverted range.
    #[must_use]
    pub fn added_count(&self) -> usize {
        self.to.saturating_sub(self.from)
    }
}

/// What a list is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListPhase {
    #[default]
    Idle,
    /// A local mutation is being translated into records.
    Emitting,
    /// Inbound records are being replayed; nothing is emitted.
    Applying,
}

/// Where a bound list sends its changes.
pub(crate) struct ListBinding {
    pub(crate) mapper: Weak<ListMapper>,
    pub(crate) source: ModelId,
    pub(crate) attribute: String,
    pub(crate) converter: Arc<dyn Converter>,
    /// Set once the peer has been told the list's contents.
    pub(crate) announced: bool,
}

struct ListState<T> {
    items: Vec<T>,
    phase: ListPhase,
    binding: Option<ListBinding>,
}

pub(crate) struct ListCore<T> {
    state: Mutex<ListState<T>>,
    idle: Condvar,
}

/// Returns the list to `Idle` when dropped.
struct Claim<'a, T> {
    core: &'a ListCore<T>,
}

impl<T> Drop for Claim<'_, T> {
    fn drop(&mut self) {
        self.core.lock().phase = ListPhase::Idle;
        self.core.idle.notify_all();
    }
}

/// Where to send the records of one change, captured under the list mutex.
struct Outbound {
    mapper: Arc<ListMapper>,
    source: ModelId,
    attribute: String,
}

impl Outbound {
    fn of(binding: &ListBinding) -> RemotingResult<Self> {
        Ok(Self {
            mapper: binding.mapper.upgrade().ok_or(RemotingError::Closed)?,
            source: binding.source.clone(),
            attribute: binding.attribute.clone(),
        })
    }
}

fn encode<T: PropertyValue>(
    converter: &dyn Converter,
    items: &[T],
) -> RemotingResult<Vec<WireValue>> {
    items
        .iter()
        .map(|item| converter.to_wire(&item.clone().into_value()))
        .collect()
}

impl<T> ListCore<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            state: Mutex::new(ListState {
                items,
                phase: ListPhase::Idle,
                binding: None,
            }),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for the list to go idle and claims it for `phase`.
    fn claim(&self, phase: ListPhase) -> Claim<'_, T> {
        let mut state = self
            .idle
            .wait_while(self.lock(), |s| s.phase != ListPhase::Idle)
            .unwrap_or_else(PoisonError::into_inner);
        state.phase = phase;
        Claim { core: self }
    }
}

impl<T: PropertyValue> ListCore<T> {
    /// Replaces a range chosen by `edit` from the current length, then
    /// emits the change when bound. Elements are converted before the list
    /// is touched, so a failure leaves it unchanged.
    fn splice<F>(&self, edit: F) -> RemotingResult<Vec<T>>
    where
        F: FnOnce(usize) -> RemotingResult<(usize, usize, Vec<T>)>,
    {
        let _claim = self.claim(ListPhase::Emitting);
        let (outbound, ops, removed) = {
            let mut state = self.lock();
            let len = state.items.len();
            let (start, remove_count, inserted) = edit(len)?;
            if start > len {
                return Err(RemotingError::IndexOutOfBounds { index: start, len });
            }
            let end = start
                .checked_add(remove_count)
                .filter(|end| *end <= len)
                .ok_or(RemotingError::IndexOutOfBounds {
                    index: start.saturating_add(remove_count),
                    len,
                })?;
            if remove_count == 0 && inserted.is_empty() {
                return Ok(Vec::new());
            }
            let live = match &state.binding {
                Some(binding) => {
                    let wire = encode(binding.converter.as_ref(), &inserted)?;
                    if binding.announced {
                        Some((Outbound::of(binding)?, wire))
                    } else {
                        None
                    }
                }
                None => None,
            };
            // Unannounced lists change silently; the announcement carries
            // whatever they hold by then.
            let Some((outbound, wire)) = live else {
                return Ok(state.items.splice(start..end, inserted).collect());
            };
            let change = ListChange {
                from: start,
                to: start + inserted.len(),
                removed_count: remove_count,
            };
            let ops = ListMapper::diff(&[change], |i| Ok(wire[i - start].clone()))?;
            let removed: Vec<T> = state.items.splice(start..end, inserted).collect();
            (outbound, ops, removed)
        };
        outbound
            .mapper
            .emit(&outbound.source, &outbound.attribute, ops)?;
        Ok(removed)
    }

    /// Decodes an inbound element outside the list mutex.
    fn decode(&self, element: &WireValue) -> RemotingResult<T> {
        let converter = self
            .lock()
            .binding
            .as_ref()
            .map(|b| Arc::clone(&b.converter))
            .ok_or(RemotingError::Unbound)?;
        T::from_value(converter.from_wire(element)?)
    }
}

impl<T: PropertyValue> ListSlot for ListCore<T> {
    fn apply_add(&self, pos: usize, element: &WireValue) -> RemotingResult<()> {
        let _claim = self.claim(ListPhase::Applying);
        let value = self.decode(element)?;
        let mut state = self.lock();
        let len = state.items.len();
        if pos > len {
            return Err(RemotingError::IndexOutOfBounds { index: pos, len });
        }
        state.items.insert(pos, value);
        Ok(())
    }

    fn apply_remove(&self, from: usize, to: usize) -> RemotingResult<()> {
        let _claim = self.claim(ListPhase::Applying);
        let mut state = self.lock();
        let len = state.items.len();
        if from > to || to > len {
            return Err(RemotingError::IndexOutOfBounds { index: to, len });
        }
        state.items.drain(from..to);
        Ok(())
    }

    fn apply_replace(&self, pos: usize, element: &WireValue) -> RemotingResult<()> {
        let _claim = self.claim(ListPhase::Applying);
        let value = self.decode(element)?;
        let mut state = self.lock();
        let len = state.items.len();
        match state.items.get_mut(pos) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RemotingError::IndexOutOfBounds { index: pos, len }),
        }
    }

    fn len(&self) -> usize {
        self.lock().items.len()
    }

    fn announce(&self) -> RemotingResult<()> {
        let _claim = self.claim(ListPhase::Emitting);
        let (outbound, ops) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let binding = state.binding.as_mut().ok_or(RemotingError::Unbound)?;
            if binding.announced {
                return Ok(());
            }
            let wire = encode(binding.converter.as_ref(), &state.items)?;
            let outbound = Outbound::of(binding)?;
            binding.announced = true;
            let change = ListChange {
                from: 0,
                to: wire.len(),
                removed_count: 0,
            };
            let ops = ListMapper::diff(&[change], |i| Ok(wire[i].clone()))?;
            (outbound, ops)
        };
        outbound
            .mapper
            .emit(&outbound.source, &outbound.attribute, ops)
    }

    fn adopt(&self) {
        let _claim = self.claim(ListPhase::Applying);
        let mut state = self.lock();
        state.items.clear();
        if let Some(binding) = state.binding.as_mut() {
            binding.announced = true;
        }
    }

    fn unbind(&self) {
        self.lock().binding = None;
    }
}

/// An ordered list whose mutations are mirrored on the peer.
///
/// Clones share the same underlying list. An unbound list is an ordinary
/// local list; once the bean builder binds it, each mutation is diffed and
/// emitted as list change records before the call returns.
pub struct ObservableList<T> {
    core: Arc<ListCore<T>>,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Default for ObservableList<T> {
    fn default() -> Self {
        Self {
            core: Arc::new(ListCore::new(Vec::new())),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.core.lock().items.iter()).finish()
    }
}

impl<T: PropertyValue> ObservableList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unbound list holding `items`.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            core: Arc::new(ListCore::new(items)),
        }
    }

    pub fn push(&self, item: T) -> RemotingResult<()> {
        self.core.splice(|len| Ok((len, 0, vec![item]))).map(drop)
    }

    pub fn insert(&self, index: usize, item: T) -> RemotingResult<()> {
        self.core.splice(|_| Ok((index, 0, vec![item]))).map(drop)
    }

    /// Overwrites the element at `index` and returns the previous one.
    pub fn set(&self, index: usize, item: T) -> RemotingResult<T> {
        let mut removed = self.core.splice(|len| {
            if index >= len {
                return Err(RemotingError::IndexOutOfBounds { index, len });
            }
            Ok((index, 1, vec![item]))
        })?;
        removed.pop().ok_or(RemotingError::IndexOutOfBounds { index, len: 0 })
    }

    pub fn remove(&self, index: usize) -> RemotingResult<T> {
        let mut removed = self.core.splice(|len| {
            if index >= len {
                return Err(RemotingError::IndexOutOfBounds { index, len });
            }
            Ok((index, 1, Vec::new()))
        })?;
        removed.pop().ok_or(RemotingError::IndexOutOfBounds { index, len: 0 })
    }

    /// Removes the half-open range `[from, to)`.
    pub fn remove_range(&self, from: usize, to: usize) -> RemotingResult<Vec<T>> {
        self.core.splice(|len| {
            if from > to {
                return Err(RemotingError::IndexOutOfBounds { index: from, len });
            }
            Ok((from, to - from, Vec::new()))
        })
    }

    /// Removes `remove_count` elements starting at `start` and inserts
    /// `items` in their place, as one change.
    pub fn splice<I>(&self, start: usize, remove_count: usize, items: I) -> RemotingResult<Vec<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let inserted = items.into_iter().collect();
        self.core.splice(|_| Ok((start, remove_count, inserted)))
    }

    pub fn clear(&self) -> RemotingResult<()> {
        self.core.splice(|len| Ok((0, len, Vec::new()))).map(drop)
    }

    /// Replaces the whole contents as one change.
    pub fn replace_all<I>(&self, items: I) -> RemotingResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        let inserted = items.into_iter().collect();
        self.core.splice(|len| Ok((0, len, inserted))).map(drop)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.core.lock().items.get(index).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.core.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.core.lock().items.clone()
    }

    /// The list's current phase. Only `Idle` unless another thread is
    /// mutating or replaying it right now.
    #[must_use]
    pub fn phase(&self) -> ListPhase {
        self.core.lock().phase
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.core.lock().binding.is_some()
    }

    /// Binds the list. Nothing is emitted until the slot is announced.
    pub(crate) fn bind(&self, binding: ListBinding) -> RemotingResult<Arc<dyn ListSlot>> {
        let mut state = self.core.lock();
        if state.binding.is_some() {
            return Err(RemotingError::AlreadyManaged(binding.source));
        }
        trace!("Bound list {}.{}", binding.source, binding.attribute);
        state.binding = Some(binding);
        drop(state);
        let slot: Arc<dyn ListSlot> = self.core.clone();
        Ok(slot)
    }
}
