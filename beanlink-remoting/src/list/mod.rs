//! Observable lists and the diff/replay engine behind them.

mod list_mapper;
mod observable_list;

pub use list_mapper::ListMapper;
pub use observable_list::{ListChange, ListPhase, ObservableList};

pub(crate) use observable_list::ListBinding;

use crate::error::RemotingResult;
use beanlink_types::WireValue;

/// Type-erased view of a bound list, used to replay inbound records.
///
/// The `apply_*` methods replay a change without emitting records.
pub trait ListSlot: Send + Sync {
    /// Inserts a decoded element at `pos`.
    fn apply_add(&self, pos: usize, element: &WireValue) -> RemotingResult<()>;

    /// Removes the half-open range `[from, to)`.
    fn apply_remove(&self, from: usize, to: usize) -> RemotingResult<()>;

    /// Overwrites the element at `pos`.
    fn apply_replace(&self, pos: usize, element: &WireValue) -> RemotingResult<()>;

    /// Current length.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Emits the current contents as additions, once. Until then local
    /// mutations are not mirrored.
    fn announce(&self) -> RemotingResult<()>;

    /// Discards the local contents in favour of the peer's, which arrive as
    /// records, and starts mirroring local mutations.
    fn adopt(&self);

    /// Drops the binding; later local mutations stay local.
    fn unbind(&self);
}
