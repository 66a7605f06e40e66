//! Bean mirroring for beanlink.
//!
//! Beans are typed objects whose properties and lists are backed by models in
//! a shared [`ModelStore`](beanlink_store::ModelStore). A controller and a
//! presentation process each run a [`RemotingContext`] over their own store;
//! a transport replays one store's local changes into the other, and the
//! contexts keep both bean graphs identical:
//!
//! - property writes go straight to model attributes;
//! - list mutations are diffed into ADD/REMOVE/REPLACE records and replayed
//!   on the other side without echoing back;
//! - bean identity is the backing model id, kept in the [`BeanRepository`].
//!
//! # Example
//!
//! ```
//! use beanlink_remoting::{
//!     Bean, Binder, ClassSchema, ObservableList, Property, RemotingConfig, RemotingContext,
//!     RemotingResult,
//! };
//! use beanlink_store::InMemoryModelStore;
//! use beanlink_types::ValueType;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Task {
//!     title: Property<String>,
//!     labels: ObservableList<String>,
//! }
//!
//! impl Bean for Task {
//!     const CLASS_NAME: &'static str = "Task";
//!
//!     fn schema() -> ClassSchema {
//!         ClassSchema::new(Self::CLASS_NAME)
//!             .property("title", ValueType::Text)
//!             .list("labels", ValueType::Text)
//!     }
//!
//!     fn instantiate() -> RemotingResult<Self> {
//!         Ok(Self::default())
//!     }
//!
//!     fn bind(&mut self, binder: &mut Binder<'_>) -> RemotingResult<()> {
//!         binder.property("title", &mut self.title)?;
//!         binder.list("labels", &self.labels)
//!     }
//! }
//!
//! # fn main() -> RemotingResult<()> {
//! let store = Arc::new(InMemoryModelStore::new());
//! let context = RemotingContext::new(store, RemotingConfig::controller());
//! let task = context.create::<Task>()?;
//! task.title.set("Write docs".to_string())?;
//! task.labels.push("urgent".to_string())?;
//! assert_eq!(task.title.get()?.as_deref(), Some("Write docs"));
//! assert!(context.is_managed(&task));
//! # Ok(())
//! # }
//! ```

pub mod bean;
pub mod bean_builder;
pub mod bean_repository;
pub mod class_repository;
pub mod config;
pub mod context;
pub mod converters;
pub mod dynamic;
pub mod error;
pub mod list;
pub mod property;
pub mod protocol;
pub mod query;
pub mod schema;

pub use bean::{Bean, Binder};
pub use bean_builder::BeanBuilder;
pub use bean_repository::{BeanEntry, BeanKind, BeanRepository};
pub use class_repository::{ClassInfo, ClassRepository, PropertyInfo, PropertyKind};
pub use config::{RemotingConfig, Side};
pub use context::RemotingContext;
pub use converters::{Converter, Converters};
pub use dynamic::DynamicBean;
pub use error::{RemotingError, RemotingResult};
pub use list::{ListChange, ListMapper, ListPhase, ListSlot, ObservableList};
pub use property::{Property, PropertyValue};
pub use protocol::{ListChangeRecord, ListOp, ListOpKind};
pub use query::BeanQuery;
pub use schema::{ClassSchema, SlotKind, SlotSchema};
