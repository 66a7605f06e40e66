//! The per-connection remoting context.
//!
//! A [`RemotingContext`] owns one instance of every component and routes
//! store events to them. It subscribes to the store before anything else
//! happens, so bean creations and list records reach it on a single channel
//! in the order the store applied them:
//!
//! - an inbound list record is replayed by the [`ListMapper`];
//! - a remote model of a registered bean type is materialized as a bean;
//! - a remote model removal detaches the bean it backed;
//! - a remote class model is checked against the local descriptor.

use crate::bean::Bean;
use crate::bean_builder::BeanBuilder;
use crate::bean_repository::BeanRepository;
use crate::class_repository::ClassRepository;
use crate::config::{RemotingConfig, Side};
use crate::converters::Converters;
use crate::dynamic::DynamicBean;
use crate::error::{RemotingError, RemotingResult};
use crate::list::ListMapper;
use crate::protocol::{CLASS_MODEL_TYPE, CLASS_NAME_ATTRIBUTE};
use crate::query::BeanQuery;
use crate::schema::ClassSchema;
use beanlink_store::{
    ModelSnapshot, ModelStore, Origin, StoreEvent, StoreSubscription, TypeFilter,
};
use beanlink_types::{BeanHandle, ModelId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

type Factory = Arc<dyn Fn(&BeanBuilder, &ModelId) -> RemotingResult<BeanHandle> + Send + Sync>;

/// One side of a remoting connection.
pub struct RemotingContext {
    config: RemotingConfig,
    store: Arc<dyn ModelStore>,
    beans: Arc<BeanRepository>,
    classes: Arc<ClassRepository>,
    mapper: Arc<ListMapper>,
    builder: BeanBuilder,
    factories: RwLock<HashMap<String, Factory>>,
    inbox: Mutex<StoreSubscription>,
}

impl RemotingContext {
    /// Creates a context over `store` with the built-in converters.
    pub fn new(store: Arc<dyn ModelStore>, config: RemotingConfig) -> Self {
        Self::with_converters(store, config, |_| {})
    }

    /// Creates a context, letting `configure` replace built-in converters
    /// before any class is described.
    pub fn with_converters<F>(
        store: Arc<dyn ModelStore>,
        config: RemotingConfig,
        configure: F,
    ) -> Self
    where
        F: FnOnce(&mut Converters),
    {
        let inbox = store.subscribe(TypeFilter::All);
        let beans = Arc::new(BeanRepository::new(Arc::clone(&store)));
        let mut converters = Converters::new(&beans);
        configure(&mut converters);
        let classes = Arc::new(ClassRepository::new(
            Arc::clone(&store),
            converters,
            config.publish_class_models,
        ));
        let mapper = Arc::new(ListMapper::new(
            Arc::clone(&store),
            Arc::clone(&beans),
            config.side,
        ));
        let builder = BeanBuilder::new(
            Arc::clone(&store),
            Arc::clone(&classes),
            Arc::clone(&beans),
            Arc::clone(&mapper),
        );
        info!("Remoting context {} started as {:?}", config.name, config.side);
        Self {
            config,
            store,
            beans,
            classes,
            mapper,
            builder,
            factories: RwLock::new(HashMap::new()),
            inbox: Mutex::new(inbox),
        }
    }

    // ── Bean lifecycle ──────────────────────────────────────────────

    /// Creates a bean of type `T`.
    pub fn create<T: Bean>(&self) -> RemotingResult<Arc<T>> {
        let bean = self.builder.create::<T>()?;
        debug!("[{}] created {}", self.config.name, T::CLASS_NAME);
        Ok(bean)
    }

    /// Creates a dynamic bean of the class `schema` describes.
    pub fn create_dynamic(&self, schema: &ClassSchema) -> RemotingResult<Arc<DynamicBean>> {
        let bean = self.builder.create_dynamic(schema)?;
        debug!("[{}] created dynamic {}", self.config.name, schema.name());
        Ok(bean)
    }

    /// Deletes a managed bean and its backing model.
    pub fn delete<T: ?Sized>(&self, bean: &Arc<T>) -> RemotingResult<()> {
        self.beans.delete(bean)
    }

    /// Deletes every managed bean of type `T`.
    pub fn delete_all<T: Bean>(&self) -> RemotingResult<usize> {
        self.beans.delete_all(T::CLASS_NAME)
    }

    /// Deletes every managed bean of the named class.
    pub fn delete_all_of(&self, class_name: &str) -> RemotingResult<usize> {
        self.beans.delete_all(class_name)
    }

    // ── Lookup ──────────────────────────────────────────────────────

    pub fn is_managed<T: ?Sized>(&self, bean: &Arc<T>) -> bool {
        self.beans.is_managed(bean)
    }

    pub fn get_id<T: ?Sized>(&self, bean: &Arc<T>) -> RemotingResult<ModelId> {
        self.beans.get_id(bean)
    }

    /// Returns the bean registered under `id` if it is a `T`.
    #[must_use]
    pub fn find_by_id<T: Bean>(&self, id: &ModelId) -> Option<Arc<T>> {
        self.beans.get_bean_as::<T>(id)
    }

    /// Returns the dynamic bean registered under `id`.
    #[must_use]
    pub fn find_dynamic_by_id(&self, id: &ModelId) -> Option<Arc<DynamicBean>> {
        self.beans.get_bean_as::<DynamicBean>(id)
    }

    /// Managed beans of type `T`, in registration order.
    #[must_use]
    pub fn find_all<T: Bean>(&self) -> Vec<Arc<T>> {
        self.beans.find_all_as::<T>(T::CLASS_NAME)
    }

    /// Managed dynamic beans of the named class, in registration order.
    #[must_use]
    pub fn find_all_dynamic(&self, class_name: &str) -> Vec<Arc<DynamicBean>> {
        self.beans.find_all_as::<DynamicBean>(class_name)
    }

    /// Starts a query over the managed beans of type `T`.
    pub fn query<T: Bean>(&self) -> RemotingResult<BeanQuery<'_, T>> {
        let class = self.classes.get_class_info(&T::schema())?;
        Ok(BeanQuery::new(&self.beans, self.store.as_ref(), class))
    }

    /// Starts a query over the managed dynamic beans of the named class.
    pub fn query_dynamic(&self, class_name: &str) -> RemotingResult<BeanQuery<'_, DynamicBean>> {
        let class = self
            .classes
            .lookup(class_name)
            .ok_or_else(|| RemotingError::UnknownClass(class_name.to_string()))?;
        Ok(BeanQuery::new(&self.beans, self.store.as_ref(), class))
    }

    // ── Remote materialization ──────────────────────────────────────

    /// Mirrors models of `T`'s class created by the peer as `T` beans.
    /// Unmanaged models of that class already in the store are adopted
    /// immediately, together with the list records that arrived for them.
    pub fn register_bean_type<T: Bean>(&self) -> RemotingResult<()> {
        self.classes.get_class_info(&T::schema())?;
        let factory: Factory = Arc::new(|builder: &BeanBuilder, id: &ModelId| {
            builder.materialize::<T>(id).map(BeanHandle::new)
        });
        self.register_factory(T::CLASS_NAME, factory)
    }

    /// Mirrors models of the class `schema` describes as dynamic beans.
    pub fn register_dynamic_type(&self, schema: ClassSchema) -> RemotingResult<()> {
        self.classes.get_class_info(&schema)?;
        let class_name = schema.name().to_string();
        let factory: Factory = Arc::new(move |builder: &BeanBuilder, id: &ModelId| {
            builder
                .materialize_dynamic(&schema, id)
                .map(BeanHandle::new)
        });
        self.register_factory(&class_name, factory)
    }

    fn register_factory(&self, class_name: &str, factory: Factory) -> RemotingResult<()> {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class_name.to_string(), Arc::clone(&factory));
        for model in self.store.find_models_by_type(class_name) {
            if self.beans.get_bean(&model.id).is_none() {
                factory(&self.builder, &model.id)?;
            }
        }
        Ok(())
    }

    // ── Event processing ────────────────────────────────────────────

    /// Handles every store event queued so far without waiting. Returns the
    /// number of events handled.
    ///
    /// Returns 0 while [`RemotingContext::run`] owns the event channel.
    pub fn process_pending(&self) -> usize {
        let Ok(mut inbox) = self.inbox.try_lock() else {
            return 0;
        };
        let mut handled = 0;
        while let Ok(event) = inbox.try_recv() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Handles store events as they arrive until the store is dropped.
    pub async fn run(&self) {
        info!("[{}] inbound loop started", self.config.name);
        let mut inbox = self.inbox.lock().await;
        while let Some(event) = inbox.recv().await {
            self.dispatch(event);
        }
        info!("[{}] inbound loop stopped", self.config.name);
    }

    fn dispatch(&self, event: StoreEvent) {
        match event {
            StoreEvent::ModelAdded { model, origin } => {
                if self.mapper.handles(&model.model_type) {
                    self.mapper.apply_record(&model);
                } else if origin == Origin::Remote {
                    if model.model_type == CLASS_MODEL_TYPE {
                        self.verify_class(&model);
                    } else {
                        self.materialize(&model);
                    }
                }
            }
            StoreEvent::ModelRemoved {
                model,
                origin: Origin::Remote,
            } => {
                if self.beans.forget(&model.id).is_some() {
                    debug!("[{}] peer removed bean {}", self.config.name, model.id);
                }
                let dropped = self.mapper.discard_deferred(&model.id);
                if dropped > 0 {
                    debug!(
                        "[{}] dropped {} deferred records for {}",
                        self.config.name, dropped, model.id
                    );
                }
            }
            _ => {}
        }
    }

    fn materialize(&self, model: &ModelSnapshot) {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&model.model_type)
            .cloned();
        let Some(factory) = factory else {
            trace!("No bean type registered for {}", model.model_type);
            return;
        };
        if self.beans.get_bean(&model.id).is_some() {
            return;
        }
        match factory(&self.builder, &model.id) {
            Ok(_) => debug!(
                "[{}] materialized {} {}",
                self.config.name, model.model_type, model.id
            ),
            Err(e) => warn!(
                "[{}] cannot materialize {} {}: {}",
                self.config.name, model.model_type, model.id, e
            ),
        }
    }

    fn verify_class(&self, model: &ModelSnapshot) {
        let Some(class_name) = model.attribute(CLASS_NAME_ATTRIBUTE).and_then(|v| v.as_text())
        else {
            warn!("[{}] class model {} has no class name", self.config.name, model.id);
            return;
        };
        let Some(info) = self.classes.lookup(class_name) else {
            return;
        };
        match self.classes.remote_class_matches(info.schema()) {
            Ok(Some(false)) => warn!(
                "[{}] peer's layout of class {} differs from the local one",
                self.config.name, class_name
            ),
            Ok(_) => trace!("Class {} verified", class_name),
            Err(e) => warn!("[{}] cannot verify class {}: {}", self.config.name, class_name, e),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &RemotingConfig {
        &self.config
    }

    #[must_use]
    pub fn side(&self) -> Side {
        self.config.side
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.store
    }

    #[must_use]
    pub fn beans(&self) -> &Arc<BeanRepository> {
        &self.beans
    }

    #[must_use]
    pub fn classes(&self) -> &Arc<ClassRepository> {
        &self.classes
    }

    #[must_use]
    pub fn list_mapper(&self) -> &Arc<ListMapper> {
        &self.mapper
    }

    #[must_use]
    pub fn builder(&self) -> &BeanBuilder {
        &self.builder
    }
}
