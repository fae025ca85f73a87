//! High-level toggle engine API.
//!
//! Provides `ToggleEngine`, which owns an Entity Store, an In-Flight
//! Tracker and a Toggle Coordinator wired to the remote endpoints.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::config::{EngineConfig, ToggleEngineBuilder};
use super::view::ViewAdapter;
use crate::core::{ActorId, EntityId, ErrorNotifier, ReactionType, StoreError};
use crate::store::{CanonicalEntity, EntityStore, HydrateOutcome, InteractableEntity, StoreEvent};
use crate::sync::{EntityReader, ToggleCoordinator, ToggleEndpoint, ToggleResult};

/// Optimistic toggle engine.
///
/// Cheap to clone; clones share the store and the in-flight requests.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use toggle_sync::client::ToggleEngine;
/// use toggle_sync::server::InMemoryServer;
/// use toggle_sync::store::{CanonicalEntity, InteractionState};
///
/// # tokio_test_block_on(async {
/// let post = CanonicalEntity::new("post-1", InteractionState::empty_likes());
/// let server = Arc::new(InMemoryServer::new().with_entity(post.clone()));
///
/// let engine = ToggleEngine::builder().build(server.clone(), server);
/// engine.hydrate(post);
///
/// let outcome = engine.like(&"post-1".into(), &"alice".into()).await?;
/// assert!(outcome.reacted);
/// assert_eq!(outcome.count, 1);
/// # Ok::<(), toggle_sync::core::ToggleError>(())
/// # }).unwrap();
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToggleEngine {
    store: EntityStore,
    coordinator: ToggleCoordinator,
    config: EngineConfig,
}

impl ToggleEngine {
    /// Start configuring an engine.
    pub fn builder() -> ToggleEngineBuilder {
        ToggleEngineBuilder::new()
    }

    pub(crate) fn new(
        config: EngineConfig,
        endpoint: Arc<dyn ToggleEndpoint>,
        reader: Arc<dyn EntityReader>,
        notifier: Option<Arc<dyn ErrorNotifier>>,
    ) -> Self {
        let store = EntityStore::with_event_capacity(config.event_capacity);
        let mut coordinator =
            ToggleCoordinator::new(store.clone(), endpoint, reader, config.coordinator());
        if let Some(notifier) = notifier {
            coordinator = coordinator.with_notifier(notifier);
        }

        tracing::debug!(
            dedupe_window_ms = config.dedupe_window.as_millis() as u64,
            reconcile_on_failure = config.reconcile_on_failure,
            "toggle engine created"
        );

        Self {
            store,
            coordinator,
            config,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying Entity Store.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Load or refresh an entity fetched by the feed.
    pub fn hydrate(&self, entity: CanonicalEntity) -> HydrateOutcome {
        self.store.hydrate(entity)
    }

    /// Load or refresh a page of entities.
    pub fn hydrate_all(&self, entities: impl IntoIterator<Item = CanonicalEntity>) {
        for entity in entities {
            self.store.hydrate(entity);
        }
    }

    /// Read a copy of an entity.
    pub fn read(&self, entity_id: &EntityId) -> Result<InteractableEntity, StoreError> {
        self.store.read(entity_id)
    }

    /// Toggle `actor`'s interaction on `entity_id`.
    ///
    /// `reaction` is required for multi-type entities and must be `None` for
    /// single-type ones.
    pub async fn toggle(
        &self,
        entity_id: &EntityId,
        actor: &ActorId,
        reaction: Option<ReactionType>,
    ) -> ToggleResult {
        self.coordinator
            .toggle_interaction(entity_id, actor, reaction)
            .await
    }

    /// Toggle a like.
    pub async fn like(&self, entity_id: &EntityId, actor: &ActorId) -> ToggleResult {
        self.toggle(entity_id, actor, None).await
    }

    /// Toggle a typed reaction.
    pub async fn react(
        &self,
        entity_id: &EntityId,
        actor: &ActorId,
        reaction: impl Into<ReactionType>,
    ) -> ToggleResult {
        self.toggle(entity_id, actor, Some(reaction.into())).await
    }

    /// View adapter rendering for `actor`.
    pub fn view(&self, actor: impl Into<ActorId>) -> ViewAdapter {
        ViewAdapter::new(self.store.clone(), actor.into())
            .with_tracker(self.coordinator.tracker().clone())
    }

    /// Whether `entity_id` is pending only because its request settled with
    /// a stale response. The next toggle on it takes the pending state over.
    pub fn is_orphaned(&self, entity_id: &EntityId) -> bool {
        self.coordinator.is_orphaned(entity_id)
    }

    /// Subscribe to the store change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    /// Number of outstanding requests.
    pub fn in_flight(&self) -> usize {
        self.coordinator.tracker().in_flight()
    }

    /// Forget every outstanding request.
    ///
    /// Requests already running still settle against the store.
    pub fn reset_in_flight(&self) {
        self.coordinator.tracker().reset();
    }
}
