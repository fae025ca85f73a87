//! Toggle coordinator
//!
//! Orchestrates one "toggle interaction on entity E for actor U":
//!
//! ```text
//! tracker.acquire_or_join ──joined──▶ await the outstanding request's result
//!        │ acquired
//!        ▼
//! store.apply_optimistic ──pending──▶ AlreadyPending (no side effects)
//!        │
//!        ▼
//! endpoint.toggle(request_id)
//!        ├─ echo mismatch ──▶ StaleResponse (store untouched)
//!        ├─ ok ─────────────▶ store.commit(canonical)
//!        └─ failure ────────▶ reconcile ─ok──▶ store.commit(fetched)
//!                                       └err─▶ store.rollback + notify
//!        ▼
//! publish to joiners, release tracker entry
//! ```
//!
//! Exactly one of commit, reconciled commit or rollback runs per request,
//! and only while the request still owns the entity's pending state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::message::{ToggleRequest, ToggleResponse};
use super::reconcile::Reconciler;
use super::remote::{EntityReader, ToggleEndpoint};
use super::tracker::{Acquisition, InFlightLease, InFlightTracker};
use crate::core::{
    ActorId, DEFAULT_DEDUPE_WINDOW, EntityId, ErrorNotifier, ReactionType, RemoteError, RequestId,
    SilentNotifier, StoreError, ToggleError,
};
use crate::store::{CanonicalEntity, EntityStore, Intent};

/// Settled result of one toggle.
pub type ToggleResult = Result<ToggleOutcome, ToggleError>;

/// Confirmed interaction state after a toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Request that produced the outcome.
    pub request_id: RequestId,
    /// Whether the actor now holds an interaction.
    pub reacted: bool,
    /// The actor's interaction type; `like` for single-type entities.
    pub reaction_type: Option<ReactionType>,
    /// Total count.
    pub count: u64,
    /// Per-type counts (empty for single-type entities).
    pub counts_by_type: BTreeMap<ReactionType, u64>,
    /// Canonical entity.
    pub entity: CanonicalEntity,
    /// Whether the outcome came from a reconciliation read.
    pub reconciled: bool,
}

impl ToggleOutcome {
    /// Outcome reported by a toggle response.
    pub fn from_response(response: ToggleResponse) -> Self {
        match response {
            ToggleResponse::Like(result) => Self {
                request_id: result.request_id,
                reacted: result.liked,
                reaction_type: result.liked.then(ReactionType::like),
                count: result.like_count,
                counts_by_type: BTreeMap::new(),
                entity: result.entity,
                reconciled: false,
            },
            ToggleResponse::Reaction(result) => Self {
                request_id: result.request_id,
                reacted: result.reacted,
                reaction_type: result.reaction_type,
                count: result.count,
                counts_by_type: result.counts_by_type,
                entity: result.entity,
                reconciled: false,
            },
        }
    }

    /// Outcome derived from a reconciled canonical entity.
    pub fn from_canonical(request_id: RequestId, actor: &ActorId, entity: CanonicalEntity) -> Self {
        Self {
            request_id,
            reacted: entity.state.has_interacted(actor),
            reaction_type: entity.state.reaction_of(actor),
            count: entity.state.count,
            counts_by_type: entity.state.counts_by_type.clone(),
            entity,
            reconciled: true,
        }
    }
}

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Toggles on one entity within this window coalesce into one request.
    pub dedupe_window: Duration,

    /// Overall deadline for each remote call; `None` leaves timeouts to the
    /// transport.
    pub request_timeout: Option<Duration>,

    /// Fetch canonical state after a failed toggle instead of rolling back
    /// immediately.
    pub reconcile_on_failure: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            dedupe_window: DEFAULT_DEDUPE_WINDOW,
            request_timeout: None,
            reconcile_on_failure: true,
        }
    }
}

/// Coordinates optimistic toggles against the Entity Store and the remote
/// endpoints.
///
/// Cheap to clone; clones share the store, tracker and collaborators.
#[derive(Clone)]
pub struct ToggleCoordinator {
    store: EntityStore,
    tracker: InFlightTracker<ToggleResult>,
    endpoint: Arc<dyn ToggleEndpoint>,
    reconciler: Reconciler,
    notifier: Arc<dyn ErrorNotifier>,
    config: CoordinatorConfig,
}

impl ToggleCoordinator {
    /// Create a coordinator with its own tracker and a silent notifier.
    pub fn new(
        store: EntityStore,
        endpoint: Arc<dyn ToggleEndpoint>,
        reader: Arc<dyn EntityReader>,
        config: CoordinatorConfig,
    ) -> Self {
        let reconciler = Reconciler::new(reader).with_timeout(config.request_timeout);
        Self {
            store,
            tracker: InFlightTracker::new(),
            endpoint,
            reconciler,
            notifier: Arc::new(SilentNotifier),
            config,
        }
    }

    /// Route user-visible failures to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn ErrorNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// The store this coordinator mutates.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The in-flight request tracker.
    pub fn tracker(&self) -> &InFlightTracker<ToggleResult> {
        &self.tracker
    }

    /// Whether `entity_id` is pending on behalf of a request that already
    /// settled with a stale response.
    ///
    /// Nothing is in flight for such an entity; the next toggle takes it over.
    pub fn is_orphaned(&self, entity_id: &EntityId) -> bool {
        self.store
            .pending_owner(entity_id)
            .is_some_and(|owner| self.tracker.is_orphaned(entity_id, owner))
    }

    /// Coordinator settings.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Toggle `actor_id`'s interaction on `entity_id`.
    ///
    /// `reaction` selects the type for multi-type entities and must be `None`
    /// for single-type ones. A call arriving while another toggle on the same
    /// entity is within the dedupe window performs no mutation or network
    /// call of its own and returns that toggle's result.
    pub async fn toggle_interaction(
        &self,
        entity_id: &EntityId,
        actor_id: &ActorId,
        reaction: Option<ReactionType>,
    ) -> ToggleResult {
        let mut lease = match self.tracker.acquire_or_join(entity_id, self.config.dedupe_window) {
            Acquisition::Joined(joined) => {
                let request_id = joined.request_id();
                return joined
                    .wait()
                    .await
                    .unwrap_or(Err(ToggleError::Abandoned { request_id }));
            }
            Acquisition::Acquired(lease) => lease,
        };

        let result = self
            .drive(&lease, entity_id, actor_id, reaction.as_ref())
            .await;
        lease.publish(result.clone());
        result
    }

    async fn drive(
        &self,
        lease: &InFlightLease<ToggleResult>,
        entity_id: &EntityId,
        actor_id: &ActorId,
        reaction: Option<&ReactionType>,
    ) -> ToggleResult {
        let request_id = lease.request_id();

        let intent = match self.store.apply_optimistic(
            entity_id,
            actor_id,
            reaction,
            request_id,
            lease.supersedes(),
        ) {
            Ok(intent) => intent,
            Err(err) => {
                tracing::warn!(
                    request_id = %request_id,
                    entity_id = %entity_id,
                    error = %err,
                    "optimistic write rejected"
                );
                return Err(err.into());
            }
        };
        if let Some(previous) = lease.supersedes() {
            tracing::info!(
                request_id = %request_id,
                entity_id = %entity_id,
                superseded = %previous,
                "took over pending entity"
            );
        }

        let mut guard = OptimisticGuard {
            store: &self.store,
            entity_id,
            request_id,
            armed: true,
        };

        let request = ToggleRequest {
            request_id,
            entity_id: entity_id.clone(),
            actor_id: actor_id.clone(),
            reaction_type: reaction.cloned(),
        };

        let settled = match self.call_remote(request).await {
            Ok(response) if response.request_id() != request_id => {
                self.reject_stale(entity_id, request_id, response.request_id())
            }
            Ok(response) => match response.check_entity(entity_id) {
                Ok(()) => self.commit_response(entity_id, request_id, response),
                Err(cause) => {
                    self.recover(entity_id, actor_id, request_id, &intent, cause)
                        .await
                }
            },
            Err(cause) => {
                self.recover(entity_id, actor_id, request_id, &intent, cause)
                    .await
            }
        };

        guard.armed = false;
        settled
    }

    async fn call_remote(&self, request: ToggleRequest) -> Result<ToggleResponse, RemoteError> {
        let call = self.endpoint.toggle(request);
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(RemoteError::Timeout)),
            None => call.await,
        }
    }

    fn reject_stale(
        &self,
        entity_id: &EntityId,
        expected: RequestId,
        received: RequestId,
    ) -> ToggleResult {
        tracing::warn!(
            request_id = %expected,
            entity_id = %entity_id,
            received = %received,
            "stale response rejected"
        );
        if self.store.pending_owner(entity_id) == Some(expected) {
            self.tracker.mark_orphaned(entity_id, expected);
        }
        Err(ToggleError::StaleResponse { expected, received })
    }

    fn commit_response(
        &self,
        entity_id: &EntityId,
        request_id: RequestId,
        response: ToggleResponse,
    ) -> ToggleResult {
        let outcome = ToggleOutcome::from_response(response);
        match self
            .store
            .commit(entity_id, outcome.entity.state.clone(), request_id)
        {
            Ok(()) => {
                tracing::debug!(
                    request_id = %request_id,
                    entity_id = %entity_id,
                    reacted = outcome.reacted,
                    count = outcome.count,
                    "committed"
                );
                Ok(outcome)
            }
            Err(err) => self.superseded_or(err, entity_id, request_id),
        }
    }

    async fn recover(
        &self,
        entity_id: &EntityId,
        actor_id: &ActorId,
        request_id: RequestId,
        intent: &Intent,
        cause: RemoteError,
    ) -> ToggleResult {
        tracing::warn!(
            request_id = %request_id,
            entity_id = %entity_id,
            error = %cause,
            "toggle failed"
        );

        if self.store.pending_owner(entity_id) != Some(request_id) {
            return self.superseded(entity_id, request_id);
        }

        if !self.config.reconcile_on_failure {
            self.store.rollback(entity_id, request_id);
            return self.surface(ToggleError::TransientNetworkFailure { request_id, cause });
        }

        match self.reconciler.reconcile(entity_id, actor_id).await {
            Ok(canonical) => {
                let applied = intent.is_reflected_in(&canonical.state, actor_id);
                if let Err(err) = self
                    .store
                    .commit(entity_id, canonical.state.clone(), request_id)
                {
                    return self.superseded_or(err, entity_id, request_id);
                }

                if applied {
                    tracing::info!(
                        request_id = %request_id,
                        entity_id = %entity_id,
                        "reconciled, server shows toggle applied"
                    );
                    Ok(ToggleOutcome::from_canonical(request_id, actor_id, canonical))
                } else {
                    tracing::info!(
                        request_id = %request_id,
                        entity_id = %entity_id,
                        "reconciled, server shows toggle not applied"
                    );
                    self.surface(ToggleError::NotApplied { request_id, cause })
                }
            }
            Err(reconcile) => {
                if !self.store.rollback(entity_id, request_id) {
                    return self.superseded(entity_id, request_id);
                }
                tracing::warn!(
                    request_id = %request_id,
                    entity_id = %entity_id,
                    error = %reconcile,
                    "reconciliation failed, rolled back"
                );
                self.surface(ToggleError::ReconciliationFailure {
                    request_id,
                    cause,
                    reconcile,
                })
            }
        }
    }

    fn superseded_or(
        &self,
        err: StoreError,
        entity_id: &EntityId,
        request_id: RequestId,
    ) -> ToggleResult {
        match err {
            StoreError::NotOwner { .. } => self.superseded(entity_id, request_id),
            other => Err(other.into()),
        }
    }

    fn superseded(&self, entity_id: &EntityId, request_id: RequestId) -> ToggleResult {
        tracing::info!(
            request_id = %request_id,
            entity_id = %entity_id,
            "settled after being superseded, result discarded"
        );
        Err(ToggleError::Superseded { request_id })
    }

    fn surface(&self, error: ToggleError) -> ToggleResult {
        self.notifier.notify(&error);
        Err(error)
    }
}

impl fmt::Debug for ToggleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToggleCoordinator")
            .field("store", &self.store)
            .field("in_flight", &self.tracker.in_flight())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Rolls back the optimistic write if the toggle future is dropped before
/// it settles.
struct OptimisticGuard<'a> {
    store: &'a EntityStore,
    entity_id: &'a EntityId,
    request_id: RequestId,
    armed: bool,
}

impl Drop for OptimisticGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.store.rollback(self.entity_id, self.request_id) {
            tracing::warn!(
                request_id = %self.request_id,
                entity_id = %self.entity_id,
                "toggle dropped before settling, rolled back"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InteractionState, Reaction, StoreEventKind};
    use crate::sync::testing::{RemoteScript, ScriptedRemote, init_tracing, likes};
    use parking_lot::Mutex;

    struct Harness {
        coordinator: ToggleCoordinator,
        remote: Arc<ScriptedRemote>,
        script: RemoteScript,
        notices: Arc<Mutex<Vec<ToggleError>>>,
    }

    fn harness(config: CoordinatorConfig, initial: CanonicalEntity) -> Harness {
        init_tracing();
        let store = EntityStore::new();
        store.hydrate(initial);
        let (remote, script) = ScriptedRemote::new();
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notices);
        let coordinator = ToggleCoordinator::new(store, remote.clone(), remote.clone(), config)
            .with_notifier(Arc::new(move |err: &ToggleError| sink.lock().push(err.clone())));
        Harness {
            coordinator,
            remote,
            script,
            notices,
        }
    }

    fn post(likers: &[&str]) -> CanonicalEntity {
        CanonicalEntity::new("p", likes(likers))
    }

    fn spawn_toggle(
        coordinator: &ToggleCoordinator,
        actor: &str,
        reaction: Option<&str>,
    ) -> tokio::task::JoinHandle<ToggleResult> {
        let coordinator = coordinator.clone();
        let actor = ActorId::new(actor);
        let reaction = reaction.map(ReactionType::new);
        tokio::spawn(async move {
            coordinator
                .toggle_interaction(&"p".into(), &actor, reaction)
                .await
        })
    }

    fn entity(h: &Harness) -> crate::store::InteractableEntity {
        h.coordinator.store().read(&"p".into()).unwrap()
    }

    #[tokio::test]
    async fn test_like_commits_server_state() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);

        let call = h.script.next_call().await;
        let optimistic = entity(&h);
        assert_eq!(optimistic.count(), 1);
        assert!(optimistic.state().has_interacted(&"u".into()));
        assert_eq!(optimistic.pending_owner(), Some(call.request.request_id));

        call.respond_with_state(likes(&["u"]));
        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.reacted);
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.reaction_type, Some(ReactionType::like()));
        assert!(!outcome.reconciled);

        let settled = entity(&h);
        assert_eq!(settled.count(), 1);
        assert!(settled.state().has_interacted(&"u".into()));
        assert!(!settled.is_pending());
        assert!(settled.snapshot().is_none());
        assert_eq!(h.coordinator.tracker().in_flight(), 0);
        assert!(h.notices.lock().is_empty());
    }

    #[tokio::test]
    async fn test_commit_adopts_server_state_verbatim() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);

        // Someone else liked concurrently; the server is authoritative.
        h.script
            .next_call()
            .await
            .respond_with_state(likes(&["u", "v", "w"]));
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.count, 3);
        assert_eq!(entity(&h).count(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_clicks_make_one_call() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let first = spawn_toggle(&h.coordinator, "u", None);
        let call = h.script.next_call().await;

        let second = spawn_toggle(&h.coordinator, "u", None);
        let third = spawn_toggle(&h.coordinator, "u", None);
        tokio::task::yield_now().await;

        // Joiners do not touch the store.
        assert_eq!(entity(&h).count(), 1);

        call.respond_with_state(likes(&["u"]));
        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        let c = third.await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);

        assert_eq!(h.remote.toggle_calls(), 1);
        let settled = entity(&h);
        assert_eq!(settled.count(), 1);
        assert_eq!(settled.state().interactions.len(), 1);
    }

    #[tokio::test]
    async fn test_joiner_shares_failure() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let first = spawn_toggle(&h.coordinator, "u", None);
        let call = h.script.next_call().await;
        let second = spawn_toggle(&h.coordinator, "u", None);
        tokio::task::yield_now().await;

        call.fail(RemoteError::Network("reset".into()));
        h.script
            .next_read()
            .await
            .fail(RemoteError::Network("offline".into()));

        let a = first.await.unwrap();
        let b = second.await.unwrap();
        assert!(matches!(a, Err(ToggleError::ReconciliationFailure { .. })));
        assert_eq!(a, b);
        // Only the leader notifies.
        assert_eq!(h.notices.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot_when_reconciliation_fails() {
        let mut h = harness(CoordinatorConfig::default(), post(&["a", "b"]));
        let before = entity(&h);
        let task = spawn_toggle(&h.coordinator, "u", None);

        let call = h.script.next_call().await;
        assert_eq!(entity(&h).count(), 3);
        call.fail(RemoteError::Status {
            code: 503,
            message: "unavailable".into(),
        });
        h.script.next_read().await.fail(RemoteError::Timeout);

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ToggleError::ReconciliationFailure { .. }));
        assert!(err.is_user_visible());

        let after = entity(&h);
        assert_eq!(after.state(), before.state());
        assert_eq!(after.count(), 2);
        assert!(!after.state().has_interacted(&"u".into()));
        assert!(!after.is_pending());
        assert_eq!(h.notices.lock().as_slice(), &[err]);
    }

    #[tokio::test]
    async fn test_reconciliation_adopts_applied_toggle() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);

        // The toggle landed server-side but the response was lost.
        h.script
            .next_call()
            .await
            .fail(RemoteError::Network("connection reset".into()));
        h.script.next_read().await.respond_with_state(likes(&["u"]));

        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.reacted);
        assert!(outcome.reconciled);
        assert_eq!(outcome.count, 1);

        let settled = entity(&h);
        assert!(settled.state().has_interacted(&"u".into()));
        assert!(!settled.is_pending());
        assert!(h.notices.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reconciliation_shows_reality_when_not_applied() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);

        h.script
            .next_call()
            .await
            .fail(RemoteError::Network("connection reset".into()));
        h.script.next_read().await.respond_with_state(likes(&[]));

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ToggleError::NotApplied { .. }));

        let settled = entity(&h);
        assert_eq!(settled.count(), 0);
        assert!(settled.state().interactions.is_empty());
        assert!(!settled.is_pending());
        assert_eq!(h.notices.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_response_does_not_touch_store() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);

        let call = h.script.next_call().await;
        let optimistic = entity(&h);
        let foreign = RequestId::generate();
        call.respond_as(foreign, likes(&[]));

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ToggleError::StaleResponse { received, .. } if received == foreign
        ));
        assert!(!err.is_user_visible());
        assert_eq!(entity(&h), optimistic);
        assert!(h.notices.lock().is_empty());
    }

    #[tokio::test]
    async fn test_orphaned_pending_is_adopted_by_next_toggle() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);
        h.script
            .next_call()
            .await
            .respond_as(RequestId::generate(), likes(&["u"]));
        assert!(task.await.unwrap().is_err());
        assert!(entity(&h).is_pending());
        assert!(h.coordinator.is_orphaned(&"p".into()));
        assert_eq!(h.coordinator.tracker().in_flight(), 0);

        // The user clicks again: the new request adopts the stale one's
        // optimistic state instead of being blocked.
        let task = spawn_toggle(&h.coordinator, "u", None);
        let call = h.script.next_call().await;
        assert_eq!(entity(&h).count(), 0);
        call.respond_with_state(likes(&[]));

        let outcome = task.await.unwrap().unwrap();
        assert!(!outcome.reacted);
        assert!(!entity(&h).is_pending());
        assert!(!h.coordinator.is_orphaned(&"p".into()));
    }

    #[tokio::test]
    async fn test_older_stale_response_after_newer_commit() {
        let config = CoordinatorConfig {
            dedupe_window: Duration::ZERO,
            ..CoordinatorConfig::default()
        };
        let mut h = harness(config, post(&[]));

        let r1 = spawn_toggle(&h.coordinator, "u", None);
        let call1 = h.script.next_call().await;
        let r2 = spawn_toggle(&h.coordinator, "u", None);
        let call2 = h.script.next_call().await;

        call2.respond_with_state(likes(&["u"]));
        assert!(r2.await.unwrap().is_ok());

        // R1 settles last, echoing an id nobody is waiting for.
        let foreign = RequestId::generate();
        call1.respond_as(foreign, likes(&[]));
        let older = r1.await.unwrap();
        assert!(matches!(
            older,
            Err(ToggleError::StaleResponse { received, .. }) if received == foreign
        ));

        let settled = entity(&h);
        assert_eq!(settled.count(), 1);
        assert!(settled.state().has_interacted(&"u".into()));
        assert!(!settled.is_pending());
        assert!(h.coordinator.tracker().orphan(&"p".into()).is_none());
        assert!(!h.coordinator.is_orphaned(&"p".into()));
        assert!(h.notices.lock().is_empty());
    }

    #[tokio::test]
    async fn test_older_request_cannot_overwrite_newer_commit() {
        let config = CoordinatorConfig {
            dedupe_window: Duration::ZERO,
            ..CoordinatorConfig::default()
        };
        let mut h = harness(config, post(&[]));

        let r1 = spawn_toggle(&h.coordinator, "u", None);
        let call1 = h.script.next_call().await;
        let r2 = spawn_toggle(&h.coordinator, "u", None);
        let call2 = h.script.next_call().await;
        assert_ne!(call1.request.request_id, call2.request.request_id);
        assert_eq!(entity(&h).pending_owner(), Some(call2.request.request_id));

        // R2 lands first.
        call2.respond_with_state(likes(&["u"]));
        let newer = r2.await.unwrap().unwrap();
        assert_eq!(newer.count, 1);

        // R1 settles afterwards with an older view.
        call1.respond_with_state(likes(&[]));
        let older = r1.await.unwrap();
        assert!(matches!(older, Err(ToggleError::Superseded { .. })));

        let settled = entity(&h);
        assert_eq!(settled.count(), 1);
        assert!(settled.state().has_interacted(&"u".into()));
        assert!(!settled.is_pending());
    }

    #[tokio::test]
    async fn test_older_failure_does_not_reconcile_after_takeover() {
        let config = CoordinatorConfig {
            dedupe_window: Duration::ZERO,
            ..CoordinatorConfig::default()
        };
        let mut h = harness(config, post(&[]));

        let r1 = spawn_toggle(&h.coordinator, "u", None);
        let call1 = h.script.next_call().await;
        let r2 = spawn_toggle(&h.coordinator, "u", None);
        let call2 = h.script.next_call().await;

        call1.fail(RemoteError::Timeout);
        assert!(matches!(
            r1.await.unwrap(),
            Err(ToggleError::Superseded { .. })
        ));
        assert!(h.script.reads.try_recv().is_err());

        call2.respond_with_state(likes(&[]));
        assert!(r2.await.unwrap().is_ok());
        assert!(h.notices.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reaction_toggle_round_trip() {
        let initial = CanonicalEntity::new(
            "p",
            InteractionState::from_reactions([Reaction::new("a", "wow")]),
        );
        let mut h = harness(CoordinatorConfig::default(), initial);
        let task = spawn_toggle(&h.coordinator, "u", Some("love"));

        let call = h.script.next_call().await;
        assert_eq!(call.request.reaction_type, Some("love".into()));
        let optimistic = entity(&h);
        assert_eq!(optimistic.count(), 2);
        assert_eq!(optimistic.state().counts_by_type.get(&"love".into()), Some(&1));

        let server = InteractionState::from_reactions([
            Reaction::new("a", "wow"),
            Reaction::new("u", "love"),
        ]);
        call.respond_with_state(server.clone());

        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.reacted);
        assert_eq!(outcome.reaction_type, Some("love".into()));
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.counts_by_type, server.counts_by_type);
        assert_eq!(entity(&h).state(), &server);
    }

    #[tokio::test]
    async fn test_mode_mismatch_is_rejected_without_call() {
        let h = harness(CoordinatorConfig::default(), post(&[]));
        let result = h
            .coordinator
            .toggle_interaction(&"p".into(), &"u".into(), Some("love".into()))
            .await;
        assert!(matches!(
            result,
            Err(ToggleError::InteractionMismatch { expected: "like", .. })
        ));
        assert_eq!(h.remote.toggle_calls(), 0);
        assert_eq!(h.coordinator.tracker().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unknown_entity() {
        let h = harness(CoordinatorConfig::default(), post(&[]));
        let result = h
            .coordinator
            .toggle_interaction(&"missing".into(), &"u".into(), None)
            .await;
        assert!(matches!(result, Err(ToggleError::NotFound { .. })));
        assert_eq!(h.remote.toggle_calls(), 0);
    }

    #[tokio::test]
    async fn test_already_pending_from_another_coordinator() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);
        let call = h.script.next_call().await;

        // A second coordinator sharing the store has its own tracker.
        let (other_remote, _other_script) = ScriptedRemote::new();
        let other = ToggleCoordinator::new(
            h.coordinator.store().clone(),
            other_remote.clone(),
            other_remote.clone(),
            CoordinatorConfig::default(),
        );
        let before = entity(&h);
        let result = other
            .toggle_interaction(&"p".into(), &"u".into(), None)
            .await;
        assert!(matches!(result, Err(ToggleError::AlreadyPending { .. })));
        assert_eq!(entity(&h), before);
        assert_eq!(other_remote.toggle_calls(), 0);

        call.respond_with_state(likes(&["u"]));
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_reconciliation_disabled_rolls_back() {
        let config = CoordinatorConfig {
            reconcile_on_failure: false,
            ..CoordinatorConfig::default()
        };
        let mut h = harness(config, post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);

        h.script
            .next_call()
            .await
            .fail(RemoteError::Network("reset".into()));
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ToggleError::TransientNetworkFailure { .. }));
        assert_eq!(entity(&h).count(), 0);
        assert!(!entity(&h).is_pending());
        assert!(h.script.reads.try_recv().is_err());
        assert_eq!(h.notices.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_response_goes_through_reconciliation() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);

        let call = h.script.next_call().await;
        let request_id = call.request.request_id;
        let wrong_entity = CanonicalEntity::new("q", likes(&["u"]));
        call.respond(Ok(ToggleResponse::for_actor(
            request_id,
            &"u".into(),
            wrong_entity,
        )));
        h.script.next_read().await.respond_with_state(likes(&["u"]));

        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.reconciled);
        assert_eq!(outcome.entity.id, EntityId::from("p"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_triggers_reconciliation() {
        let config = CoordinatorConfig {
            request_timeout: Some(Duration::from_secs(10)),
            ..CoordinatorConfig::default()
        };
        let mut h = harness(config, post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);

        // Never answered; the deadline elapses.
        let _call = h.script.next_call().await;
        h.script.next_read().await.respond_with_state(likes(&[]));

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ToggleError::NotApplied {
                cause: RemoteError::Timeout,
                ..
            }
        ));
        assert!(!entity(&h).is_pending());
    }

    #[tokio::test]
    async fn test_cancelled_toggle_rolls_back() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let task = spawn_toggle(&h.coordinator, "u", None);
        let _call = h.script.next_call().await;
        assert!(entity(&h).is_pending());

        task.abort();
        let _ = task.await;

        let settled = entity(&h);
        assert!(!settled.is_pending());
        assert_eq!(settled.count(), 0);
        assert_eq!(h.coordinator.tracker().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_store_events_follow_one_commit() {
        let mut h = harness(CoordinatorConfig::default(), post(&[]));
        let mut events = h.coordinator.store().subscribe();
        let task = spawn_toggle(&h.coordinator, "u", None);
        h.script.next_call().await.respond_with_state(likes(&["u"]));
        task.await.unwrap().unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![StoreEventKind::Optimistic, StoreEventKind::Committed]);
    }
}
