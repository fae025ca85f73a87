//! Scripted remote for tests.
//!
//! Every toggle call and entity read is handed to the test through a
//! channel together with a reply slot, so the test decides when and with
//! what each call settles.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::message::{ToggleRequest, ToggleResponse};
use super::remote::{EntityReader, ToggleEndpoint};
use crate::core::{ActorId, EntityId, RemoteError, RequestId};
use crate::store::{CanonicalEntity, InteractionState};

pub(crate) struct PendingCall {
    pub request: ToggleRequest,
    reply: oneshot::Sender<Result<ToggleResponse, RemoteError>>,
}

impl PendingCall {
    /// Settle the call with `response`.
    pub fn respond(self, response: Result<ToggleResponse, RemoteError>) {
        let _ = self.reply.send(response);
    }

    /// Settle with the canonical `state`, echoing the request id.
    pub fn respond_with_state(self, state: InteractionState) {
        let request_id = self.request.request_id;
        self.respond_as(request_id, state);
    }

    /// Settle with the canonical `state` but echo `request_id`.
    pub fn respond_as(self, request_id: RequestId, state: InteractionState) {
        let entity = CanonicalEntity::new(self.request.entity_id.clone(), state);
        let response = ToggleResponse::for_actor(request_id, &self.request.actor_id, entity);
        self.respond(Ok(response));
    }

    /// Fail the call.
    pub fn fail(self, error: RemoteError) {
        self.respond(Err(error));
    }
}

pub(crate) struct PendingRead {
    pub entity_id: EntityId,
    reply: oneshot::Sender<Result<CanonicalEntity, RemoteError>>,
}

impl PendingRead {
    /// Settle the read with `state`.
    pub fn respond_with_state(self, state: InteractionState) {
        let entity = CanonicalEntity::new(self.entity_id.clone(), state);
        let _ = self.reply.send(Ok(entity));
    }

    /// Fail the read.
    pub fn fail(self, error: RemoteError) {
        let _ = self.reply.send(Err(error));
    }
}

/// Receiving side handed to the test.
pub(crate) struct RemoteScript {
    pub calls: mpsc::UnboundedReceiver<PendingCall>,
    pub reads: mpsc::UnboundedReceiver<PendingRead>,
}

impl RemoteScript {
    pub async fn next_call(&mut self) -> PendingCall {
        match self.calls.recv().await {
            Some(call) => call,
            None => panic!("remote dropped"),
        }
    }

    pub async fn next_read(&mut self) -> PendingRead {
        match self.reads.recv().await {
            Some(read) => read,
            None => panic!("remote dropped"),
        }
    }
}

pub(crate) struct ScriptedRemote {
    calls: mpsc::UnboundedSender<PendingCall>,
    reads: mpsc::UnboundedSender<PendingRead>,
    toggles: AtomicUsize,
}

impl ScriptedRemote {
    pub fn new() -> (Arc<Self>, RemoteScript) {
        let (calls_tx, calls) = mpsc::unbounded_channel();
        let (reads_tx, reads) = mpsc::unbounded_channel();
        let remote = Arc::new(Self {
            calls: calls_tx,
            reads: reads_tx,
            toggles: AtomicUsize::new(0),
        });
        (remote, RemoteScript { calls, reads })
    }

    /// Number of toggle calls issued so far.
    pub fn toggle_calls(&self) -> usize {
        self.toggles.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToggleEndpoint for ScriptedRemote {
    async fn toggle(&self, request: ToggleRequest) -> Result<ToggleResponse, RemoteError> {
        self.toggles.fetch_add(1, Ordering::SeqCst);
        let (reply, settled) = oneshot::channel();
        if self.calls.send(PendingCall { request, reply }).is_err() {
            return Err(RemoteError::Network("script closed".into()));
        }
        settled
            .await
            .unwrap_or_else(|_| Err(RemoteError::Network("reply dropped".into())))
    }
}

#[async_trait]
impl EntityReader for ScriptedRemote {
    async fn get_by_id(&self, entity_id: &EntityId) -> Result<CanonicalEntity, RemoteError> {
        let (reply, settled) = oneshot::channel();
        let read = PendingRead {
            entity_id: entity_id.clone(),
            reply,
        };
        if self.reads.send(read).is_err() {
            return Err(RemoteError::Network("script closed".into()));
        }
        settled
            .await
            .unwrap_or_else(|_| Err(RemoteError::Network("reply dropped".into())))
    }
}

/// Route `tracing` output to the test harness; filter with `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Liking actors as a state.
pub(crate) fn likes(actors: &[&str]) -> InteractionState {
    InteractionState::from_likes(actors.iter().map(|a| ActorId::new(*a)))
}
