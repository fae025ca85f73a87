//! Reconciliation fallback
//!
//! After a failed toggle, fetch the entity's canonical state and adopt it
//! instead of guessing. A lost response frequently hides a mutation that did
//! succeed server-side; the fetched state is shown as-is whether or not it
//! matches what the actor intended.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::remote::EntityReader;
use crate::core::{ActorId, EntityId, RemoteError};
use crate::store::CanonicalEntity;

/// Fetches canonical entity state after a failed toggle.
#[derive(Clone)]
pub struct Reconciler {
    reader: Arc<dyn EntityReader>,
    timeout: Option<Duration>,
}

impl Reconciler {
    /// Create a reconciler over an entity reader.
    pub fn new(reader: Arc<dyn EntityReader>) -> Self {
        Self {
            reader,
            timeout: None,
        }
    }

    /// Bound each fetch by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch the canonical state of `entity_id`.
    ///
    /// `actor_id` is only used to annotate the trace.
    pub async fn reconcile(
        &self,
        entity_id: &EntityId,
        actor_id: &ActorId,
    ) -> Result<CanonicalEntity, RemoteError> {
        tracing::debug!(entity_id = %entity_id, actor_id = %actor_id, "fetching canonical state");

        let fetch = self.reader.get_by_id(entity_id);
        let canonical = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .unwrap_or(Err(RemoteError::Timeout)),
            None => fetch.await,
        }?;

        if &canonical.id != entity_id {
            return Err(RemoteError::Malformed(format!(
                "fetched entity {}, expected {}",
                canonical.id, entity_id
            )));
        }

        tracing::debug!(
            entity_id = %entity_id,
            actor_id = %actor_id,
            count = canonical.state.count,
            interacted = canonical.state.has_interacted(actor_id),
            "fetched canonical state"
        );
        Ok(canonical)
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
