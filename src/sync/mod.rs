//! Toggle Sync - Sync Layer
//!
//! Implements:
//! - In-flight request tracking with a dedupe window
//! - Optimistic toggle coordination (apply, commit, rollback)
//! - Reconciliation against canonical server state after failures
//! - Wire messages and the remote collaborator traits

mod coordinator;
mod message;
mod reconcile;
mod remote;
mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::*;
pub use message::*;
pub use reconcile::*;
pub use remote::*;
pub use tracker::*;
