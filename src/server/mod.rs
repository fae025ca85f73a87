//! Toggle Sync - Reference Server
//!
//! In-memory implementation of the remote toggle and read endpoints, used by
//! tests and demos.

mod replay;
#[allow(clippy::module_inception)]
mod server;

pub use replay::*;
pub use server::*;
