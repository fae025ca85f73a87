//! Entity Store layer
//!
//! Implements:
//! - Interaction state with single-type and multi-type variants
//! - Toggle transition rules
//! - Optimistic write, commit and rollback with per-request ownership
//! - A change feed for view adapters

mod entity;
#[allow(clippy::module_inception)]
mod store;
mod transition;

pub use entity::*;
pub use store::*;
pub use transition::*;
