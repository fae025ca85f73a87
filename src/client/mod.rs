//! Toggle Sync - Client Library
//!
//! High-level API: engine configuration, the `ToggleEngine` facade and the
//! view adapter.

mod config;
mod engine;
mod view;

pub use config::*;
pub use engine::*;
pub use view::*;
