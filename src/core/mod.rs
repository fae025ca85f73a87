//! Core identifiers, constants, error taxonomy and collaborator traits.
//!
//! Nothing here depends on an async runtime.

mod constants;
mod error;
mod traits;
mod types;

pub use constants::*;
pub use error::*;
pub use traits::*;
pub use types::*;
