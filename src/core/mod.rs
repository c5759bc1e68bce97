//! THK Protocol - Core types
//!
//! Identifiers, protocol constants, error types, and the traits through which
//! the protocol core talks to its external collaborators. This module has no
//! runtime dependencies.

mod constants;
mod error;
mod ids;
mod traits;

pub use constants::*;
pub use error::*;
pub use ids::*;
pub use traits::*;
