//! THK Protocol - Default Collaborators
//!
//! In-process implementations of the traits in [`crate::core`]:
//!
//! - [`KeywordRouter`]: picks an endpoint by keyword
//! - [`CannedResponder`]: answers from fixed scripts, remembers conversations
//! - [`ParticipantRegistry`]: the participant roster and status owner

mod registry;
mod responder;
mod router;

pub use registry::*;
pub use responder::*;
pub use router::*;
