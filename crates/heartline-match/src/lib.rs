//! Relationship actions between two users.
//!
//! - `machine`: the pure transition table (no I/O), one exhaustive match
//! - `service`: drives the machine against the store with optimistic retry
//! - `error`: the rejection taxonomy surfaced by the HTTP layer

pub mod error;
pub mod machine;
pub mod service;

pub use error::{InvalidTransition, MatchError};
pub use machine::{Action, Outcome, Transition, apply};
pub use service::{MAX_PAGE_SIZE, MatchOutcome, MatchService};
