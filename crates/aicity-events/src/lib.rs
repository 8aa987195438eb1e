//! The city's hidden ledger: every significant action, recorded with the
//! visibility level appropriate to how secret it was.
//!
//! Visibility state machine:
//!
//! ```text
//! PRIVATE -> WITNESSED -> RUMOR -> REPORTED -> PUBLIC
//! ```
//!
//! Only forward transitions are legal; a backward move is a caller bug and
//! is rejected. The scoped queries in [`scopes`] enforce who may see what:
//! the narrator sees `PUBLIC` only, police see `WITNESSED | REPORTED |
//! PUBLIC`, and an agent sees events they took part in plus everything
//! public.

pub mod log;
pub mod scopes;
pub mod witness;

pub use log::{EventLog, Promotion};
pub use witness::{detect_witnesses, WitnessSighting};

use aicity_types::{EventId, Visibility};

/// Errors from event-log operations.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// No event with this id exists.
    #[error("unknown event {0}")]
    UnknownEvent(EventId),

    /// A caller attempted to move visibility backward.
    #[error("visibility of event {event} may not move from {from:?} back to {to:?}")]
    VisibilityRegression {
        event: EventId,
        from: Visibility,
        to: Visibility,
    },
}
