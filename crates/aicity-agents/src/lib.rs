//! Citizens and everything that happens to them: the roster and factory,
//! role capabilities, the mood register, the bond table, the message bus,
//! the private memory store, the gang system, and the behavior dispatcher
//! that turns parsed decisions into ledger and event-log mutations.

pub mod behavior;
pub mod bonds;
pub mod gangs;
pub mod memory;
pub mod messages;
pub mod mood;
pub mod roles;
pub mod roster;

pub use behavior::{ArrestRequest, BehaviorContext, BehaviorOutcome};
pub use bonds::BondTable;
pub use gangs::GangSystem;
pub use memory::{CityKnowledge, MemoryStore};
pub use messages::MessageBus;
pub use roles::capabilities;
pub use roster::Roster;

use aicity_types::AgentId;

/// Errors from agent-level operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// No agent with this id exists.
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    /// No agent with this display name exists.
    #[error("unknown agent name {0:?}")]
    UnknownName(String),

    /// The operation requires a living agent.
    #[error("agent {0} is dead; the graveyard record is immutable")]
    DeadAgent(AgentId),

    /// A ledger mutation inside a behavior failed.
    #[error(transparent)]
    Ledger(#[from] aicity_ledger::LedgerError),

    /// An event-log mutation inside a behavior failed.
    #[error(transparent)]
    Event(#[from] aicity_events::EventError),

    /// A project or asset mutation inside a behavior failed.
    #[error(transparent)]
    World(#[from] aicity_world::WorldError),
}
