//! The central bank of AIcity: an append-only log of all token movements.
//!
//! Every token that exists passes through the [`TokenLedger`]. Every
//! transaction is permanent and auditable, and the transaction log alone is
//! sufficient to reconstruct all balances and the vault (see
//! [`conservation::replay`]).
//!
//! # Design
//!
//! - **Append-only**: transactions are never modified or deleted.
//! - **Single writer**: the day scheduler is the only mutator; reads are
//!   snapshots and never block the tick for longer than one transaction.
//! - **Conservation**: `sum(agent balances) + vault_balance == total_supply`
//!   after every operation.

pub mod conservation;
pub mod ledger;

pub use conservation::{replay, verify_conservation, ReplayState};
pub use ledger::{BurnOutcome, EarnOutcome, LedgerConfig, MintAuthority, TokenLedger};

use aicity_types::AgentId;

/// Errors returned by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The agent cannot afford the debit.
    #[error("insufficient funds for {agent}: needs {needed}, has {available}")]
    InsufficientFunds {
        agent: AgentId,
        needed: u64,
        available: u64,
    },

    /// A transfer clamped by the minimum-balance floor came out to zero.
    #[error("transfer from {from} blocked by the minimum balance floor ({floor})")]
    TransferBelowFloor { from: AgentId, floor: u64 },

    /// The agent has never been registered with the ledger.
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    /// The vault cannot fund the requested credit.
    #[error("vault cannot fund {needed} (holds {available})")]
    InsufficientVault { needed: u64, available: u64 },

    /// The mint key did not match the configured operator key.
    #[error("unauthorized mint attempt by {attempted_by}")]
    Unauthorized { attempted_by: String },

    /// The per-period mint cap is exhausted.
    #[error("mint cap exhausted: {requested} requested, {remaining} remaining this period")]
    MintCapExhausted { requested: u64, remaining: u64 },

    /// The conservation law or another ledger invariant failed. Fatal: the
    /// tick must halt and refuse to checkpoint.
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),
}
