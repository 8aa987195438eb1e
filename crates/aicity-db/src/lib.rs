//! PostgreSQL persistence for AIcity.
//!
//! Durable-first writes: the scheduler's day delta lands in one SQL
//! transaction per day, and the next day does not begin until the flush
//! acknowledges. Reads may lag the in-memory hot copy; the observer
//! serves from memory and this store is the source of truth for resume.
//!
//! Entity rows are keyed columns plus a JSONB `data` payload, so the Rust
//! structs stay the single source of truth for shape while the columns
//! that queries need (day, visibility, status) stay relational.

pub mod persist;
pub mod postgres;
pub mod resume;

pub use persist::PgCheckpoint;
pub use postgres::{connect, ensure_schema};
pub use resume::load_city;

/// Errors from the persistence adapter.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The database rejected or dropped an operation.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A stored payload failed to deserialize.
    #[error("stored payload corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The transaction log did not reconcile on replay.
    #[error("ledger rebuild failed: {0}")]
    Ledger(String),

    /// The store holds no saved simulation.
    #[error("no saved state to resume from")]
    NothingSaved,
}
