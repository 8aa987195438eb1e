//! Shared type definitions for the AIcity simulation.
//!
//! This crate is the single source of truth for all types used across the
//! AIcity workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the external dashboard client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (roles, visibility, statuses, kinds)
//! - [`structs`] -- Core entity structs (agents, transactions, events, ...)
//! - [`decision`] -- Decision request/response types for the reasoning layer
//! - [`observer`] -- Push-channel payloads for the dashboard

pub mod decision;
pub mod enums;
pub mod ids;
pub mod observer;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use decision::{
    ActionKind, BondLine, Decision, DecisionRequest, InboxLine, RoleCapabilities,
};
pub use enums::{
    AgentStatus, AssetKind, AssetStatus, CaseStatus, CauseOfDeath, EventKind, GangStatus,
    LedgerParty, ProjectStatus, Role, StoryKind, TimePhase, TxKind, Visibility,
};
pub use ids::{
    AgentId, AssetId, CaseId, EventId, GangId, MessageId, ProjectId, StoryId, TransactionId,
};
pub use observer::{AgentPublic, BondPublic, CitySnapshot, ObserverEvent};
pub use structs::{
    Agent, Asset, AssetBenefit, Bond, CaseNote, Event, Gang, Message, PoliceCase, Project,
    Story, TilePos, Transaction, VaultState,
};
