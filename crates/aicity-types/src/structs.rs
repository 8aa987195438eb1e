//! Core entity structs for the AIcity simulation.
//!
//! Entities hold stable ids and never each other directly; cross-references
//! are id-based lookups into the owning store. This keeps the object graph
//! acyclic even though cases reference events reference agents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    AgentStatus, AssetKind, AssetStatus, CaseStatus, CauseOfDeath, EventKind, GangStatus,
    LedgerParty, ProjectStatus, Role, StoryKind, TxKind, Visibility,
};
use crate::ids::{
    AgentId, AssetId, CaseId, EventId, GangId, MessageId, ProjectId, StoryId, TransactionId,
};

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// A citizen of the city.
///
/// Invariant: `status == Dead` implies `balance == 0`, and dead records are
/// never mutated again (graveyard).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Agent {
    /// Stable identity.
    pub id: AgentId,
    /// Display name, unique among citizens.
    pub name: String,
    /// The citizen's role.
    pub role: Role,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Current token balance. Non-negative; authoritative copy lives in the
    /// ledger, mirrored here after each mutation.
    pub balance: u64,
    /// Age in simulated days.
    pub age_days: u32,
    /// Affect score in [-1, +1].
    #[ts(as = "String")]
    pub mood: Decimal,
    /// Police only: bribe susceptibility in [0, 1]. Never serialized into
    /// observer payloads or prompts as a number; see the decision facade.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub bribe_susceptibility: Option<Decimal>,
    /// Newborns only: comprehension score 0-100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comprehension: Option<u8>,
    /// Newborns only: the teacher guiding them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_teacher: Option<AgentId>,
    /// Claimed home lot, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_lot: Option<String>,
    /// Tile position, if placed on the grid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<TilePos>,
    /// Days left in prison, when imprisoned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imprisoned_until_day: Option<u32>,
    /// Set on death; the graveyard keeps the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause_of_death: Option<CauseOfDeath>,
}

impl Agent {
    /// Whether the agent takes a turn today.
    pub const fn is_alive(&self) -> bool {
        matches!(self.status, AgentStatus::Alive)
    }
}

/// A position on the world tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    /// Chebyshev distance: the co-location metric used for witnessing and
    /// meetings.
    pub const fn distance(self, other: Self) -> i32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        if dx > dy {
            dx
        } else {
            dy
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger records
// ---------------------------------------------------------------------------

/// An immutable ledger transaction. Never mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Transaction {
    pub id: TransactionId,
    /// Simulation day the transaction was committed.
    pub day: u32,
    /// Debit side.
    pub from: LedgerParty,
    /// Credit side.
    pub to: LedgerParty,
    /// Quantity moved. Strictly positive.
    pub amount: u64,
    /// Tax withheld to the vault (earn only).
    pub tax_withheld: u64,
    /// Human-readable reason, e.g. "builder_action".
    pub reason: String,
    /// Transaction category.
    pub kind: TxKind,
    /// Wall-clock commit time.
    pub created_at: DateTime<Utc>,
}

/// The city vault and supply counters.
///
/// Invariant: `circulating + vault_balance == total_supply` at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VaultState {
    /// All tokens that exist.
    pub total_supply: u64,
    /// Tokens held by citizens.
    pub circulating: u64,
    /// Tokens held by the city.
    pub vault_balance: u64,
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// An entry in the city's hidden ledger of significant actions.
///
/// Invariant: `visibility` only ever moves forward on the
/// [`Visibility`] ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    pub id: EventId,
    /// Day the event happened.
    pub day: u32,
    pub kind: EventKind,
    /// Who did it.
    pub actor: AgentId,
    /// Who or what it was done to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<AgentId>,
    /// Asset involved, for build/sabotage events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetId>,
    /// Narrative description of what happened.
    pub description: String,
    pub visibility: Visibility,
    /// Agents holding a personal (if vague) memory of the event.
    pub witnesses: Vec<AgentId>,
    /// Open bag of evidence references: report filings, rumor hops, clue
    /// fragments. Appended to, never rewritten.
    pub evidence_trail: Vec<serde_json::Value>,
    /// Agents who were told the rumor (counted toward the knower threshold).
    pub rumor_recipients: Vec<AgentId>,
}

impl Event {
    /// Count of independent agents with personal knowledge of this event:
    /// actor, target, witnesses, and rumor recipients, deduplicated.
    pub fn knower_count(&self) -> usize {
        let mut known: Vec<AgentId> = Vec::with_capacity(2 + self.witnesses.len());
        known.push(self.actor);
        if let Some(t) = self.target {
            known.push(t);
        }
        known.extend(self.witnesses.iter().copied());
        known.extend(self.rumor_recipients.iter().copied());
        known.sort_unstable();
        known.dedup();
        known.len()
    }
}

// ---------------------------------------------------------------------------
// Justice
// ---------------------------------------------------------------------------

/// A dated investigation note appended to a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CaseNote {
    pub day: u32,
    pub text: String,
    /// Suspects named in this note.
    pub suspects: Vec<AgentId>,
    /// Investigator confidence in [0, 1].
    #[ts(as = "String")]
    pub confidence: Decimal,
}

/// An entry in the police complaint book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PoliceCase {
    pub id: CaseId,
    pub day_opened: u32,
    /// The event whose report opened the case.
    pub trigger_event: EventId,
    /// Who filed the complaint.
    pub complainant: AgentId,
    /// Accumulated suspects across all notes.
    pub suspect_set: Vec<AgentId>,
    /// Linked evidence events.
    pub evidence_refs: Vec<EventId>,
    /// Day of the most recent evidence reference (or the opening day).
    /// Drives the cold-case clock.
    pub last_evidence_day: u32,
    pub status: CaseStatus,
    pub notes: Vec<CaseNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_closed: Option<u32>,
    /// Narrative written at close, from police-scope evidence only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_report: Option<String>,
}

// ---------------------------------------------------------------------------
// Projects & assets
// ---------------------------------------------------------------------------

/// A multi-day collaborative build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub kind: AssetKind,
    pub proposer: AgentId,
    /// Builder-days needed for completion.
    #[ts(as = "String")]
    pub goal_builder_days: Decimal,
    /// Days contributed per agent.
    #[ts(as = "BTreeMap<AgentId, String>")]
    pub contributors: BTreeMap<AgentId, Decimal>,
    /// Accumulated progress; advances in 1.0 or 0.5 steps.
    #[ts(as = "String")]
    pub progress: Decimal,
    pub status: ProjectStatus,
    pub day_started: u32,
    /// Last day anyone contributed; drives abandonment.
    pub last_contribution_day: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_completed: Option<u32>,
    /// Tile footprint for external visualizers, if the asset has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_tile: Option<TilePos>,
}

/// A completed project applying a daily benefit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub kind: AssetKind,
    /// Agents who contributed at least one full day.
    pub builders: Vec<AgentId>,
    pub day_built: u32,
    pub status: AssetStatus,
    /// Machine-readable daily effect.
    pub benefit: AssetBenefit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_destroyed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile: Option<TilePos>,
}

impl Asset {
    /// Whether the daily benefit currently applies.
    pub const fn is_standing(&self) -> bool {
        matches!(self.status, AssetStatus::Standing | AssetStatus::Damaged)
    }
}

/// The machine-readable effect of a standing asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case", tag = "effect")]
#[ts(export, export_to = "bindings/")]
pub enum AssetBenefit {
    /// Daily token bonus to every alive agent of the role.
    RoleBonus { role: Role, tokens: u64 },
    /// Daily pool split evenly among alive agents of the role.
    RoleSplit { role: Role, pool: u64 },
    /// No tokens; sets a flag the narrator may consult.
    NarrativeFlag,
}

// ---------------------------------------------------------------------------
// Gangs
// ---------------------------------------------------------------------------

/// A leader-anchored criminal group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Gang {
    pub id: GangId,
    pub name: String,
    pub leader: AgentId,
    /// Includes the leader.
    pub members: Vec<AgentId>,
    pub day_formed: u32,
    pub status: GangStatus,
    pub total_crimes: u32,
    pub known_to_police: bool,
}

impl Gang {
    /// Whether multipliers currently apply.
    pub const fn is_active(&self) -> bool {
        matches!(self.status, GangStatus::Active)
    }
}

// ---------------------------------------------------------------------------
// Messages & bonds
// ---------------------------------------------------------------------------

/// An inbox message with bounded retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Message {
    pub id: MessageId,
    pub day: u32,
    /// `None` is the anonymous sender sentinel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<AgentId>,
    pub to: AgentId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    /// Event the message references, when gossiping about one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_event: Option<EventId>,
}

/// A symmetric pairwise bond in [-1, +1].
///
/// Stored under the sorted `(a, b)` key; `bond(a, b) == bond(b, a)` by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Bond {
    pub a: AgentId,
    pub b: AgentId,
    #[ts(as = "String")]
    pub strength: Decimal,
    pub last_updated_day: u32,
}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

/// A narrative artifact published by the messenger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Story {
    pub id: StoryId,
    pub kind: StoryKind,
    pub day: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
    pub title: String,
    pub body: String,
    pub written_by: AgentId,
}
