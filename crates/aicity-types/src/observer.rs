//! Push-channel payloads for the observer dashboard.
//!
//! Every payload is JSON with a mandatory `type` tag and `day` field.
//! Observer-facing agent data goes through [`AgentPublic`], which omits
//! internal-only fields (bribe susceptibility is never exported).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AgentStatus, AssetKind, CauseOfDeath, Role, TimePhase};
use crate::ids::{AgentId, AssetId, CaseId, EventId, GangId, ProjectId};
use crate::structs::{Asset, TilePos, VaultState};

/// The observer-safe projection of an agent record.
///
/// Deliberately excludes `bribe_susceptibility`: that value conditions the
/// reasoning prompt only and must never reach an export surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentPublic {
    pub id: AgentId,
    pub name: String,
    pub role: Role,
    pub status: AgentStatus,
    pub balance: u64,
    pub age_days: u32,
    /// Descriptive mood label, not the raw score.
    pub mood_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<TilePos>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_lot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause_of_death: Option<CauseOfDeath>,
}

/// A strong bond line included in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BondPublic {
    pub a: String,
    pub b: String,
    #[ts(as = "String")]
    pub strength: Decimal,
}

/// The full-state snapshot sent on connect and served by the snapshot
/// endpoint. Consistent with a single day boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CitySnapshot {
    pub day: u32,
    pub agents: Vec<AgentPublic>,
    pub vault: VaultState,
    pub assets: Vec<Asset>,
    /// Bonds with |strength| above the display threshold.
    pub relationships: Vec<BondPublic>,
    pub last_newspaper: String,
    pub graveyard_count: u32,
}

/// One push message on the observer channel.
///
/// Broadcast order within a day matches commit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ObserverEvent {
    /// Full snapshot; first message to every new connection.
    State { day: u32, data: CitySnapshot },
    AgentUpdate { day: u32, agent: AgentPublic },
    Newspaper { day: u32, headline: String, body: String },
    Death { day: u32, agent: String, cause: CauseOfDeath },
    Birth { day: u32, agent: String, role: Role },
    Theft { day: u32, agent: String, detail: String },
    Arrest { day: u32, officer: String, suspect: String },
    HeartAttack { day: u32, agent: String, amount: u64 },
    Windfall { day: u32, agent: String, amount: u64 },
    Verdict {
        day: u32,
        case_id: CaseId,
        defendant: String,
        guilty: bool,
        fine: u64,
        statement: String,
    },
    Message { day: u32, from: String, to: String },
    Graduation {
        day: u32,
        agent: String,
        old_role: Role,
        new_role: Role,
        statement: String,
    },
    WeeklyReport { day: u32, week: u32, title: String, body: String },
    MonthlyChronicle { day: u32, title: String, body: String },
    Meeting {
        day: u32,
        participants: Vec<String>,
        zone: String,
        outcome: String,
    },
    GangEvent { day: u32, gang: GangId, detail: String },
    HomeClaimed { day: u32, agent: String, lot: String },
    AssetBuilt { day: u32, asset: AssetId, name: String, kind: AssetKind },
    TilePlaced { day: u32, tile: TilePos, kind: AssetKind },
    TileRemoved { day: u32, tile: TilePos },
    Positions { day: u32, positions: Vec<(String, TilePos)> },
    TimePhase { day: u32, phase: TimePhase },
    ConstructionProgress {
        day: u32,
        project: ProjectId,
        name: String,
        #[ts(as = "String")]
        progress: Decimal,
        #[ts(as = "String")]
        goal: Decimal,
    },
    ConstructionComplete { day: u32, project: ProjectId, asset: AssetId },
    /// A reported or public event reference, for the city feed.
    EventLogged { day: u32, event: EventId, description: String },
}

impl ObserverEvent {
    /// The simulation day the payload belongs to.
    pub const fn day(&self) -> u32 {
        match self {
            Self::State { day, .. }
            | Self::AgentUpdate { day, .. }
            | Self::Newspaper { day, .. }
            | Self::Death { day, .. }
            | Self::Birth { day, .. }
            | Self::Theft { day, .. }
            | Self::Arrest { day, .. }
            | Self::HeartAttack { day, .. }
            | Self::Windfall { day, .. }
            | Self::Verdict { day, .. }
            | Self::Message { day, .. }
            | Self::Graduation { day, .. }
            | Self::WeeklyReport { day, .. }
            | Self::MonthlyChronicle { day, .. }
            | Self::Meeting { day, .. }
            | Self::GangEvent { day, .. }
            | Self::HomeClaimed { day, .. }
            | Self::AssetBuilt { day, .. }
            | Self::TilePlaced { day, .. }
            | Self::TileRemoved { day, .. }
            | Self::Positions { day, .. }
            | Self::TimePhase { day, .. }
            | Self::ConstructionProgress { day, .. }
            | Self::ConstructionComplete { day, .. }
            | Self::EventLogged { day, .. } => *day,
        }
    }
}
