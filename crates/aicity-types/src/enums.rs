//! Enumeration types for the AIcity simulation.
//!
//! The closed role set, lifecycle statuses, the event visibility ladder,
//! transaction kinds, and the asset/project/gang status machines.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The closed set of citizen roles.
///
/// Role dispatch is always over this enum -- never over strings. Each role
/// has a [`crate::RoleCapabilities`] descriptor naming its allowed actions,
/// default action, and earn range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Earns through steady construction work; contributes to projects.
    Builder,
    /// High-variance expeditions; occasional private discoveries.
    Explorer,
    /// Earnings scale with the count of wealthy citizens; runs market stalls.
    Merchant,
    /// Patrols, investigates cases, queues arrests; may be bribable.
    Police,
    /// Earnings scale with the student population; raises newborn comprehension.
    Teacher,
    /// Earnings scale with citizens in critical condition; emits heal events.
    Healer,
    /// Delivers messages and writes the city's public record.
    Messenger,
    /// Earns on active cases; defends defendants at trial.
    Lawyer,
    /// Steals from wealthy targets; events start private.
    Thief,
    /// Learns toward graduation under an assigned teacher.
    Newborn,
    /// Recruits desperate citizens into a gang.
    GangLeader,
    /// Extorts citizens over events the blackmailer knows about.
    Blackmailer,
    /// Destroys standing assets, leaving scattered clues.
    Saboteur,
}

impl Role {
    /// All roles, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Builder,
        Self::Explorer,
        Self::Merchant,
        Self::Police,
        Self::Teacher,
        Self::Healer,
        Self::Messenger,
        Self::Lawyer,
        Self::Thief,
        Self::Newborn,
        Self::GangLeader,
        Self::Blackmailer,
        Self::Saboteur,
    ];

    /// Whether this role commits crimes that gang multipliers apply to.
    pub const fn is_criminal(self) -> bool {
        matches!(
            self,
            Self::Thief | Self::GangLeader | Self::Blackmailer | Self::Saboteur
        )
    }

    /// The snake_case wire name of the role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Builder => "builder",
            Self::Explorer => "explorer",
            Self::Merchant => "merchant",
            Self::Police => "police",
            Self::Teacher => "teacher",
            Self::Healer => "healer",
            Self::Messenger => "messenger",
            Self::Lawyer => "lawyer",
            Self::Thief => "thief",
            Self::Newborn => "newborn",
            Self::GangLeader => "gang_leader",
            Self::Blackmailer => "blackmailer",
            Self::Saboteur => "saboteur",
        }
    }
}

/// Whether a citizen is alive, imprisoned, or dead.
///
/// `Dead` is terminal: no mutation of a dead agent is permitted beyond the
/// graveyard record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AgentStatus {
    /// Participating in daily turns.
    Alive,
    /// Convicted and held; skips turns until release.
    Imprisoned,
    /// Terminal. Balance is zero and the record is graveyard-only.
    Dead,
}

/// Recorded cause of death on a graveyard record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CauseOfDeath {
    /// Balance reached zero during the daily burn.
    Starvation,
    /// The stochastic cardiac event drained the last tokens.
    HeartAttack,
    /// Killed during an assault.
    Assault,
}

impl core::fmt::Display for CauseOfDeath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Starvation => write!(f, "starvation"),
            Self::HeartAttack => write!(f, "heart attack"),
            Self::Assault => write!(f, "assault"),
        }
    }
}

// ---------------------------------------------------------------------------
// Event visibility
// ---------------------------------------------------------------------------

/// The five-state visibility ladder on event-log entries.
///
/// The derived `Ord` is the promotion order: visibility may only ever move
/// toward [`Visibility::Public`]. The narrator sees `Public` only; police
/// see `Witnessed | Reported | Public`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export, export_to = "bindings/")]
pub enum Visibility {
    /// Only the actor knows. Leaves no visible evidence.
    Private,
    /// One or more bystanders have a vague memory of something.
    Witnessed,
    /// A witness told someone. Not yet in the police book.
    Rumor,
    /// Formally filed with police; a case is open or linked.
    Reported,
    /// Court verdict or threshold-many independent knowers. The newspaper
    /// may reference it.
    Public,
}

impl Visibility {
    /// The wire label used by the persistent store.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::Witnessed => "WITNESSED",
            Self::Rumor => "RUMOR",
            Self::Reported => "REPORTED",
            Self::Public => "PUBLIC",
        }
    }
}

/// What kind of thing an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    Theft,
    Arrest,
    Arson,
    Assault,
    Bribe,
    Blackmail,
    Heal,
    Death,
    Birth,
    Build,
    Sabotage,
    Discovery,
    Graduation,
    GangFormed,
    GangExposed,
    GangBroken,
    Verdict,
    HeartAttack,
    Windfall,
    Meeting,
    Earning,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The category of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TxKind {
    /// Supply created (registration grant or authorized mint).
    Mint,
    /// Supply destroyed (daily existence cost).
    Burn,
    /// Income credited to an agent, tax withheld to the vault.
    Earn,
    /// Agent pays the vault.
    Spend,
    /// Bilateral agent-to-agent movement.
    Transfer,
    /// Standalone tax remittance.
    Tax,
    /// Court-ordered transfer to the vault.
    Fine,
    /// Vault-funded grant to an agent below the floor.
    Welfare,
}

/// One side of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
#[ts(export, export_to = "bindings/")]
pub enum LedgerParty {
    /// A citizen's balance.
    Agent(crate::ids::AgentId),
    /// The city vault.
    Vault,
    /// The sink: tokens leaving supply entirely (burn) or entering it (mint).
    Sink,
}

// ---------------------------------------------------------------------------
// Cases, projects, assets, gangs
// ---------------------------------------------------------------------------

/// Lifecycle status of a police case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CaseStatus {
    /// Under daily investigation.
    Open,
    /// Closed by a guilty verdict.
    Solved,
    /// No new evidence for the cold-case window; reopenable.
    Cold,
}

/// Lifecycle status of a shared project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ProjectStatus {
    /// Accepting daily contributions.
    Active,
    /// Progress reached the goal; a standing asset exists.
    Completed,
    /// No contribution for the abandonment window.
    Abandoned,
}

/// The closed set of buildable asset types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AssetKind {
    Watchtower,
    Hospital,
    MarketStall,
    School,
    Road,
    Archive,
}

impl AssetKind {
    /// All asset kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Watchtower,
        Self::Hospital,
        Self::MarketStall,
        Self::School,
        Self::Road,
        Self::Archive,
    ];
}

/// Physical status of a standing asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AssetStatus {
    /// Applying its daily benefit.
    Standing,
    /// Still functional; flagged for repair.
    Damaged,
    /// Benefits stopped immediately.
    Destroyed,
}

/// Lifecycle status of a gang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum GangStatus {
    /// Multipliers apply.
    Active,
    /// Leader convicted; multipliers revert to 1.0x.
    Broken,
    /// Voluntarily dissolved.
    Disbanded,
}

// ---------------------------------------------------------------------------
// Narrative & time
// ---------------------------------------------------------------------------

/// Which tier of the public record a story belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StoryKind {
    /// The daily paper, written from public events of the prior day.
    Daily,
    /// Every seventh day, synthesized from the week's dailies.
    Weekly,
    /// Day 30, synthesized from the weeklies.
    Monthly,
}

/// Coarse phase-of-day marker broadcast to visual observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TimePhase {
    /// Newspaper and asset benefits.
    Morning,
    /// Per-agent turns.
    Midday,
    /// Meetings and vault policy.
    Evening,
    /// Promotions, persistence, broadcast.
    Night,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_order_is_the_promotion_order() {
        assert!(Visibility::Private < Visibility::Witnessed);
        assert!(Visibility::Witnessed < Visibility::Rumor);
        assert!(Visibility::Rumor < Visibility::Reported);
        assert!(Visibility::Reported < Visibility::Public);
    }

    #[test]
    fn role_wire_names_roundtrip() {
        for role in Role::ALL {
            let json = format!("\"{}\"", role.as_str());
            let parsed: Result<Role, _> = serde_json::from_str(&json);
            assert_eq!(parsed.ok(), Some(role));
        }
    }

    #[test]
    fn criminal_roles() {
        assert!(Role::Thief.is_criminal());
        assert!(Role::GangLeader.is_criminal());
        assert!(!Role::Police.is_criminal());
        assert!(!Role::Newborn.is_criminal());
    }

    #[test]
    fn dead_is_not_alive() {
        assert_ne!(AgentStatus::Dead, AgentStatus::Alive);
    }
}
