//! The [`City`]: the single value owning all authoritative simulation
//! state.
//!
//! The scheduler is the sole writer. There are no process-wide singletons;
//! every component takes an explicit reference into this value, and
//! entities reference each other by stable id only.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use tracing::info;

use aicity_agents::bonds::BondTable;
use aicity_agents::gangs::GangSystem;
use aicity_agents::memory::{CityKnowledge, MemoryStore};
use aicity_agents::messages::MessageBus;
use aicity_agents::mood::{self, MoodTrigger};
use aicity_agents::roster::Roster;
use aicity_events::EventLog;
use aicity_justice::{CaseBook, Court};
use aicity_ledger::TokenLedger;
use aicity_types::{
    Agent, AgentId, AgentPublic, BondPublic, CauseOfDeath, CitySnapshot, EventKind,
    ObserverEvent, Role, Visibility,
};
use aicity_world::{AssetRegistry, HomeLots, ProjectBoard, TileGrid};

use crate::config::CityConfig;

/// The founding laws, published into shared city knowledge at day zero.
const CONSTITUTION: [&str; 8] = [
    "Law I: No agent may harm city infrastructure intentionally.",
    "Law II: No agent may claim ownership of the city itself.",
    "Law III: Every agent has the right to exist until natural death, unless convicted.",
    "Law IV: No agent may impersonate another agent's identity.",
    "Law V: The dead are remembered. Funerals are mandatory. Every life has weight.",
    "Law VI: Humans may observe and set the Constitution, but not interfere with daily life.",
    "Law VII: The city grows itself. No agent may stop growth.",
    "Law VIII: Only the Founder can destroy the city entirely.",
];

/// All authoritative simulation state for one city.
pub struct City {
    pub config: CityConfig,
    /// The day counter. The scheduler is its sole writer.
    pub day: u32,
    /// The seeded RNG every stochastic roll draws from.
    pub rng: StdRng,
    pub roster: Roster,
    pub ledger: TokenLedger,
    pub events: EventLog,
    pub messages: MessageBus,
    pub bonds: BondTable,
    pub gangs: GangSystem,
    pub projects: ProjectBoard,
    pub assets: AssetRegistry,
    pub cases: CaseBook,
    pub court: Court,
    pub memories: MemoryStore,
    pub knowledge: CityKnowledge,
    pub grid: TileGrid,
    pub home_lots: HomeLots,
    /// The most recent daily paper.
    pub newspaper: String,
    pub stories: Vec<aicity_types::Story>,
    /// Guilty verdicts, for prior-offense counting.
    pub convictions: Vec<(AgentId, u32)>,
    /// Observer payloads queued this day, emitted in commit order at the
    /// broadcast phase.
    pub(crate) outbox: Vec<ObserverEvent>,
    /// Mood deltas accumulated during the day, applied in the mood phase.
    pub(crate) pending_moods: Vec<(AgentId, MoodTrigger)>,
}

impl City {
    /// The big bang: found the city with the configured population.
    pub fn big_bang(config: CityConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.world.seed);
        let mut roster = Roster::new();
        let mut ledger = TokenLedger::new(config.ledger_config(), config.economy.total_supply);
        let mut knowledge = CityKnowledge::new();
        let mut home_lots = HomeLots::new();

        let born = roster.spawn_founding(&mut rng, config.population.founding_citizens);
        for id in &born {
            // The genesis vault always covers the founding grants.
            let _ = ledger.register(0, *id);
            let _ = roster.set_balance(*id, ledger.balance(*id));
            if let Some(lot) = home_lots.claim(*id)
                && let Ok(agent) = roster.get_mut(*id)
            {
                agent.home_lot = Some(lot);
            }
        }
        for law in CONSTITUTION {
            knowledge.publish(0, "law", law);
        }
        info!(citizens = born.len(), seed = config.world.seed, "the big bang");

        let message_ttl = config.visibility.message_ttl_days;
        let abandon_days = config.chance.project_abandon_days;
        Self {
            day: 0,
            rng,
            roster,
            ledger,
            events: EventLog::new(),
            messages: MessageBus::new(message_ttl),
            bonds: BondTable::new(),
            gangs: GangSystem::new(),
            projects: ProjectBoard::new(abandon_days),
            assets: AssetRegistry::new(),
            cases: CaseBook::new(),
            court: Court::new(),
            memories: MemoryStore::new(),
            knowledge,
            grid: TileGrid::new(),
            home_lots,
            newspaper: String::from("Welcome to AIcity. A new civilization begins."),
            stories: Vec::new(),
            convictions: Vec::new(),
            outbox: Vec::new(),
            pending_moods: Vec::new(),
            config,
        }
    }

    /// Reassemble a city from persisted state. The resume contract: the
    /// result is behaviorally identical to an engine that reached `day`
    /// by simulating from day zero, modulo reasoning-call content and RNG
    /// draws (the seed is persisted alongside).
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        config: CityConfig,
        day: u32,
        seed: u64,
        roster: Roster,
        ledger: TokenLedger,
        events: EventLog,
        messages: MessageBus,
        bonds: BondTable,
        gangs: GangSystem,
        projects: ProjectBoard,
        assets: AssetRegistry,
        cases: CaseBook,
        home_lots: HomeLots,
        stories: Vec<aicity_types::Story>,
        newspaper: String,
    ) -> Self {
        // Offset the stream so a resumed run does not replay day zero's
        // draws.
        let rng = StdRng::seed_from_u64(seed.wrapping_add(u64::from(day)));
        Self {
            day,
            rng,
            roster,
            ledger,
            events,
            messages,
            bonds,
            gangs,
            projects,
            assets,
            cases,
            court: Court::new(),
            memories: MemoryStore::new(),
            knowledge: CityKnowledge::new(),
            grid: TileGrid::new(),
            home_lots,
            newspaper,
            stories,
            convictions: Vec::new(),
            outbox: Vec::new(),
            pending_moods: Vec::new(),
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Display name for an agent id ("someone" for unknown ids).
    pub fn name_of(&self, id: AgentId) -> String {
        self.roster
            .get(id)
            .map_or_else(|| String::from("someone"), |a| a.name.clone())
    }

    /// Resolve a display name to a living agent's id.
    pub fn resolve_name(&self, name: &str) -> Option<AgentId> {
        self.roster.by_name(name).map(|a| a.id)
    }

    /// Guilty verdicts on record against an agent.
    pub fn prior_offenses(&self, id: AgentId) -> u32 {
        self.convictions.iter().filter(|(a, _)| *a == id).count() as u32
    }

    /// The observer-safe projection of an agent.
    pub fn agent_public(&self, agent: &Agent) -> AgentPublic {
        AgentPublic {
            id: agent.id,
            name: agent.name.clone(),
            role: agent.role,
            status: agent.status,
            balance: agent.balance,
            age_days: agent.age_days,
            mood_label: mood::describe(agent.mood).to_owned(),
            position: agent.position,
            home_lot: agent.home_lot.clone(),
            cause_of_death: agent.cause_of_death,
        }
    }

    /// Full-state snapshot for the observer channel, consistent with the
    /// current day boundary.
    pub fn snapshot(&self) -> CitySnapshot {
        let display_floor = Decimal::new(12, 2);
        CitySnapshot {
            day: self.day,
            agents: self
                .roster
                .all()
                .iter()
                .map(|a| self.agent_public(a))
                .collect(),
            vault: self.ledger.vault(),
            assets: self.assets.all().to_vec(),
            relationships: self
                .bonds
                .all()
                .filter(|b| b.strength.abs() > display_floor)
                .map(|b| BondPublic {
                    a: self.name_of(b.a),
                    b: self.name_of(b.b),
                    strength: b.strength,
                })
                .collect(),
            last_newspaper: self.newspaper.clone(),
            graveyard_count: self.roster.graveyard_count() as u32,
        }
    }

    // -----------------------------------------------------------------------
    // Mutations used across scheduler phases
    // -----------------------------------------------------------------------

    /// Queue an observer payload for the broadcast phase.
    pub(crate) fn queue(&mut self, event: ObserverEvent) {
        self.outbox.push(event);
    }

    /// Accumulate a mood delta for the mood phase.
    pub(crate) fn queue_mood(&mut self, agent: AgentId, trigger: MoodTrigger) {
        self.pending_moods.push((agent, trigger));
    }

    /// Kill an agent: terminal roster record, cleared inbox and memories,
    /// released home lot, a death event published immediately, and the
    /// observer payload queued.
    pub(crate) fn record_death(&mut self, id: AgentId, cause: CauseOfDeath) {
        let Some(agent) = self.roster.get(id) else {
            return;
        };
        let name = agent.name.clone();
        if self.roster.kill(id, self.day, cause).is_err() {
            return;
        }
        self.messages.clear_inbox(id);
        self.memories.forget_all(id);
        self.home_lots.release(id);

        // Deaths are published by the explicit-publication rule.
        let event = self.events.record(
            self.day,
            EventKind::Death,
            id,
            None,
            None,
            format!("{name} died of {cause}."),
            Visibility::Private,
        );
        let _ = self.events.publish(event, "death_announcement");
        self.queue(ObserverEvent::Death {
            day: self.day,
            agent: name,
            cause,
        });
    }

    /// Birth during the day loop: spawn, register, assign a teacher to
    /// newborn spawns, announce publicly.
    pub(crate) fn record_birth(&mut self, role: Role) -> AgentId {
        let teacher = (role == Role::Newborn)
            .then(|| {
                self.roster
                    .alive_with_role(Role::Teacher)
                    .first()
                    .map(|a| a.id)
            })
            .flatten();
        let id = self.roster.spawn(&mut self.rng, role, teacher);
        let _ = self.ledger.register(self.day, id);
        let _ = self.roster.set_balance(id, self.ledger.balance(id));
        if let Some(lot) = self.home_lots.claim(id) {
            if let Ok(agent) = self.roster.get_mut(id) {
                agent.home_lot = Some(lot.clone());
            }
            let day = self.day;
            let agent = self.name_of(id);
            self.queue(ObserverEvent::HomeClaimed { day, agent, lot });
        }
        let name = self.name_of(id);

        self.memories.remember(
            id,
            self.day,
            "personal",
            format!(
                "Day {}: I was born into the city as a {}. I have {} tokens and must earn \
                 to survive.",
                self.day,
                role.as_str(),
                self.config.economy.starting_balance
            ),
        );
        let event = self.events.record(
            self.day,
            EventKind::Birth,
            id,
            None,
            None,
            format!("{name} was born into the city as a {}.", role.as_str()),
            Visibility::Private,
        );
        let _ = self.events.publish(event, "birth_announcement");
        self.queue(ObserverEvent::Birth {
            day: self.day,
            agent: name,
            role,
        });

        if let Some(teacher_id) = teacher {
            self.messages.send(
                self.day,
                None,
                teacher_id,
                format!(
                    "A new life has arrived: {}. They have been assigned to you. Guide \
                     them well.",
                    self.name_of(id)
                ),
            );
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_bang_founds_a_solvent_city() {
        let city = City::big_bang(CityConfig::default());
        assert_eq!(city.day, 0);
        assert_eq!(city.roster.alive_count(), 10);
        for agent in city.roster.all() {
            assert_eq!(agent.balance, 1000);
        }
        // Conservation: grants moved from the vault, not thin air.
        let vault = city.ledger.vault();
        assert_eq!(vault.circulating, 10_000);
        assert_eq!(vault.total_supply, 10_000_000);
        // The constitution is on the books.
        assert_eq!(city.knowledge.of_kind("law").len(), 8);
    }

    #[test]
    fn snapshot_never_exports_susceptibility() {
        let city = City::big_bang(CityConfig::default());
        let json = serde_json::to_string(&city.snapshot()).unwrap_or_default();
        assert!(!json.contains("susceptibility"));
    }

    #[test]
    fn death_publishes_and_freezes() {
        let mut city = City::big_bang(CityConfig::default());
        let id = city.roster.turn_order()[0];
        city.record_death(id, CauseOfDeath::Starvation);

        let record = city.roster.get(id).unwrap_or_else(|| unreachable!());
        assert_eq!(record.status, aicity_types::AgentStatus::Dead);
        assert_eq!(record.balance, 0);
        // The death event is public immediately.
        let death = city
            .events
            .all()
            .iter()
            .find(|e| e.kind == EventKind::Death)
            .unwrap_or_else(|| unreachable!());
        assert_eq!(death.visibility, Visibility::Public);
        assert_eq!(city.roster.graveyard_count(), 1);
    }

    #[test]
    fn newborn_births_assign_teachers() {
        let mut city = City::big_bang(CityConfig::default());
        let id = city.record_birth(Role::Newborn);
        let agent = city.roster.get(id).unwrap_or_else(|| unreachable!());
        assert_eq!(agent.comprehension, Some(0));
        assert!(agent.assigned_teacher.is_some());
    }
}
