//! The citizen roster: the factory, births, the turn order, and the
//! graveyard.
//!
//! The roster is the authoritative agent store. Dead agents stay in it
//! forever (the graveyard) but are never mutated again.

use rand::Rng;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use tracing::{info, warn};

use aicity_types::{Agent, AgentId, AgentStatus, CauseOfDeath, Role, TilePos};

use crate::AgentError;

/// First names for generated citizens.
const FIRST_NAMES: [&str; 40] = [
    "Marcus", "Elena", "Kai", "Nadia", "Theo", "Asha", "Luca", "Zara", "Omar", "Iris", "Felix",
    "Mira", "Dario", "Sable", "Renn", "Lyra", "Caden", "Vela", "Jasper", "Noor", "Soren", "Ayla",
    "Ezra", "Tessa", "River", "Cleo", "Atlas", "Sage", "Orion", "Luna", "Dante", "Milo", "Indra",
    "Zephyr", "Pax", "Ember", "Juno", "Cyrus", "Nova", "Finn",
];

/// Last names, role-flavored without being on-the-nose.
const LAST_NAMES: [&str; 30] = [
    "Cross", "Vale", "Stone", "Wren", "Drake", "Holt", "Lane", "Marsh", "Crane", "Fox", "Reed",
    "Bloom", "Ward", "Black", "Shaw", "Voss", "Hart", "Quinn", "Ash", "Cole", "Grey", "West",
    "Fenn", "Oakes", "Bright", "Storm", "Lowe", "Steele", "Rivers", "Knight",
];

/// The role mix of the founding population, in spawn order.
const FOUNDING_ROLES: [Role; 10] = [
    Role::Builder,
    Role::Explorer,
    Role::Police,
    Role::Merchant,
    Role::Teacher,
    Role::Healer,
    Role::Messenger,
    Role::Thief,
    Role::Blackmailer,
    Role::GangLeader,
];

/// Roles refilled first when the population drops below the floor.
const CRITICAL_ROLES: [Role; 3] = [Role::Healer, Role::Merchant, Role::Police];

/// The authoritative citizen store.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: Vec<Agent>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted agents.
    pub fn from_agents(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Spawn the founding citizens. Police get a hidden bribe
    /// susceptibility at birth; it never appears in any export.
    pub fn spawn_founding<R: Rng>(&mut self, rng: &mut R, count: usize) -> Vec<AgentId> {
        let mut born = Vec::with_capacity(count);
        for i in 0..count {
            let role = FOUNDING_ROLES[i % FOUNDING_ROLES.len()];
            let id = self.spawn(rng, role, None);
            born.push(id);
        }
        info!(count = born.len(), "founding citizens born");
        born
    }

    /// Bring one agent into existence.
    pub fn spawn<R: Rng>(
        &mut self,
        rng: &mut R,
        role: Role,
        assigned_teacher: Option<AgentId>,
    ) -> AgentId {
        let name = self.generate_name(rng);
        let position = TilePos {
            x: rng.gen_range(-12..=12),
            y: rng.gen_range(-12..=12),
        };
        let agent = Agent {
            id: AgentId::new(),
            name,
            role,
            status: AgentStatus::Alive,
            balance: 0,
            age_days: 0,
            mood: Decimal::ZERO,
            bribe_susceptibility: (role == Role::Police).then(|| {
                Decimal::from_f64_retain(rng.gen_range(0.0..0.85))
                    .unwrap_or_default()
                    .round_dp(2)
            }),
            comprehension: (role == Role::Newborn).then_some(0),
            assigned_teacher,
            home_lot: None,
            position: Some(position),
            imprisoned_until_day: None,
            cause_of_death: None,
        };
        let id = agent.id;
        info!(agent = %agent.name, role = role.as_str(), "born");
        self.agents.push(agent);
        id
    }

    /// Pick the role for a floor-refill birth: critical missing roles
    /// first, otherwise a random civic role.
    pub fn pick_birth_role<R: Rng>(&self, rng: &mut R) -> Role {
        let alive_roles: Vec<Role> = self.alive().map(|a| a.role).collect();
        for critical in CRITICAL_ROLES {
            if !alive_roles.contains(&critical) {
                return critical;
            }
        }
        *[
            Role::Builder,
            Role::Explorer,
            Role::Teacher,
            Role::Healer,
            Role::Merchant,
        ]
        .choose(rng)
        .unwrap_or(&Role::Builder)
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Result<&mut Agent, AgentError> {
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AgentError::UnknownAgent(id))?;
        if agent.status == AgentStatus::Dead {
            return Err(AgentError::DeadAgent(id));
        }
        Ok(agent)
    }

    pub fn by_name(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// All agents, including the graveyard.
    pub fn all(&self) -> &[Agent] {
        &self.agents
    }

    /// Living agents.
    pub fn alive(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(|a| a.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.alive().count()
    }

    /// Living agents of a role.
    pub fn alive_with_role(&self, role: Role) -> Vec<&Agent> {
        self.alive().filter(|a| a.role == role).collect()
    }

    pub fn graveyard_count(&self) -> usize {
        self.agents
            .iter()
            .filter(|a| a.status == AgentStatus::Dead)
            .count()
    }

    /// The per-day turn order: descending token balance, ties broken by id.
    pub fn turn_order(&self) -> Vec<AgentId> {
        let mut alive: Vec<&Agent> = self.alive().collect();
        alive.sort_by(|x, y| y.balance.cmp(&x.balance).then(x.id.cmp(&y.id)));
        alive.into_iter().map(|a| a.id).collect()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Mirror a ledger balance onto the roster record.
    pub fn set_balance(&mut self, id: AgentId, balance: u64) -> Result<(), AgentError> {
        self.get_mut(id)?.balance = balance;
        Ok(())
    }

    /// Kill an agent. Terminal: balance zeroed, record frozen.
    pub fn kill(&mut self, id: AgentId, day: u32, cause: CauseOfDeath) -> Result<(), AgentError> {
        let agent = self.get_mut(id)?;
        agent.status = AgentStatus::Dead;
        agent.balance = 0;
        agent.cause_of_death = Some(cause);
        warn!(agent = %agent.name, %cause, day, "died");
        Ok(())
    }

    /// Imprison an agent until the given day.
    pub fn imprison(&mut self, id: AgentId, until_day: u32) -> Result<(), AgentError> {
        let agent = self.get_mut(id)?;
        agent.status = AgentStatus::Imprisoned;
        agent.imprisoned_until_day = Some(until_day);
        Ok(())
    }

    /// Release agents whose sentence has run out.
    pub fn release_due(&mut self, today: u32) -> Vec<AgentId> {
        let mut released = Vec::new();
        for agent in &mut self.agents {
            if agent.status == AgentStatus::Imprisoned
                && agent.imprisoned_until_day.is_some_and(|d| d <= today)
            {
                agent.status = AgentStatus::Alive;
                agent.imprisoned_until_day = None;
                released.push(agent.id);
            }
        }
        released
    }

    /// Age every living agent by one day.
    pub fn age_all(&mut self) {
        for agent in &mut self.agents {
            if agent.is_alive() {
                agent.age_days += 1;
            }
        }
    }

    /// Graduate a newborn into their chosen role.
    pub fn graduate(&mut self, id: AgentId, new_role: Role) -> Result<Role, AgentError> {
        let agent = self.get_mut(id)?;
        let old_role = agent.role;
        agent.role = new_role;
        agent.comprehension = Some(100);
        info!(agent = %agent.name, from = old_role.as_str(), to = new_role.as_str(), "graduated");
        Ok(old_role)
    }

    fn generate_name<R: Rng>(&self, rng: &mut R) -> String {
        for _ in 0..200 {
            let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
            let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
            let name = format!("{first} {last}");
            if self.by_name(&name).is_none() {
                return name;
            }
        }
        // All combinations taken: fall back to a numbered variant.
        let base = format!("{} {}", FIRST_NAMES[0], LAST_NAMES[0]);
        let mut i = 2;
        loop {
            let name = format!("{base} {i}");
            if self.by_name(&name).is_none() {
                return name;
            }
            i += 1;
        }
    }
}
