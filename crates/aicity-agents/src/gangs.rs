//! Gang formation, membership bonuses, exposure, and collapse.
//!
//! Formation is not scripted: it depends on a leader having enough
//! desperate contacts and a daily probability roll. A gang's existence is
//! never told to the newspaper directly; it surfaces through arrests,
//! rumors, and investigation.

use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};

use aicity_types::{AgentId, Gang, GangId, GangStatus, Role};

use crate::messages::MessageBus;
use crate::roster::Roster;

/// Gang names. Real criminal organizations, not cartoons.
const GANG_NAMES: [&str; 10] = [
    "The Hollow",
    "Iron Circle",
    "The Ashen",
    "Night Council",
    "The Scorched",
    "Void Pact",
    "Grey Wolves",
    "The Fracture",
    "Black Ledger",
    "The Quiet Ones",
];

/// Tunables for the gang system, from the city configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GangConfig {
    /// Mood below this makes an agent recruitable.
    pub recruit_mood_threshold: Decimal,
    /// Recruitable contacts a leader needs before the formation roll.
    pub recruit_target: usize,
    /// Daily probability that a qualifying leader forms the gang.
    pub formation_chance: f64,
    /// Probability an arrested member talks.
    pub exposure_chance: f64,
    /// Criminal earn multiplier for the leader.
    pub leader_multiplier: Decimal,
    /// Criminal earn multiplier for a member.
    pub member_multiplier: Decimal,
    /// Balance below `near_starvation_days * daily_burn` doubles the
    /// recruitment weight.
    pub near_starvation_days: u64,
    pub daily_burn: u64,
}

impl Default for GangConfig {
    fn default() -> Self {
        Self {
            recruit_mood_threshold: Decimal::new(-70, 2),
            recruit_target: 2,
            formation_chance: 0.30,
            exposure_chance: 0.40,
            leader_multiplier: Decimal::new(14, 1),
            member_multiplier: Decimal::new(12, 1),
            near_starvation_days: 2,
            daily_burn: 100,
        }
    }
}

/// A gang formation that fired today, for event logging and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formation {
    pub gang: GangId,
    pub name: String,
    pub leader: AgentId,
    pub members: Vec<AgentId>,
}

/// The gang registry and its daily checks.
#[derive(Debug, Clone, Default)]
pub struct GangSystem {
    gangs: Vec<Gang>,
}

impl GangSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_gangs(gangs: Vec<Gang>) -> Self {
        Self { gangs }
    }

    pub fn all(&self) -> &[Gang] {
        &self.gangs
    }

    pub fn get(&self, id: GangId) -> Option<&Gang> {
        self.gangs.iter().find(|g| g.id == id)
    }

    /// The active gang an agent belongs to, if any.
    pub fn gang_of(&self, agent: AgentId) -> Option<&Gang> {
        self.gangs
            .iter()
            .find(|g| g.is_active() && g.members.contains(&agent))
    }

    /// Whether an agent is recruitable, and at what weight.
    ///
    /// Alive, not police, mood below the threshold. Near-starvation
    /// balances double the weight.
    pub fn recruit_weight(&self, config: &GangConfig, roster: &Roster, id: AgentId) -> u32 {
        let Some(agent) = roster.get(id) else {
            return 0;
        };
        if !agent.is_alive()
            || agent.role == Role::Police
            || agent.role == Role::Newborn
            || agent.mood >= config.recruit_mood_threshold
            || self.gang_of(id).is_some()
        {
            return 0;
        }
        let floor = config.near_starvation_days * config.daily_burn;
        if agent.balance < floor { 2 } else { 1 }
    }

    /// Daily formation check for every gang leader.
    ///
    /// A leader with at least `recruit_target` recruitable contacts in
    /// their recent message history rolls the formation chance; on success
    /// a gang is created from the most desperate recruits.
    pub fn run_formation<R: Rng>(
        &mut self,
        rng: &mut R,
        config: &GangConfig,
        roster: &Roster,
        messages: &MessageBus,
        day: u32,
    ) -> Vec<Formation> {
        let mut formations = Vec::new();

        let leaders: Vec<AgentId> = roster
            .alive()
            .filter(|a| a.role == Role::GangLeader && self.gang_of(a.id).is_none())
            .map(|a| a.id)
            .collect();

        for leader in leaders {
            let mut recruitable: Vec<AgentId> = messages
                .contacts_of(leader, day)
                .into_iter()
                .filter(|&c| self.recruit_weight(config, roster, c) > 0)
                .collect();

            if recruitable.len() < config.recruit_target {
                continue;
            }
            if !rng.gen_bool(config.formation_chance) {
                continue;
            }

            // The most desperate accept first.
            recruitable.sort_by(|x, y| {
                let mx = roster.get(*x).map_or(Decimal::ZERO, |a| a.mood);
                let my = roster.get(*y).map_or(Decimal::ZERO, |a| a.mood);
                mx.cmp(&my)
            });
            recruitable.truncate(config.recruit_target);

            let mut members = vec![leader];
            members.extend(recruitable);
            let name = self.pick_name(rng);
            let gang = Gang {
                id: GangId::new(),
                name: name.clone(),
                leader,
                members: members.clone(),
                day_formed: day,
                status: GangStatus::Active,
                total_crimes: 0,
                known_to_police: false,
            };
            warn!(gang = %name, leader = %leader, size = members.len(), day, "gang formed");
            formations.push(Formation {
                gang: gang.id,
                name,
                leader,
                members,
            });
            self.gangs.push(gang);
        }

        formations
    }

    /// The criminal earn multiplier for an agent: leader 1.4x, member
    /// 1.2x, solo 1.0x.
    pub fn earn_multiplier(&self, config: &GangConfig, agent: AgentId) -> Decimal {
        match self.gang_of(agent) {
            Some(gang) if gang.leader == agent => config.leader_multiplier,
            Some(_) => config.member_multiplier,
            None => Decimal::ONE,
        }
    }

    /// Record a successful gang-coordinated crime.
    pub fn record_crime(&mut self, agent: AgentId) {
        if let Some(gang) = self
            .gangs
            .iter_mut()
            .find(|g| g.is_active() && g.members.contains(&agent))
        {
            gang.total_crimes += 1;
        }
    }

    /// On arrest of a member, roll whether they talk. On success the gang
    /// becomes known to police; the caller logs the rumor event. Returns
    /// the exposed gang id.
    pub fn expose_on_arrest<R: Rng>(
        &mut self,
        rng: &mut R,
        config: &GangConfig,
        arrested: AgentId,
    ) -> Option<GangId> {
        let talks = rng.gen_bool(config.exposure_chance);
        let gang = self
            .gangs
            .iter_mut()
            .find(|g| g.is_active() && g.members.contains(&arrested))?;
        if !talks {
            return None;
        }
        gang.known_to_police = true;
        info!(gang = %gang.name, member = %arrested, "gang exposed under questioning");
        Some(gang.id)
    }

    /// On a guilty verdict against a leader, the gang collapses. Members'
    /// multipliers revert to 1.0x by virtue of the status change. Returns
    /// the broken gang id.
    pub fn break_gang(&mut self, leader: AgentId, day: u32) -> Option<GangId> {
        let gang = self
            .gangs
            .iter_mut()
            .find(|g| g.is_active() && g.leader == leader)?;
        gang.status = GangStatus::Broken;
        info!(gang = %gang.name, %leader, day, "gang broken after conviction");
        Some(gang.id)
    }

    /// Gangs whose state changed on `day`, for the persistence delta.
    pub fn changed_on(&self, day: u32) -> Vec<&Gang> {
        self.gangs.iter().filter(|g| g.day_formed == day).collect()
    }

    fn pick_name<R: Rng>(&self, rng: &mut R) -> String {
        let taken: Vec<&str> = self.gangs.iter().map(|g| g.name.as_str()).collect();
        for _ in 0..GANG_NAMES.len() {
            let candidate = GANG_NAMES[rng.gen_range(0..GANG_NAMES.len())];
            if !taken.contains(&candidate) {
                return candidate.to_owned();
            }
        }
        GANG_NAMES[rng.gen_range(0..GANG_NAMES.len())].to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup() -> (GangSystem, GangConfig, Roster, MessageBus, StdRng) {
        (
            GangSystem::new(),
            GangConfig::default(),
            Roster::new(),
            MessageBus::new(3),
            StdRng::seed_from_u64(9),
        )
    }

    fn desperate(roster: &mut Roster, rng: &mut StdRng, role: Role) -> AgentId {
        let id = roster.spawn(rng, role, None);
        let agent = roster.get_mut(id).unwrap();
        agent.mood = Decimal::new(-80, 2);
        agent.balance = 500;
        id
    }

    #[test]
    fn police_are_never_recruitable() {
        let (system, config, mut roster, _, mut rng) = setup();
        let cop = desperate(&mut roster, &mut rng, Role::Police);
        assert_eq!(system.recruit_weight(&config, &roster, cop), 0);
    }

    #[test]
    fn near_starvation_doubles_the_weight() {
        let (system, config, mut roster, _, mut rng) = setup();
        let broke = desperate(&mut roster, &mut rng, Role::Builder);
        roster.get_mut(broke).unwrap().balance = 150; // below 2 days of burn
        assert_eq!(system.recruit_weight(&config, &roster, broke), 2);

        let solvent = desperate(&mut roster, &mut rng, Role::Builder);
        assert_eq!(system.recruit_weight(&config, &roster, solvent), 1);
    }

    #[test]
    fn formation_requires_enough_contacts() {
        let (mut system, config, mut roster, mut messages, mut rng) = setup();
        let leader = roster.spawn(&mut rng, Role::GangLeader, None);
        let lone_recruit = desperate(&mut roster, &mut rng, Role::Builder);
        messages.send(1, Some(leader), lone_recruit, "join me");

        // One recruitable contact < recruit_target of 2: never forms.
        for _ in 0..50 {
            assert!(system
                .run_formation(&mut rng, &config, &roster, &messages, 1)
                .is_empty());
        }
    }

    #[test]
    fn formation_fires_with_contacts_and_certain_roll() {
        let (mut system, mut config, mut roster, mut messages, mut rng) = setup();
        config.formation_chance = 1.0;
        let leader = roster.spawn(&mut rng, Role::GangLeader, None);
        let r1 = desperate(&mut roster, &mut rng, Role::Builder);
        let r2 = desperate(&mut roster, &mut rng, Role::Explorer);
        messages.send(6, Some(leader), r1, "I have work for you");
        messages.send(6, Some(leader), r2, "I have work for you");

        let formations = system.run_formation(&mut rng, &config, &roster, &messages, 7);
        assert_eq!(formations.len(), 1);
        let gang = system.get(formations[0].gang).unwrap();
        assert_eq!(gang.members.len(), 3);
        assert_eq!(gang.leader, leader);
    }

    #[test]
    fn multipliers_follow_membership() {
        let (mut system, mut config, mut roster, mut messages, mut rng) = setup();
        config.formation_chance = 1.0;
        let leader = roster.spawn(&mut rng, Role::GangLeader, None);
        let r1 = desperate(&mut roster, &mut rng, Role::Builder);
        let r2 = desperate(&mut roster, &mut rng, Role::Explorer);
        messages.send(6, Some(leader), r1, "come");
        messages.send(6, Some(leader), r2, "come");
        let _ = system.run_formation(&mut rng, &config, &roster, &messages, 7);

        assert_eq!(
            system.earn_multiplier(&config, leader),
            Decimal::new(14, 1)
        );
        assert_eq!(system.earn_multiplier(&config, r1), Decimal::new(12, 1));
        let outsider = AgentId::new();
        assert_eq!(system.earn_multiplier(&config, outsider), Decimal::ONE);
    }

    #[test]
    fn broken_gang_reverts_multipliers() {
        let (mut system, mut config, mut roster, mut messages, mut rng) = setup();
        config.formation_chance = 1.0;
        let leader = roster.spawn(&mut rng, Role::GangLeader, None);
        let r1 = desperate(&mut roster, &mut rng, Role::Builder);
        let r2 = desperate(&mut roster, &mut rng, Role::Explorer);
        messages.send(6, Some(leader), r1, "come");
        messages.send(6, Some(leader), r2, "come");
        let _ = system.run_formation(&mut rng, &config, &roster, &messages, 7);

        let broken = system.break_gang(leader, 15);
        assert!(broken.is_some());
        assert_eq!(system.earn_multiplier(&config, leader), Decimal::ONE);
        assert_eq!(system.earn_multiplier(&config, r1), Decimal::ONE);
    }

    #[test]
    fn exposure_marks_known_to_police() {
        let (mut system, mut config, mut roster, mut messages, mut rng) = setup();
        config.formation_chance = 1.0;
        config.exposure_chance = 1.0;
        let leader = roster.spawn(&mut rng, Role::GangLeader, None);
        let r1 = desperate(&mut roster, &mut rng, Role::Builder);
        let r2 = desperate(&mut roster, &mut rng, Role::Explorer);
        messages.send(6, Some(leader), r1, "come");
        messages.send(6, Some(leader), r2, "come");
        let _ = system.run_formation(&mut rng, &config, &roster, &messages, 7);

        let exposed = system.expose_on_arrest(&mut rng, &config, r1);
        assert!(exposed.is_some());
        assert!(system.get(exposed.unwrap()).unwrap().known_to_police);
    }
}
