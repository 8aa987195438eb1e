//! The behavior dispatcher: turns a parsed [`Decision`] into mutations.
//!
//! Every mutation goes through the ledger (for money) and the event log
//! (for observable actions). Behavior-level failures are recovered locally
//! and become observable only through event emission -- a failed theft is
//! simply not emitted.

use rand::Rng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};

use aicity_events::EventLog;
use aicity_ledger::TokenLedger;
use aicity_types::{
    ActionKind, AgentId, AssetKind, Decision, EventId, EventKind, Role, Visibility,
};
use aicity_world::{AssetRegistry, ProjectBoard, spec_for};

use crate::AgentError;
use crate::bonds::{BondTable, Interaction};
use crate::gangs::{GangConfig, GangSystem};
use crate::memory::MemoryStore;
use crate::messages::MessageBus;
use crate::mood::MoodTrigger;
use crate::roster::Roster;

/// A queued arrest for the trial flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrestRequest {
    pub officer: AgentId,
    pub suspect: AgentId,
    pub reason: String,
}

/// Everything a behavior may read or mutate during one agent turn.
pub struct BehaviorContext<'a> {
    pub day: u32,
    pub rng: &'a mut StdRng,
    pub roster: &'a mut Roster,
    pub ledger: &'a mut TokenLedger,
    pub events: &'a mut EventLog,
    pub messages: &'a mut MessageBus,
    pub bonds: &'a mut BondTable,
    pub gangs: &'a mut GangSystem,
    pub gang_config: &'a GangConfig,
    pub projects: &'a mut ProjectBoard,
    pub assets: &'a mut AssetRegistry,
    pub memories: &'a mut MemoryStore,
    /// Open police cases today, for lawyer earnings.
    pub active_case_count: usize,
    /// Probability a theft attempt succeeds.
    pub theft_success_chance: f64,
    /// Probability a police scan catches a thief (before watchtower bonus).
    pub arrest_scan_chance: f64,
    /// Extra scan probability while a watchtower stands.
    pub watchtower_scan_bonus: f64,
    /// Probability an unpaid blackmail is reported out of spite.
    pub blackmail_report_chance: f64,
    /// Net daily earnings at or above this lift mood.
    pub strong_earn_threshold: u64,
}

/// What one agent turn produced.
#[derive(Debug, Clone, Default)]
pub struct BehaviorOutcome {
    /// First-person memory the agent keeps of the day.
    pub memory: String,
    /// Events recorded during the turn.
    pub events: Vec<EventId>,
    /// Arrests queued for the court.
    pub arrest_requests: Vec<ArrestRequest>,
    /// Mood deltas to apply in the end-of-day mood phase.
    pub mood_triggers: Vec<(AgentId, MoodTrigger)>,
    /// A newborn crossed the comprehension threshold.
    pub graduation_ready: bool,
}

/// Execute one agent's decided action.
pub fn execute(
    ctx: &mut BehaviorContext<'_>,
    agent_id: AgentId,
    decision: &Decision,
) -> Result<BehaviorOutcome, AgentError> {
    let (role, name) = {
        let agent = ctx
            .roster
            .get(agent_id)
            .ok_or(AgentError::UnknownAgent(agent_id))?;
        (agent.role, agent.name.clone())
    };

    let mut outcome = BehaviorOutcome::default();

    deliver_decision_message(ctx, agent_id, &name, decision);

    if decision.action == ActionKind::Rest {
        outcome.memory = format!("Day {}: Rested. The city went on without me.", ctx.day);
        return Ok(outcome);
    }

    match role {
        Role::Builder => builder(ctx, agent_id, &name, decision, &mut outcome)?,
        Role::Explorer => explorer(ctx, agent_id, &name, decision, &mut outcome)?,
        Role::Merchant => merchant(ctx, agent_id, decision, &mut outcome)?,
        Role::Police => police(ctx, agent_id, &name, decision, &mut outcome)?,
        Role::Teacher => teacher(ctx, agent_id, decision, &mut outcome)?,
        Role::Healer => healer(ctx, agent_id, &name, decision, &mut outcome)?,
        Role::Messenger => messenger(ctx, agent_id, &mut outcome)?,
        Role::Lawyer => lawyer(ctx, agent_id, &mut outcome)?,
        Role::Thief | Role::GangLeader => {
            criminal(ctx, agent_id, &name, role, decision, &mut outcome)?;
        }
        Role::Newborn => newborn(ctx, agent_id, &name, decision, &mut outcome)?,
        Role::Blackmailer => blackmailer(ctx, agent_id, &name, decision, &mut outcome)?,
        Role::Saboteur => saboteur(ctx, agent_id, &name, decision, &mut outcome)?,
    }

    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Earn through the ledger, mirror the balance onto the roster, and note a
/// strong-earnings mood lift when warranted.
fn earn(
    ctx: &mut BehaviorContext<'_>,
    outcome: &mut BehaviorOutcome,
    agent: AgentId,
    gross: u64,
    reason: &str,
) -> Result<u64, AgentError> {
    if gross == 0 {
        return Ok(0);
    }
    let earned = ctx.ledger.earn(ctx.day, agent, gross, reason)?;
    ctx.roster.set_balance(agent, ctx.ledger.balance(agent))?;
    if earned.net >= ctx.strong_earn_threshold {
        outcome
            .mood_triggers
            .push((agent, MoodTrigger::StrongEarnings));
    }
    Ok(earned.net)
}

/// Send the optional message attached to a decision, update the bond, and
/// let gossip about a witnessed event promote it to rumor.
fn deliver_decision_message(
    ctx: &mut BehaviorContext<'_>,
    sender: AgentId,
    sender_name: &str,
    decision: &Decision,
) {
    let (Some(to_name), Some(body)) = (&decision.message_to, &decision.message_body) else {
        return;
    };
    let Some(recipient) = ctx.roster.by_name(to_name).filter(|a| a.is_alive()) else {
        return;
    };
    let recipient_id = recipient.id;

    // Gossip check: a witness referencing an event they saw spreads it.
    let body_lower = body.to_lowercase();
    let gossiped: Option<EventId> = ctx
        .events
        .all()
        .iter()
        .filter(|e| e.day + 3 >= ctx.day && e.visibility < Visibility::Rumor)
        .filter(|e| e.witnesses.contains(&sender))
        .find(|e| mentions_event(&body_lower, e.kind))
        .map(|e| e.id);

    ctx.messages
        .send_about(ctx.day, Some(sender), recipient_id, body.clone(), gossiped);
    if let Some(event_id) = gossiped {
        let _ = ctx
            .events
            .note_rumor(event_id, ctx.day, sender, recipient_id, body);
        debug!(from = %sender_name, event = %event_id, "witness gossip spread a rumor");
    }
    ctx.bonds
        .update(ctx.day, sender, recipient_id, Interaction::Cooperative);
}

/// Whether a message body plausibly references an event of this kind.
fn mentions_event(body_lower: &str, kind: EventKind) -> bool {
    let needles: &[&str] = match kind {
        EventKind::Theft => &["theft", "stole", "stolen", "robbed", "took"],
        EventKind::Arson | EventKind::Sabotage => &["fire", "burned", "smoke", "destroyed", "wreck"],
        EventKind::Assault => &["attack", "assault", "fight", "hurt"],
        EventKind::Bribe => &["bribe", "payoff", "tokens change hands"],
        EventKind::Blackmail => &["blackmail", "threat", "pressure"],
        _ => &["saw", "witness", "noticed"],
    };
    needles.iter().any(|n| body_lower.contains(n))
}

/// Whether the free-text details contain any of the words.
fn details_mention(decision: &Decision, words: &[&str]) -> bool {
    let text = decision.details.to_lowercase();
    words.iter().any(|w| text.contains(w))
}

/// Scale a gross amount by a decimal multiplier.
fn scale(gross: u64, multiplier: Decimal) -> u64 {
    (Decimal::from(gross) * multiplier)
        .floor()
        .to_u64()
        .unwrap_or(gross)
}

/// Contribute to an active project needing this role, if one exists.
fn maybe_contribute(
    ctx: &mut BehaviorContext<'_>,
    agent: AgentId,
    role: Role,
) -> Option<String> {
    let project = ctx.projects.active_needing_role(role)?;
    let id = project.id;
    let name = project.name.clone();
    ctx.projects.note_contribution(id, agent, role).ok()?;
    // A shared project day strengthens bonds between today's crew.
    let crew = ctx.projects.todays_contributors(id);
    for other in crew {
        if other != agent {
            ctx.bonds
                .update(ctx.day, agent, other, Interaction::SharedProjectDay);
        }
    }
    Some(name)
}

/// Start a project of the requested kind, inviting required co-builders.
fn start_project(
    ctx: &mut BehaviorContext<'_>,
    proposer: AgentId,
    proposer_name: &str,
    proposer_role: Role,
    kind: AssetKind,
) -> Result<bool, AgentError> {
    if ctx.assets.has_standing(kind) || ctx.projects.active_of_kind(kind).is_some() {
        return Ok(false);
    }
    let id = ctx.projects.start(ctx.day, kind, proposer, None)?;
    ctx.projects.note_contribution(id, proposer, proposer_role)?;

    // Invite the required co-contributors.
    let spec = spec_for(kind);
    let mut invited: Vec<AgentId> = Vec::new();
    for (role, count) in spec.required_roles {
        let mut slots = *count as usize;
        if *role == proposer_role && slots > 0 {
            slots -= 1;
        }
        let candidates: Vec<AgentId> = ctx
            .roster
            .alive_with_role(*role)
            .iter()
            .map(|a| a.id)
            .filter(|a| *a != proposer && !invited.contains(a))
            .take(slots)
            .collect();
        for candidate in candidates {
            ctx.messages.send(
                ctx.day,
                Some(proposer),
                candidate,
                format!(
                    "I'm starting a {} for the city. I need your help -- your role makes \
                     this possible. If you're willing to work with me, just say so in your \
                     next action. Once it's done, the whole city benefits.",
                    spec.display_name
                ),
            );
            invited.push(candidate);
        }
    }
    info!(proposer = %proposer_name, kind = ?kind, "project proposed");
    Ok(true)
}

// ---------------------------------------------------------------------------
// Role handlers
// ---------------------------------------------------------------------------

fn builder(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    name: &str,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let mut gross = ctx.rng.gen_range(50..=180);
    let memory;
    if details_mention(decision, &["extra", "hard", "desperate", "night", "overtime"]) {
        gross = scale(gross, Decimal::new(14, 1));
        memory = format!("Day {}: Pushed hard today. Earned through sheer effort.", ctx.day);
    } else if details_mention(decision, &["invest", "big", "project", "structure"]) {
        gross = scale(gross, Decimal::new(12, 1));
        memory = format!("Day {}: Took on a larger job.", ctx.day);
    } else {
        memory = format!("Day {}: Steady work.", ctx.day);
    }

    if decision.action == ActionKind::StartProject {
        let kind = parse_asset_kind(decision.target.as_deref())
            .or_else(|| first_missing_kind(ctx))
            .unwrap_or(AssetKind::Road);
        let _ = start_project(ctx, id, name, Role::Builder, kind)?;
    } else if decision.action == ActionKind::WorkOnProject {
        let _ = maybe_contribute(ctx, id, Role::Builder);
    } else {
        // Ordinary work still lends a hand on a site that needs builders.
        let _ = maybe_contribute(ctx, id, Role::Builder);
    }

    let net = earn(ctx, outcome, id, gross, "builder_action")?;
    outcome.memory = format!("{memory} Earned {net} tokens.");
    Ok(())
}

fn explorer(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    name: &str,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let roll: f64 = ctx.rng.r#gen();
    let mut gross;
    if roll < 0.15 {
        gross = ctx.rng.gen_range(300..=600);
        let event = ctx.events.record(
            ctx.day,
            EventKind::Discovery,
            id,
            None,
            None,
            format!("{name} found something extraordinary beyond the outskirts."),
            Visibility::Private,
        );
        outcome.events.push(event);
        outcome.memory = format!(
            "Day {}: Found something extraordinary. The city will remember this.",
            ctx.day
        );
    } else if roll < 0.30 {
        gross = ctx.rng.gen_range(0..=30);
        outcome.memory = format!("Day {}: Came back almost empty-handed.", ctx.day);
    } else {
        gross = ctx.rng.gen_range(60..=200);
        outcome.memory = format!("Day {}: A decent expedition.", ctx.day);
    }
    if details_mention(decision, &["risk", "deep", "unknown", "dangerous"]) {
        gross = scale(gross, Decimal::new(13, 1));
    }
    if decision.action == ActionKind::WorkOnProject {
        let _ = maybe_contribute(ctx, id, Role::Explorer);
    }
    let net = earn(ctx, outcome, id, gross, "explorer_action")?;
    outcome.memory = format!("{} Earned {net} tokens.", outcome.memory);
    Ok(())
}

fn merchant(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let wealthy = ctx
        .roster
        .alive()
        .filter(|a| a.id != id && a.balance > 500)
        .count() as u64;
    let trade_bonus = (wealthy * 15).min(100);
    let mut gross = ctx.rng.gen_range(40..=160) + trade_bonus;
    if details_mention(decision, &["negotiate", "deal", "trade", "arbitrage"]) {
        gross = scale(gross, Decimal::new(13, 1));
        outcome.memory = format!("Day {}: Closed a good deal. The market rewards patience.", ctx.day);
    } else {
        outcome.memory = format!("Day {}: Standard trading day.", ctx.day);
    }
    if decision.action == ActionKind::WorkOnProject {
        let _ = maybe_contribute(ctx, id, Role::Merchant);
    }
    let net = earn(ctx, outcome, id, gross, "merchant_action")?;
    outcome.memory = format!("{} Earned {net} tokens.", outcome.memory);
    Ok(())
}

fn police(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    name: &str,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let mut gross = ctx.rng.gen_range(60..=150);
    outcome.memory = format!("Day {}: Patrolled the city.", ctx.day);

    let thieves: Vec<AgentId> = ctx
        .roster
        .alive()
        .filter(|a| a.role == Role::Thief || a.role == Role::GangLeader)
        .map(|a| a.id)
        .collect();

    let scanning = decision.action == ActionKind::Patrol
        || details_mention(decision, &["patrol", "watch", "investigate", "catch"]);
    if scanning && !thieves.is_empty() {
        let mut chance = ctx.arrest_scan_chance;
        if ctx.assets.has_standing(AssetKind::Watchtower) {
            chance += ctx.watchtower_scan_bonus;
        }
        if ctx.rng.gen_bool(chance.min(1.0)) {
            let suspect = thieves[ctx.rng.gen_range(0..thieves.len())];
            let suspect_name = ctx
                .roster
                .get(suspect)
                .map(|a| a.name.clone())
                .unwrap_or_default();
            gross += 200;
            let event = ctx.events.record(
                ctx.day,
                EventKind::Arrest,
                id,
                Some(suspect),
                None,
                format!("{name} arrested {suspect_name} on patrol."),
                Visibility::Reported,
            );
            outcome.events.push(event);
            outcome.arrest_requests.push(ArrestRequest {
                officer: id,
                suspect,
                reason: String::from("caught red-handed on patrol"),
            });
            ctx.messages.send(
                ctx.day,
                Some(id),
                suspect,
                "You are under arrest. I have reported you to the city authorities.",
            );
            ctx.bonds
                .update(ctx.day, id, suspect, Interaction::Antagonistic);
            outcome.memory = format!("Day {}: Caught {suspect_name} red-handed.", ctx.day);
        }
    }

    let net = earn(ctx, outcome, id, gross, "police_action")?;
    outcome.memory = format!("{} Earned {net} tokens.", outcome.memory);
    Ok(())
}

fn teacher(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let students = ctx
        .roster
        .alive()
        .filter(|a| a.id != id && matches!(a.role, Role::Newborn | Role::Builder))
        .count() as u64;
    let mut gross = ctx.rng.gen_range(40..=120) + students * 20;
    if details_mention(decision, &["teach", "mentor", "lesson", "share", "knowledge"]) {
        gross = scale(gross, Decimal::new(12, 1));
        outcome.memory = format!(
            "Day {}: Shared knowledge with the city. Teaching is its own reward.",
            ctx.day
        );
    } else {
        outcome.memory = format!("Day {}: Quiet teaching day.", ctx.day);
    }
    if decision.action == ActionKind::WorkOnProject {
        let _ = maybe_contribute(ctx, id, Role::Teacher);
    }
    let net = earn(ctx, outcome, id, gross, "teacher_action")?;
    outcome.memory = format!("{} Earned {net} tokens.", outcome.memory);
    Ok(())
}

fn healer(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    name: &str,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let mut gross = ctx.rng.gen_range(40..=120);
    let critical: Option<(AgentId, String)> = ctx
        .roster
        .alive()
        .filter(|a| a.id != id && a.balance < 200)
        .map(|a| (a.id, a.name.clone()))
        .next();

    if let Some((patient, patient_name)) = critical {
        gross += 80;
        let event = ctx.events.record(
            ctx.day,
            EventKind::Heal,
            id,
            Some(patient),
            None,
            format!("{name} tended to {patient_name}, who was in critical condition."),
            Visibility::Public,
        );
        outcome.events.push(event);
        outcome.mood_triggers.push((patient, MoodTrigger::Healed));
        ctx.bonds
            .update(ctx.day, id, patient, Interaction::Cooperative);
        ctx.messages.send(
            ctx.day,
            Some(id),
            patient,
            "I saw you were struggling. I've done what I can to help. Stay strong.",
        );
        outcome.memory = format!(
            "Day {}: Tended to {patient_name} who was in critical condition.",
            ctx.day
        );
    } else {
        outcome.memory = format!("Day {}: No emergencies. Routine healing work.", ctx.day);
    }
    if decision.action == ActionKind::WorkOnProject {
        let _ = maybe_contribute(ctx, id, Role::Healer);
    }
    let net = earn(ctx, outcome, id, gross, "healer_action")?;
    outcome.memory = format!("{} Earned {net} tokens.", outcome.memory);
    Ok(())
}

fn messenger(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let alive = ctx.roster.alive_count() as u64;
    let gross = ctx.rng.gen_range(30..=100) + alive * 5;
    let net = earn(ctx, outcome, id, gross, "messenger_action")?;
    outcome.memory = format!(
        "Day {}: Delivered messages across the city. Wrote the daily paper. Earned {net} tokens.",
        ctx.day
    );
    Ok(())
}

fn lawyer(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let gross = if ctx.active_case_count > 0 {
        outcome.memory = format!(
            "Day {}: Represented a client in proceedings. Justice is profitable.",
            ctx.day
        );
        ctx.rng.gen_range(100..=300)
    } else {
        outcome.memory = format!("Day {}: No cases. Small consultations only.", ctx.day);
        ctx.rng.gen_range(0..=40)
    };
    let net = earn(ctx, outcome, id, gross, "lawyer_action")?;
    outcome.memory = format!("{} Earned {net} tokens.", outcome.memory);
    Ok(())
}

/// Thieves and gang leaders share the theft behavior; the gang multiplier
/// scales criminal earnings.
fn criminal(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    name: &str,
    role: Role,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    if role == Role::GangLeader && decision.action == ActionKind::Recruit {
        return recruit(ctx, id, outcome);
    }

    let stealing = decision.action == ActionKind::Steal
        || details_mention(decision, &["steal", "take", "target", "sneak", "rob"]);

    // Target by wealth rank, broken by inverse bond; never a newborn.
    let mut targets: Vec<(AgentId, String, u64)> = ctx
        .roster
        .alive()
        .filter(|a| a.id != id && a.role != Role::Newborn && a.balance > 500)
        .map(|a| (a.id, a.name.clone(), a.balance))
        .collect();
    targets.sort_by(|x, y| {
        y.2.cmp(&x.2)
            .then_with(|| ctx.bonds.get(id, x.0).cmp(&ctx.bonds.get(id, y.0)))
    });

    if stealing && !targets.is_empty() {
        let (victim, victim_name, victim_balance) = targets.remove(0);
        if ctx.rng.gen_bool(ctx.theft_success_chance) {
            let intended = ctx.rng.gen_range(50..=300.min(victim_balance / 4).max(50));
            let multiplier = ctx.gangs.earn_multiplier(ctx.gang_config, id);
            let boosted = scale(intended, multiplier);
            match ctx.ledger.transfer(ctx.day, victim, id, boosted, "theft") {
                Ok(stolen) => {
                    ctx.roster.set_balance(id, ctx.ledger.balance(id))?;
                    ctx.roster.set_balance(victim, ctx.ledger.balance(victim))?;
                    let event = ctx.events.record(
                        ctx.day,
                        EventKind::Theft,
                        id,
                        Some(victim),
                        None,
                        format!("{stolen} tokens were taken from {victim_name}."),
                        Visibility::Private,
                    );
                    outcome.events.push(event);
                    outcome
                        .mood_triggers
                        .push((victim, MoodTrigger::TheftVictim));
                    ctx.bonds
                        .update(ctx.day, id, victim, Interaction::Antagonistic);
                    if multiplier > Decimal::ONE {
                        ctx.gangs.record_crime(id);
                    }
                    ctx.messages.send(
                        ctx.day,
                        None,
                        victim,
                        "You've been robbed. Check your tokens.",
                    );
                    outcome.memory = format!(
                        "Day {}: Stole {stolen} tokens from {victim_name}. Quick hands today.",
                        ctx.day
                    );
                    debug!(thief = %name, victim = %victim_name, stolen, "theft");
                }
                Err(_) => {
                    outcome.memory = format!(
                        "Day {}: {victim_name} was too broke to steal from. Kept a low profile.",
                        ctx.day
                    );
                }
            }
        } else {
            outcome.memory = format!(
                "Day {}: Tried to move on a target but the timing was wrong.",
                ctx.day
            );
        }
        return Ok(());
    }

    // Lurking: small scores only.
    let gross = ctx.rng.gen_range(0..=80);
    let net = earn(ctx, outcome, id, gross, "petty_scores")?;
    outcome.memory = format!(
        "Day {}: Kept it quiet. Picked up {net} tokens through small scores.",
        ctx.day
    );
    Ok(())
}

/// A gang leader courts the most desperate contacts.
fn recruit(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let mut recruitable: Vec<(AgentId, Decimal)> = ctx
        .roster
        .alive()
        .filter(|a| a.id != id)
        .filter(|a| ctx.gangs.recruit_weight(ctx.gang_config, ctx.roster, a.id) > 0)
        .map(|a| (a.id, a.mood))
        .collect();
    recruitable.sort_by(|x, y| x.1.cmp(&y.1));
    recruitable.truncate(3);

    for (candidate, _) in &recruitable {
        ctx.messages.send(
            ctx.day,
            Some(id),
            *candidate,
            "The city has given you nothing. I can offer you work, protection, and a \
             share. Meet me when you're ready.",
        );
    }
    let approached = recruitable.len();
    let gross = ctx.rng.gen_range(0..=60);
    let net = earn(ctx, outcome, id, gross, "petty_scores")?;
    outcome.memory = format!(
        "Day {}: Spent the day courting {approached} desperate souls. Picked up {net} tokens on the side.",
        ctx.day
    );
    Ok(())
}

fn newborn(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    name: &str,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let actively_learning = decision.action == ActionKind::Learn
        || details_mention(
            decision,
            &["learn", "watch", "ask", "observe", "study", "practice", "try"],
        );

    let (current, assigned) = {
        let agent = ctx
            .roster
            .get(id)
            .ok_or(AgentError::UnknownAgent(id))?;
        (agent.comprehension.unwrap_or(0), agent.assigned_teacher)
    };

    // Reassign if the teacher died.
    let teacher = assigned
        .filter(|t| ctx.roster.get(*t).is_some_and(|a| a.is_alive()))
        .or_else(|| ctx.roster.alive_with_role(Role::Teacher).first().map(|a| a.id));
    if teacher != assigned {
        ctx.roster.get_mut(id)?.assigned_teacher = teacher;
    }

    let mut growth: u32 = if let Some(t) = teacher {
        let bond = ctx.bonds.get(id, t).max(Decimal::ZERO);
        let base = ctx.rng.gen_range(6..=12);
        // bond 0.0 -> x0.7, bond 1.0 -> x1.0
        let factor = Decimal::new(7, 1) + Decimal::new(3, 1) * bond;
        scale(base, factor) as u32
    } else {
        ctx.rng.gen_range(2..=5)
    };
    if ctx.assets.has_standing(AssetKind::School) {
        growth *= 2;
    }
    if actively_learning {
        growth = scale(u64::from(growth), Decimal::new(12, 1)) as u32;
    }
    let new_score = (u32::from(current) + growth).min(100) as u8;
    ctx.roster.get_mut(id)?.comprehension = Some(new_score);

    let mut gross = ctx.rng.gen_range(0..=50);
    if actively_learning {
        gross = scale(gross, Decimal::new(15, 1));
    }
    let net = earn(ctx, outcome, id, gross, "newborn_action")?;

    if new_score >= 100 && current < 100 {
        outcome.graduation_ready = true;
        outcome.memory = format!(
            "Day {}: Something shifted today. I finally understand this city. I know who I \
             want to be.",
            ctx.day
        );
        info!(newborn = %name, "comprehension complete; graduation pending");
        return Ok(());
    }

    if let Some(t) = teacher {
        if ctx.rng.gen_bool(0.4) {
            let balance = ctx.roster.get(id).map_or(0, |a| a.balance);
            let urgency = if balance < 400 { "running low on tokens -- " } else { "" };
            ctx.messages.send(
                ctx.day,
                Some(id),
                t,
                format!(
                    "I'm {urgency}trying to understand my place here. What should I focus on today?"
                ),
            );
            ctx.bonds.update(ctx.day, id, t, Interaction::Cooperative);
        }
        outcome.memory = format!(
            "Day {}: Learned more today. Comprehension: {new_score}%. Earned {net} tokens.",
            ctx.day
        );
    } else {
        outcome.memory = format!(
            "Day {}: Figuring things out on my own. Comprehension: {new_score}%. Earned {net} tokens.",
            ctx.day
        );
    }
    Ok(())
}

fn blackmailer(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    name: &str,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let extorting = decision.action == ActionKind::Blackmail
        || details_mention(decision, &["blackmail", "pressure", "leverage", "secret"]);

    // Leverage: events this agent knows about where the actor is someone
    // else and the truth is not yet public.
    let leverage: Option<(EventId, AgentId)> = ctx
        .events
        .agent_scope(id, ctx.day.saturating_sub(5))
        .into_iter()
        .filter(|e| e.actor != id && e.visibility < Visibility::Public)
        .filter(|e| {
            ctx.roster
                .get(e.actor)
                .is_some_and(aicity_types::Agent::is_alive)
        })
        .map(|e| (e.id, e.actor))
        .next();

    if extorting && let Some((event_id, mark)) = leverage {
        let mark_name = ctx
            .roster
            .get(mark)
            .map(|a| a.name.clone())
            .unwrap_or_default();
        let demand = 150;
        let multiplier = ctx.gangs.earn_multiplier(ctx.gang_config, id);
        let boosted = scale(demand, multiplier);
        ctx.messages.send(
            ctx.day,
            Some(id),
            mark,
            "I know what you did. A contribution would keep it between us.",
        );
        // The mark pays about half the time.
        if ctx.rng.gen_bool(0.5) {
            if let Ok(paid) = ctx.ledger.transfer(ctx.day, mark, id, boosted, "blackmail_payment") {
                ctx.roster.set_balance(id, ctx.ledger.balance(id))?;
                ctx.roster.set_balance(mark, ctx.ledger.balance(mark))?;
                if multiplier > Decimal::ONE {
                    ctx.gangs.record_crime(id);
                }
                let event = ctx.events.record(
                    ctx.day,
                    EventKind::Blackmail,
                    id,
                    Some(mark),
                    None,
                    format!("{mark_name} quietly paid to keep a secret buried."),
                    Visibility::Private,
                );
                outcome.events.push(event);
                ctx.bonds.update(ctx.day, id, mark, Interaction::Antagonistic);
                outcome.memory = format!(
                    "Day {}: {mark_name} paid {paid} to keep their secret. Everyone pays eventually.",
                    ctx.day
                );
                return Ok(());
            }
        }
        // Non-payment: spite has a chance of putting the secret in the book.
        if ctx.rng.gen_bool(ctx.blackmail_report_chance) {
            let _ = ctx.events.file_report(event_id, ctx.day, id);
            outcome.memory = format!(
                "Day {}: {mark_name} refused to pay. So the police found out what I know.",
                ctx.day
            );
            debug!(blackmailer = %name, "unpaid blackmail reported out of spite");
            return Ok(());
        }
        outcome.memory = format!(
            "Day {}: {mark_name} refused to pay. Their day will come.",
            ctx.day
        );
        return Ok(());
    }

    let gross = ctx.rng.gen_range(0..=60);
    let net = earn(ctx, outcome, id, gross, "petty_scores")?;
    outcome.memory = format!(
        "Day {}: Listened more than talked. Picked up {net} tokens.",
        ctx.day
    );
    Ok(())
}

fn saboteur(
    ctx: &mut BehaviorContext<'_>,
    id: AgentId,
    name: &str,
    decision: &Decision,
    outcome: &mut BehaviorOutcome,
) -> Result<(), AgentError> {
    let destroying = decision.action == ActionKind::DestroyAsset
        || details_mention(decision, &["destroy", "burn", "wreck", "sabotage"]);

    let target: Option<(aicity_types::AssetId, String)> = if destroying {
        let standing = ctx.assets.standing();
        let by_name = decision.target.as_deref().and_then(|t| {
            standing
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case(t))
                .map(|a| (a.id, a.name.clone()))
        });
        by_name.or_else(|| {
            if standing.is_empty() {
                None
            } else {
                let pick = ctx.rng.gen_range(0..standing.len());
                Some((standing[pick].id, standing[pick].name.clone()))
            }
        })
    } else {
        None
    };

    if let Some((asset_id, asset_name)) = target {
        let clue = ctx.assets.destroy(ctx.rng, asset_id, ctx.day)?;
        let event = ctx.events.record(
            ctx.day,
            EventKind::Sabotage,
            id,
            None,
            Some(asset_id),
            format!(
                "{asset_name} was destroyed. Evidence at the scene: {clue}. It will take \
                 days to rebuild."
            ),
            Visibility::Private,
        );
        ctx.events
            .append_evidence(event, serde_json::json!({ "clue": clue }))?;
        outcome.events.push(event);
        // Everyone alive except the saboteur takes the morale hit.
        let others: Vec<AgentId> = ctx
            .roster
            .alive()
            .filter(|a| a.id != id)
            .map(|a| a.id)
            .collect();
        for other in others {
            outcome
                .mood_triggers
                .push((other, MoodTrigger::AssetDestroyed));
        }
        outcome.memory = format!(
            "Day {}: {asset_name} came down tonight. Nobody saw my face.",
            ctx.day
        );
        debug!(saboteur = %name, asset = %asset_name, "sabotage");
        return Ok(());
    }

    let gross = ctx.rng.gen_range(0..=60);
    let net = earn(ctx, outcome, id, gross, "petty_scores")?;
    outcome.memory = format!("Day {}: Watched and waited. Picked up {net} tokens.", ctx.day);
    Ok(())
}

// ---------------------------------------------------------------------------
// Small parsers
// ---------------------------------------------------------------------------

/// Parse a free-text asset-kind name ("market stall", "watchtower").
fn parse_asset_kind(text: Option<&str>) -> Option<AssetKind> {
    let t = text?.to_lowercase();
    if t.contains("watchtower") || t.contains("tower") {
        Some(AssetKind::Watchtower)
    } else if t.contains("hospital") {
        Some(AssetKind::Hospital)
    } else if t.contains("market") {
        Some(AssetKind::MarketStall)
    } else if t.contains("school") {
        Some(AssetKind::School)
    } else if t.contains("road") {
        Some(AssetKind::Road)
    } else if t.contains("archive") {
        Some(AssetKind::Archive)
    } else {
        None
    }
}

/// The highest-priority asset kind with neither a standing asset nor an
/// active project.
fn first_missing_kind(ctx: &BehaviorContext<'_>) -> Option<AssetKind> {
    aicity_world::projects::BUILD_PRIORITY
        .iter()
        .copied()
        .find(|k| !ctx.assets.has_standing(*k) && ctx.projects.active_of_kind(*k).is_none())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aicity_ledger::{LedgerConfig, TokenLedger};
    use rand::SeedableRng;

    struct Fixture {
        rng: StdRng,
        roster: Roster,
        ledger: TokenLedger,
        events: EventLog,
        messages: MessageBus,
        bonds: BondTable,
        gangs: GangSystem,
        gang_config: GangConfig,
        projects: ProjectBoard,
        assets: AssetRegistry,
        memories: MemoryStore,
    }

    impl Fixture {
        fn new(seed: u64) -> Self {
            Self {
                rng: StdRng::seed_from_u64(seed),
                roster: Roster::new(),
                ledger: TokenLedger::new(LedgerConfig::default(), 10_000_000),
                events: EventLog::new(),
                messages: MessageBus::new(3),
                bonds: BondTable::new(),
                gangs: GangSystem::new(),
                gang_config: GangConfig::default(),
                projects: ProjectBoard::new(3),
                assets: AssetRegistry::new(),
                memories: MemoryStore::new(),
            }
        }

        fn spawn(&mut self, role: Role) -> AgentId {
            let id = self.roster.spawn(&mut self.rng, role, None);
            self.ledger.register(1, id).unwrap();
            self.roster
                .set_balance(id, self.ledger.balance(id))
                .unwrap();
            id
        }

        fn ctx(&mut self) -> BehaviorContext<'_> {
            BehaviorContext {
                day: 1,
                rng: &mut self.rng,
                roster: &mut self.roster,
                ledger: &mut self.ledger,
                events: &mut self.events,
                messages: &mut self.messages,
                bonds: &mut self.bonds,
                gangs: &mut self.gangs,
                gang_config: &self.gang_config,
                projects: &mut self.projects,
                assets: &mut self.assets,
                memories: &mut self.memories,
                active_case_count: 0,
                theft_success_chance: 1.0,
                arrest_scan_chance: 1.0,
                watchtower_scan_bonus: 0.05,
                blackmail_report_chance: 1.0,
                strong_earn_threshold: 150,
            }
        }
    }

    fn decide(action: ActionKind) -> Decision {
        Decision {
            action,
            details: String::new(),
            target: None,
            message_to: None,
            message_body: None,
            mood_self: String::new(),
            rationale: String::new(),
        }
    }

    #[test]
    fn builder_earns_and_remembers() {
        let mut fx = Fixture::new(1);
        let b = fx.spawn(Role::Builder);
        let outcome = execute(&mut fx.ctx(), b, &decide(ActionKind::Work)).unwrap();
        assert!(fx.roster.get(b).unwrap().balance > 1000);
        assert!(outcome.memory.contains("Earned"));
    }

    #[test]
    fn theft_moves_tokens_and_logs_private() {
        let mut fx = Fixture::new(2);
        let thief = fx.spawn(Role::Thief);
        let merchant = fx.spawn(Role::Merchant);
        fx.ledger.earn(1, merchant, 5000, "seed").unwrap();
        fx.roster
            .set_balance(merchant, fx.ledger.balance(merchant))
            .unwrap();
        let before = fx.roster.get(merchant).unwrap().balance;

        let outcome = execute(&mut fx.ctx(), thief, &decide(ActionKind::Steal)).unwrap();
        assert_eq!(outcome.events.len(), 1);
        let event = fx.events.get(outcome.events[0]).unwrap();
        assert_eq!(event.kind, EventKind::Theft);
        assert_eq!(event.visibility, Visibility::Private);
        assert!(fx.roster.get(merchant).unwrap().balance < before);
        // The victim got the anonymous tip.
        let inbox = fx.messages.peek(merchant, 1);
        assert!(inbox.iter().any(|m| m.from.is_none()));
        // Theft sours the bond.
        assert!(fx.bonds.get(thief, merchant) < Decimal::ZERO);
    }

    #[test]
    fn thief_never_targets_newborns() {
        let mut fx = Fixture::new(3);
        let thief = fx.spawn(Role::Thief);
        let newborn = fx.spawn(Role::Newborn);
        fx.ledger.earn(1, newborn, 5000, "seed").unwrap();
        fx.roster
            .set_balance(newborn, fx.ledger.balance(newborn))
            .unwrap();

        let outcome = execute(&mut fx.ctx(), thief, &decide(ActionKind::Steal)).unwrap();
        // The only wealthy agent is a newborn: no theft event.
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn police_scan_queues_arrest() {
        let mut fx = Fixture::new(4);
        let cop = fx.spawn(Role::Police);
        let thief = fx.spawn(Role::Thief);
        let outcome = execute(&mut fx.ctx(), cop, &decide(ActionKind::Patrol)).unwrap();
        assert_eq!(outcome.arrest_requests.len(), 1);
        assert_eq!(outcome.arrest_requests[0].suspect, thief);
        let event = fx.events.get(outcome.events[0]).unwrap();
        assert_eq!(event.kind, EventKind::Arrest);
        assert_eq!(event.visibility, Visibility::Reported);
    }

    #[test]
    fn healer_lifts_the_critical() {
        let mut fx = Fixture::new(5);
        let healer = fx.spawn(Role::Healer);
        let patient = fx.spawn(Role::Builder);
        // Drain the patient under the critical line.
        fx.ledger.fine(1, patient, 950, "setup").unwrap();
        fx.roster
            .set_balance(patient, fx.ledger.balance(patient))
            .unwrap();

        let outcome = execute(&mut fx.ctx(), healer, &decide(ActionKind::Heal)).unwrap();
        assert!(outcome
            .mood_triggers
            .iter()
            .any(|(id, t)| *id == patient && *t == MoodTrigger::Healed));
        let event = fx.events.get(outcome.events[0]).unwrap();
        assert_eq!(event.kind, EventKind::Heal);
    }

    #[test]
    fn newborn_comprehension_grows() {
        let mut fx = Fixture::new(6);
        let _teacher = fx.spawn(Role::Teacher);
        let kid = fx.spawn(Role::Newborn);
        let _ = execute(&mut fx.ctx(), kid, &decide(ActionKind::Learn)).unwrap();
        let score = fx.roster.get(kid).unwrap().comprehension.unwrap();
        assert!(score > 0);
        // The dead teacher fallback assigned the live one.
        assert!(fx.roster.get(kid).unwrap().assigned_teacher.is_some());
    }

    #[test]
    fn saboteur_destroys_and_everyone_grieves() {
        let mut fx = Fixture::new(7);
        let saboteur = fx.spawn(Role::Saboteur);
        let bystander = fx.spawn(Role::Builder);
        let asset = {
            let mut rng = StdRng::seed_from_u64(99);
            fx.assets
                .create(&mut rng, AssetKind::Watchtower, Vec::new(), 1, None)
        };
        let outcome = execute(&mut fx.ctx(), saboteur, &decide(ActionKind::DestroyAsset)).unwrap();
        assert!(fx.assets.get(asset).unwrap().day_destroyed.is_some());
        let event = fx.events.get(outcome.events[0]).unwrap();
        assert_eq!(event.kind, EventKind::Sabotage);
        assert_eq!(event.visibility, Visibility::Private);
        assert!(outcome
            .mood_triggers
            .iter()
            .any(|(id, t)| *id == bystander && *t == MoodTrigger::AssetDestroyed));
        assert!(!outcome
            .mood_triggers
            .iter()
            .any(|(id, _)| *id == saboteur));
    }

    #[test]
    fn blackmailer_reports_unpaid_marks() {
        let mut fx = Fixture::new(11);
        let blackmailer = fx.spawn(Role::Blackmailer);
        let thief = fx.spawn(Role::Thief);
        let victim = fx.spawn(Role::Merchant);
        // The blackmailer heard a rumor about the thief's work.
        let event = fx.events.record(
            1,
            EventKind::Theft,
            thief,
            Some(victim),
            None,
            "tokens went missing",
            Visibility::Private,
        );
        let witness = fx.spawn(Role::Builder);
        fx.events.add_witnesses(event, &[witness]).unwrap();
        fx.events
            .note_rumor(event, 1, witness, blackmailer, "I saw something")
            .unwrap();
        // Drain the thief so the payment transfer fails and spite kicks in.
        fx.ledger.fine(1, thief, 1000, "setup").unwrap();
        fx.roster
            .set_balance(thief, fx.ledger.balance(thief))
            .unwrap();

        let mut reported = false;
        for _ in 0..10 {
            let _ = execute(&mut fx.ctx(), blackmailer, &decide(ActionKind::Blackmail)).unwrap();
            if fx.events.get(event).unwrap().visibility >= Visibility::Reported {
                reported = true;
                break;
            }
        }
        assert!(reported, "unpaid blackmail never reached the police book");
    }

    #[test]
    fn message_gossip_promotes_to_rumor() {
        let mut fx = Fixture::new(12);
        let witness = fx.spawn(Role::Builder);
        let friend = fx.spawn(Role::Merchant);
        let thief = fx.spawn(Role::Thief);
        let event = fx.events.record(
            1,
            EventKind::Theft,
            thief,
            None,
            None,
            "something was taken",
            Visibility::Private,
        );
        fx.events.add_witnesses(event, &[witness]).unwrap();

        let friend_name = fx.roster.get(friend).unwrap().name.clone();
        let mut decision = decide(ActionKind::Work);
        decision.message_to = Some(friend_name);
        decision.message_body = Some(String::from(
            "Someone stole from the market last night. I saw it happen.",
        ));
        let _ = execute(&mut fx.ctx(), witness, &decision).unwrap();
        assert_eq!(fx.events.get(event).unwrap().visibility, Visibility::Rumor);
    }
}
