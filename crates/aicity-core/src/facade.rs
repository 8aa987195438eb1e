//! The decision facade: packs per-agent context, calls the reasoning
//! service, and parses or falls back.
//!
//! All inputs are explicit -- the reasoning model sees only what the
//! facade includes. Mood and bribe susceptibility reach the prompt as
//! descriptive text, never as numbers.

use tracing::warn;

use aicity_agents::bonds::BondTable;
use aicity_agents::mood;
use aicity_agents::roles::capabilities;
use aicity_justice::susceptibility_framing;
use aicity_types::{
    Agent, BondLine, Decision, DecisionRequest, InboxLine, Role, TimePhase,
};

use crate::city::City;
use crate::reasoning::ReasoningService;

/// Inbox messages included in a request.
const INBOX_LIMIT: usize = 6;
/// Positive and negative bonds included, each.
const BOND_LIMIT: usize = 3;
/// Memory recalls included.
const RECALL_LIMIT: usize = 5;

/// Assemble the decision request for one agent's turn.
///
/// Reads the inbox (marking it read) and the memory store; everything
/// else is a snapshot of observable context.
pub fn build_request(city: &mut City, agent_id: aicity_types::AgentId) -> Option<DecisionRequest> {
    let (name, role, tokens, age_days, mood_score, susceptibility, comprehension) = {
        let agent = city.roster.get(agent_id)?;
        (
            agent.name.clone(),
            agent.role,
            agent.balance,
            agent.age_days,
            agent.mood,
            agent.bribe_susceptibility,
            agent.comprehension,
        )
    };

    let inbox: Vec<InboxLine> = city
        .messages
        .inbox(agent_id, city.day)
        .into_iter()
        .rev()
        .take(INBOX_LIMIT)
        .rev()
        .map(|m| InboxLine {
            day: m.day,
            from_name: m
                .from
                .map_or_else(|| String::from("Anonymous"), |id| city_name(city, id)),
            body: m.body,
        })
        .collect();

    let bonds = bond_lines(city, agent_id);

    let situation = format!("I have {tokens} tokens. I am a {}.", role.as_str());
    let recalls = city
        .memories
        .recall(agent_id, &situation, RECALL_LIMIT, city.day);

    let caps = capabilities(role);
    Some(DecisionRequest {
        day: city.day,
        time_phase: TimePhase::Midday,
        agent_name: name,
        role,
        tokens,
        age_days,
        mood_text: mood::describe(mood_score).to_owned(),
        susceptibility_framing: susceptibility
            .map(|s| susceptibility_framing(s).to_owned()),
        comprehension,
        newspaper: city.newspaper.clone(),
        standing_assets: city.assets.standing_kinds(),
        inbox,
        bonds,
        recalls,
        available_actions: caps.allowed.to_vec(),
    })
}

/// Call the reasoning service; on failure or an action outside the
/// role's set, apply the role-default fallback and keep the tick moving.
pub fn decide(
    service: &mut dyn ReasoningService,
    role: Role,
    request: &DecisionRequest,
) -> Decision {
    let caps = capabilities(role);
    match service.decide(request) {
        Ok(decision) if caps.allowed.contains(&decision.action) => decision,
        Ok(decision) => {
            warn!(
                agent = %request.agent_name,
                action = ?decision.action,
                "decided action outside role set; applying fallback"
            );
            Decision::fallback(&caps)
        }
        Err(err) => {
            warn!(agent = %request.agent_name, %err, "reasoning failed; applying fallback");
            Decision::fallback(&caps)
        }
    }
}

/// Top-k positive and top-k negative bonds, annotated for the prompt.
fn bond_lines(city: &City, agent_id: aicity_types::AgentId) -> Vec<BondLine> {
    let mut positive: Vec<BondLine> = Vec::new();
    let mut negative: Vec<BondLine> = Vec::new();
    for bond in city.bonds.for_agent(agent_id) {
        let other = if bond.a == agent_id { bond.b } else { bond.a };
        let Some(other_agent) = city.roster.get(other).filter(|a| a.is_alive()) else {
            continue;
        };
        let rounded = bond.strength.round_dp(2);
        let line = BondLine {
            other_name: other_agent.name.clone(),
            other_role: other_agent.role,
            label: BondTable::label(bond.strength).to_owned(),
            strength_text: if rounded.is_sign_negative() {
                format!("{rounded}")
            } else {
                format!("+{rounded}")
            },
        };
        if bond.strength.is_sign_positive() && positive.len() < BOND_LIMIT {
            positive.push(line);
        } else if bond.strength.is_sign_negative() && negative.len() < BOND_LIMIT {
            negative.push(line);
        }
        if positive.len() >= BOND_LIMIT && negative.len() >= BOND_LIMIT {
            break;
        }
    }
    positive.extend(negative);
    positive
}

fn city_name(city: &City, id: aicity_types::AgentId) -> String {
    city.roster
        .get(id)
        .map_or_else(|| String::from("someone"), |a: &Agent| a.name.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CityConfig;
    use crate::reasoning::{OfflineReasoner, ScriptedReasoner};
    use aicity_types::ActionKind;

    #[test]
    fn request_packs_descriptive_mood_not_numbers() {
        let mut city = City::big_bang(CityConfig::default());
        let id = city.roster.turn_order()[0];
        let request = build_request(&mut city, id).unwrap();
        assert!(["thriving", "content", "steady", "uneasy", "desperate", "broken"]
            .contains(&request.mood_text.as_str()));
    }

    #[test]
    fn police_requests_carry_framing_only() {
        let mut city = City::big_bang(CityConfig::default());
        let officer = city
            .roster
            .alive_with_role(Role::Police)
            .first()
            .map(|a| a.id)
            .unwrap();
        let request = build_request(&mut city, officer).unwrap();
        let framing = request.susceptibility_framing.unwrap();
        assert!(["honest", "pragmatic", "corrupt"].contains(&framing.as_str()));
    }

    #[test]
    fn reasoning_failure_falls_back_to_role_default() {
        let mut city = City::big_bang(CityConfig::default());
        let thief = city
            .roster
            .alive_with_role(Role::Thief)
            .first()
            .map(|a| a.id)
            .unwrap();
        let request = build_request(&mut city, thief).unwrap();
        let decision = decide(&mut OfflineReasoner, Role::Thief, &request);
        assert_eq!(decision.action, ActionKind::Lurk);
    }

    #[test]
    fn out_of_role_actions_are_rejected() {
        let mut city = City::big_bang(CityConfig::default());
        let id = city.roster.turn_order()[0];
        let role = city.roster.get(id).unwrap().role;
        let request = build_request(&mut city, id).unwrap();

        let mut scripted = ScriptedReasoner::new();
        scripted.default_decision = Some(Decision {
            action: ActionKind::DestroyAsset,
            details: String::new(),
            target: None,
            message_to: None,
            message_body: None,
            mood_self: String::new(),
            rationale: String::new(),
        });
        let decision = decide(&mut scripted, role, &request);
        assert_eq!(decision.action, capabilities(role).default_action);
    }
}
