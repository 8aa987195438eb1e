//! The meeting matcher: message intent plus co-location fires a real
//! mechanical outcome.
//!
//! Two living agents meet when both expressed meeting intent in recent
//! messages to each other and stand in the same zone today. The outcome
//! depends on the role pair: criminal pairs expand gangs or form
//! alliances, police debrief informants, civic pairs start projects or
//! trade. Intent detection is a pluggable predicate; the default is a
//! keyword scan.

use tracing::info;

use aicity_agents::bonds::Interaction;
use aicity_types::{
    AgentId, AssetKind, EventKind, ObserverEvent, Role, Visibility,
};

use crate::city::City;

/// The pluggable meeting-intent predicate over a message body.
pub type IntentPredicate = fn(&str) -> bool;

/// Keyword list for the default intent predicate.
const MEETING_INTENT_WORDS: [&str; 17] = [
    "meet",
    "talk",
    "discuss",
    "rendezvous",
    "come to",
    "see you",
    "find me",
    "let's go",
    "meet me",
    "join me",
    "i'll be at",
    "waiting for",
    "together",
    "our arrangement",
    "finalize",
    "our deal",
    "alliance",
];

/// The default intent predicate: a case-insensitive keyword scan.
pub fn keyword_intent(body: &str) -> bool {
    let lower = body.to_lowercase();
    MEETING_INTENT_WORDS.iter().any(|w| lower.contains(w))
}

/// One fired meeting, for logging and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingOutcome {
    pub a: AgentId,
    pub b: AgentId,
    pub zone: String,
    pub outcome: String,
}

/// Scan for meetings and fire their outcomes. Called once per day after
/// all agent turns.
pub fn check_meetings(city: &mut City, intent: IntentPredicate) -> Vec<MeetingOutcome> {
    let alive: Vec<AgentId> = city.roster.alive().map(|a| a.id).collect();
    let mut fired: Vec<MeetingOutcome> = Vec::new();

    for (i, &a) in alive.iter().enumerate() {
        for &b in &alive[i + 1..] {
            if fired.iter().any(|m| involves(m, a, b)) {
                continue;
            }
            if !mutual_intent(city, a, b, intent) {
                continue;
            }
            let Some(zone) = shared_zone(city, a, b) else {
                continue;
            };
            let outcome = fire_outcome(city, a, b, &zone);
            info!(
                a = %city.name_of(a),
                b = %city.name_of(b),
                zone = %zone,
                outcome = %outcome,
                "meeting fired"
            );
            let participants = vec![city.name_of(a), city.name_of(b)];
            city.queue(ObserverEvent::Meeting {
                day: city.day,
                participants,
                zone: zone.clone(),
                outcome: outcome.clone(),
            });
            fired.push(MeetingOutcome { a, b, zone, outcome });
        }
    }
    fired
}

fn involves(m: &MeetingOutcome, a: AgentId, b: AgentId) -> bool {
    (m.a == a && m.b == b) || (m.a == b && m.b == a)
}

/// Both parties expressed intent in recent messages between them.
fn mutual_intent(city: &City, a: AgentId, b: AgentId, intent: IntentPredicate) -> bool {
    let between = city.messages.between(a, b, city.day);
    if between.is_empty() {
        return false;
    }
    between.iter().any(|m| intent(&m.body))
}

fn shared_zone(city: &City, a: AgentId, b: AgentId) -> Option<String> {
    let pa = city.roster.get(a)?.position?;
    let pb = city.roster.get(b)?.position?;
    if !city.grid.same_zone(pa, pb) {
        return None;
    }
    city.grid.zone_of(pa).map(|z| z.name.clone())
}

/// Route the role pair to its outcome.
fn fire_outcome(city: &mut City, a: AgentId, b: AgentId, zone: &str) -> String {
    let role_a = city.roster.get(a).map(|x| x.role);
    let role_b = city.roster.get(b).map(|x| x.role);
    let (Some(role_a), Some(role_b)) = (role_a, role_b) else {
        return String::from("nothing came of it");
    };

    match (role_a, role_b) {
        (Role::GangLeader, Role::Thief) | (Role::Thief, Role::GangLeader) => {
            expand_gang(city, a, b, role_a)
        }
        (Role::GangLeader, Role::Blackmailer) | (Role::Blackmailer, Role::GangLeader) => {
            criminal_alliance(city, a, b)
        }
        (Role::Police, Role::Explorer)
        | (Role::Explorer, Role::Police)
        | (Role::Police, Role::Lawyer)
        | (Role::Lawyer, Role::Police) => debrief_informant(city, a, b, role_a),
        (Role::Blackmailer, Role::Explorer)
        | (Role::Explorer, Role::Blackmailer)
        | (Role::Blackmailer, Role::Thief)
        | (Role::Thief, Role::Blackmailer) => attempt_compromise(city, a, b),
        (Role::Builder, Role::Merchant)
        | (Role::Merchant, Role::Builder)
        | (Role::Builder, Role::Teacher)
        | (Role::Teacher, Role::Builder)
        | (Role::Builder, Role::Explorer)
        | (Role::Explorer, Role::Builder) => plan_project(city, a, b, role_a, role_b, zone),
        (Role::Merchant, Role::Healer) | (Role::Healer, Role::Merchant) => trade_goods(city, a, b),
        _ => social_meeting(city, a, b),
    }
}

/// A gang leader folds a willing thief into the gang.
fn expand_gang(city: &mut City, a: AgentId, b: AgentId, role_a: Role) -> String {
    let (leader, recruit) = if role_a == Role::GangLeader { (a, b) } else { (b, a) };
    city.bonds.update(city.day, leader, recruit, Interaction::Cooperative);
    let leader_name = city.name_of(leader);
    let recruit_name = city.name_of(recruit);
    let _ = city.events.record(
        city.day,
        EventKind::Meeting,
        leader,
        Some(recruit),
        None,
        format!("{leader_name} and {recruit_name} reached an understanding in private."),
        Visibility::Private,
    );
    format!("{recruit_name} agreed to work under {leader_name}")
}

/// Two criminal operators agree to share information.
fn criminal_alliance(city: &mut City, a: AgentId, b: AgentId) -> String {
    city.bonds.update(city.day, a, b, Interaction::Cooperative);
    let _ = city.events.record(
        city.day,
        EventKind::Meeting,
        a,
        Some(b),
        None,
        String::from("Two figures finalized an arrangement away from listening ears."),
        Visibility::Private,
    );
    String::from("a criminal alliance was formed")
}

/// An informant walks the officer through what they saw; the event goes
/// into the book.
fn debrief_informant(city: &mut City, a: AgentId, b: AgentId, role_a: Role) -> String {
    let (officer, informant) = if role_a == Role::Police { (a, b) } else { (b, a) };
    city.bonds
        .update(city.day, officer, informant, Interaction::Cooperative);

    // Any event the informant witnessed and police cannot yet see becomes
    // a formal report.
    let known: Option<aicity_types::EventId> = city
        .events
        .all()
        .iter()
        .filter(|e| e.witnesses.contains(&informant))
        .find(|e| e.visibility < Visibility::Reported)
        .map(|e| e.id);
    if let Some(event_id) = known {
        let _ = city.events.file_report(event_id, city.day, informant);
        let complainant = city
            .events
            .get(event_id)
            .and_then(|e| e.target)
            .unwrap_or(informant);
        city.cases.open(city.day, event_id, complainant);
        return String::from("an informant's account opened a case file");
    }
    String::from("the officer debriefed an informant; nothing new surfaced")
}

/// Criminals probing each other for leverage. Bond only; nothing moves.
fn attempt_compromise(city: &mut City, a: AgentId, b: AgentId) -> String {
    city.bonds.update(city.day, a, b, Interaction::Cooperative);
    String::from("two operators probed each other for leverage")
}

/// Civic pairs agree to start (or push) a build.
fn plan_project(
    city: &mut City,
    a: AgentId,
    b: AgentId,
    role_a: Role,
    role_b: Role,
    _zone: &str,
) -> String {
    let kind = match (role_a, role_b) {
        (Role::Builder, Role::Merchant) | (Role::Merchant, Role::Builder) => AssetKind::MarketStall,
        (Role::Builder, Role::Teacher) | (Role::Teacher, Role::Builder) => AssetKind::School,
        _ => AssetKind::Road,
    };
    city.bonds.update(city.day, a, b, Interaction::Cooperative);
    if city.assets.has_standing(kind) || city.projects.active_of_kind(kind).is_some() {
        return String::from("they talked over an ongoing build");
    }
    let proposer = if role_a == Role::Builder { a } else { b };
    match city.projects.start(city.day, kind, proposer, None) {
        Ok(project) => {
            let _ = city
                .projects
                .note_contribution(project, a, role_a)
                .and_then(|()| city.projects.note_contribution(project, b, role_b));
            format!("they agreed to build a {kind:?}")
        }
        Err(_) => String::from("they talked over an ongoing build"),
    }
}

/// A small bilateral trade.
fn trade_goods(city: &mut City, a: AgentId, b: AgentId) -> String {
    city.bonds.update(city.day, a, b, Interaction::Cooperative);
    let (richer, poorer) = if city.roster.get(a).map_or(0, |x| x.balance)
        >= city.roster.get(b).map_or(0, |x| x.balance)
    {
        (a, b)
    } else {
        (b, a)
    };
    if let Ok(moved) = city.ledger.transfer(city.day, richer, poorer, 30, "meeting_trade") {
        let _ = city.roster.set_balance(richer, city.ledger.balance(richer));
        let _ = city.roster.set_balance(poorer, city.ledger.balance(poorer));
        format!("goods changed hands for {moved} tokens")
    } else {
        String::from("they haggled but closed no deal")
    }
}

fn social_meeting(city: &mut City, a: AgentId, b: AgentId) -> String {
    city.bonds.update(city.day, a, b, Interaction::Cooperative);
    String::from("they talked for a while; the city felt smaller")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CityConfig;
    use aicity_types::TilePos;

    fn co_locate(city: &mut City, a: AgentId, b: AgentId) {
        city.roster.get_mut(a).unwrap().position = Some(TilePos { x: 0, y: 0 });
        city.roster.get_mut(b).unwrap().position = Some(TilePos { x: 2, y: 1 });
    }

    #[test]
    fn keyword_intent_matches_the_phrasebook() {
        assert!(keyword_intent("Meet me at the square after dark."));
        assert!(keyword_intent("Let's finalize our arrangement."));
        assert!(!keyword_intent("The weather was fine today."));
    }

    #[test]
    fn meetings_need_intent_and_co_location() {
        let mut city = City::big_bang(CityConfig::default());
        city.day = 3;
        let order = city.roster.turn_order();
        let (a, b) = (order[0], order[1]);

        // Intent without co-location: nothing fires.
        city.messages.send(3, Some(a), b, "Meet me at the square.");
        city.roster.get_mut(a).unwrap().position = Some(TilePos { x: 0, y: 0 });
        city.roster.get_mut(b).unwrap().position = Some(TilePos { x: 12, y: 0 });
        assert!(check_meetings(&mut city, keyword_intent).is_empty());

        // Co-location completes the pair.
        co_locate(&mut city, a, b);
        let fired = check_meetings(&mut city, keyword_intent);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].zone, "LOC_TOWN_SQUARE");
    }

    #[test]
    fn builder_merchant_meeting_starts_a_market() {
        let mut city = City::big_bang(CityConfig::default());
        city.day = 2;
        let builder = city.roster.alive_with_role(Role::Builder)[0].id;
        let merchant = city.roster.alive_with_role(Role::Merchant)[0].id;
        city.messages
            .send(2, Some(builder), merchant, "Join me, let's build together.");
        co_locate(&mut city, builder, merchant);

        let fired = check_meetings(&mut city, keyword_intent);
        assert_eq!(fired.len(), 1);
        assert!(city.projects.active_of_kind(AssetKind::MarketStall).is_some());
    }

    #[test]
    fn a_pair_meets_at_most_once_per_day() {
        let mut city = City::big_bang(CityConfig::default());
        city.day = 2;
        let order = city.roster.turn_order();
        let (a, b) = (order[0], order[1]);
        city.messages.send(2, Some(a), b, "Find me at the square.");
        city.messages.send(2, Some(b), a, "I'll be at the square.");
        co_locate(&mut city, a, b);

        let fired = check_meetings(&mut city, keyword_intent);
        assert_eq!(fired.len(), 1);
    }
}
