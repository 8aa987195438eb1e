//! Witness detection and the vague memory fragments witnesses keep.
//!
//! A bystander within the co-location radius at the time of an event
//! becomes a witness: the event is promoted toward `Witnessed` and the
//! witness receives a partial, templated memory -- a fragment, never the
//! full truth.

use rand::Rng;

use aicity_types::{AgentId, EventKind, TilePos};

/// A detected witness together with the fragment they will remember.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessSighting {
    pub witness: AgentId,
    /// The vague memory text to store in the witness's private memory.
    pub fragment: String,
}

/// Witness memory templates keyed by event kind. `{actor}` and `{target}`
/// are substituted; witnesses see fragments, not facts.
fn templates(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::Theft => &[
            "I noticed {actor} acting suspiciously near {target}'s area. Something felt off.",
            "I saw someone moving quickly away from where {target} usually is. Couldn't make out who.",
            "There was a commotion near {target}'s area. I didn't see exactly what happened.",
            "I caught a glimpse of someone rushing away around the time {target} reported being robbed.",
            "I saw {actor} watching {target} from a distance earlier. Didn't think much of it at the time.",
        ],
        EventKind::Arson | EventKind::Sabotage => &[
            "I saw smoke rising from that direction. Not sure what caused it.",
            "I noticed someone near the area earlier that night. Couldn't see their face clearly.",
            "I smelled smoke and saw a figure leaving quickly. Couldn't identify them.",
            "Something was burning. I saw a shadow moving away from it fast.",
            "I heard something crack and saw flames. By the time I got close, whoever did it was gone.",
        ],
        EventKind::Assault => &[
            "I heard raised voices near {target}'s area but didn't want to get involved.",
            "I saw two people arguing intensely. One of them might have been {target}.",
            "I noticed {target} looked shaken afterward but I don't know why.",
            "There was a scuffle. I only caught the tail end of it.",
        ],
        EventKind::Bribe => &[
            "I saw {actor} meeting with someone privately. They exchanged something -- I couldn't tell what.",
            "There was a quiet conversation that stopped when I walked past. Something felt wrong about it.",
            "I saw tokens change hands between {actor} and someone I couldn't identify clearly.",
        ],
        EventKind::Blackmail => &[
            "I overheard part of a conversation that sounded threatening. Someone was being pressured.",
            "I saw a message being passed. The recipient looked pale afterward.",
            "I heard {actor} talking in low tones. The other person looked scared.",
        ],
        _ => &[
            "Something happened near {actor}'s area. I'm not sure what.",
            "I noticed unusual activity but couldn't make sense of it.",
            "There was something going on. I only caught a glimpse.",
        ],
    }
}

/// A bystander eligible to witness: alive, not the actor or target, with a
/// known position.
#[derive(Debug, Clone, Copy)]
pub struct Bystander {
    pub id: AgentId,
    pub position: TilePos,
}

/// Detect witnesses for an event at `scene` among `bystanders`.
///
/// Co-location within `radius` makes a bystander a witness. The fragment
/// each witness keeps is chosen at random from the kind's template set.
pub fn detect_witnesses<R: Rng>(
    rng: &mut R,
    kind: EventKind,
    actor_name: &str,
    target_name: &str,
    scene: TilePos,
    radius: i32,
    bystanders: &[Bystander],
) -> Vec<WitnessSighting> {
    let pool = templates(kind);
    bystanders
        .iter()
        .filter(|b| b.position.distance(scene) <= radius)
        .map(|b| {
            let template = pool[rng.gen_range(0..pool.len())];
            WitnessSighting {
                witness: b.id,
                fragment: template
                    .replace("{actor}", actor_name)
                    .replace("{target}", target_name),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn only_co_located_bystanders_witness() {
        let mut rng = StdRng::seed_from_u64(7);
        let near = Bystander {
            id: AgentId::new(),
            position: TilePos { x: 1, y: 1 },
        };
        let far = Bystander {
            id: AgentId::new(),
            position: TilePos { x: 40, y: 40 },
        };
        let sightings = detect_witnesses(
            &mut rng,
            EventKind::Theft,
            "Kappa-Forge",
            "Mu-Tide",
            TilePos { x: 0, y: 0 },
            8,
            &[near, far],
        );
        assert_eq!(sightings.len(), 1);
        assert_eq!(sightings[0].witness, near.id);
    }

    #[test]
    fn fragments_substitute_names() {
        let mut rng = StdRng::seed_from_u64(3);
        let b = Bystander {
            id: AgentId::new(),
            position: TilePos { x: 0, y: 0 },
        };
        let sightings = detect_witnesses(
            &mut rng,
            EventKind::Bribe,
            "Omega-Root",
            "Zeta-Beam",
            TilePos { x: 0, y: 0 },
            8,
            &[b],
        );
        assert_eq!(sightings.len(), 1);
        assert!(!sightings[0].fragment.contains("{actor}"));
        assert!(!sightings[0].fragment.contains("{target}"));
    }

    #[test]
    fn fallback_templates_cover_every_kind() {
        // No event kind may panic on template lookup.
        let mut rng = StdRng::seed_from_u64(11);
        let b = Bystander {
            id: AgentId::new(),
            position: TilePos { x: 0, y: 0 },
        };
        for kind in [
            EventKind::Heal,
            EventKind::Death,
            EventKind::Build,
            EventKind::Discovery,
        ] {
            let sightings = detect_witnesses(
                &mut rng,
                kind,
                "A",
                "B",
                TilePos { x: 0, y: 0 },
                8,
                &[b],
            );
            assert_eq!(sightings.len(), 1);
        }
    }
}
