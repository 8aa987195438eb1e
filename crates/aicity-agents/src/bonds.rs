//! Symmetric pairwise bonds in [-1, +1] with decay and update rules.
//!
//! Bonds are stored under the sorted `(a, b)` key so symmetry holds by
//! construction. Cooperative interactions strengthen a bond, antagonistic
//! ones weaken it, shared project days add a little, and every non-zero
//! bond decays slowly toward zero each day.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use aicity_types::{AgentId, Bond};

/// The interaction classes that move a bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// Message, trade, heal, teaching: +0.10.
    Cooperative,
    /// Theft, arrest, blackmail, betrayal: -0.15.
    Antagonistic,
    /// Both contributed to the same project today: +0.05.
    SharedProjectDay,
}

impl Interaction {
    fn delta(self) -> Decimal {
        match self {
            Self::Cooperative => Decimal::new(10, 2),
            Self::Antagonistic => Decimal::new(-15, 2),
            Self::SharedProjectDay => Decimal::new(5, 2),
        }
    }
}

/// Daily decay applied toward zero on every non-zero bond.
const DAILY_DECAY: Decimal = Decimal::from_parts(5, 0, 0, false, 3); // 0.005

/// The city's relationship table.
#[derive(Debug, Clone, Default)]
pub struct BondTable {
    bonds: BTreeMap<(AgentId, AgentId), Bond>,
}

impl BondTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted bonds.
    pub fn from_bonds(bonds: Vec<Bond>) -> Self {
        let mut table = Self::new();
        for bond in bonds {
            table.bonds.insert(key(bond.a, bond.b), bond);
        }
        table
    }

    /// The bond between two agents (zero if never interacted).
    pub fn get(&self, a: AgentId, b: AgentId) -> Decimal {
        self.bonds
            .get(&key(a, b))
            .map_or(Decimal::ZERO, |bond| bond.strength)
    }

    /// Apply an interaction between two agents on the given day.
    pub fn update(&mut self, day: u32, a: AgentId, b: AgentId, interaction: Interaction) {
        if a == b {
            return;
        }
        let k = key(a, b);
        let entry = self.bonds.entry(k).or_insert(Bond {
            a: k.0,
            b: k.1,
            strength: Decimal::ZERO,
            last_updated_day: day,
        });
        let before = entry.strength;
        entry.strength = clamp(entry.strength + interaction.delta());
        entry.last_updated_day = day;
        debug!(a = %k.0, b = %k.1, ?interaction, %before, after = %entry.strength, "bond update");
    }

    /// Daily decay: every non-zero bond moves toward zero.
    pub fn decay(&mut self, day: u32) {
        for bond in self.bonds.values_mut() {
            if bond.strength.is_zero() {
                continue;
            }
            let step = DAILY_DECAY.min(bond.strength.abs());
            bond.strength = if bond.strength.is_sign_positive() {
                bond.strength - step
            } else {
                bond.strength + step
            };
            bond.last_updated_day = day;
        }
    }

    /// All bonds, for persistence and snapshots.
    pub fn all(&self) -> impl Iterator<Item = &Bond> {
        self.bonds.values()
    }

    /// Bonds involving `agent`, strongest magnitude first.
    pub fn for_agent(&self, agent: AgentId) -> Vec<&Bond> {
        let mut out: Vec<&Bond> = self
            .bonds
            .values()
            .filter(|b| b.a == agent || b.b == agent)
            .collect();
        out.sort_by(|x, y| y.strength.abs().cmp(&x.strength.abs()));
        out
    }

    /// Descriptive label for a bond strength, used in prompt context.
    pub fn label(strength: Decimal) -> &'static str {
        if strength >= Decimal::new(70, 2) {
            "close ally"
        } else if strength >= Decimal::new(40, 2) {
            "ally"
        } else if strength >= Decimal::new(15, 2) {
            "friendly"
        } else if strength >= Decimal::new(-10, 2) {
            "neutral"
        } else if strength >= Decimal::new(-40, 2) {
            "tense"
        } else if strength >= Decimal::new(-70, 2) {
            "rival"
        } else {
            "enemy"
        }
    }
}

fn key(a: AgentId, b: AgentId) -> (AgentId, AgentId) {
    if a <= b { (a, b) } else { (b, a) }
}

fn clamp(v: Decimal) -> Decimal {
    v.clamp(Decimal::new(-1, 0), Decimal::new(1, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonds_are_symmetric() {
        let mut table = BondTable::new();
        let a = AgentId::new();
        let b = AgentId::new();
        table.update(1, a, b, Interaction::Cooperative);
        assert_eq!(table.get(a, b), table.get(b, a));
        assert_eq!(table.get(a, b), Decimal::new(10, 2));
    }

    #[test]
    fn antagonism_outweighs_one_cooperation() {
        let mut table = BondTable::new();
        let a = AgentId::new();
        let b = AgentId::new();
        table.update(1, a, b, Interaction::Cooperative);
        table.update(1, a, b, Interaction::Antagonistic);
        assert_eq!(table.get(a, b), Decimal::new(-5, 2));
    }

    #[test]
    fn bond_clamps_at_one() {
        let mut table = BondTable::new();
        let a = AgentId::new();
        let b = AgentId::new();
        for day in 0..20 {
            table.update(day, a, b, Interaction::Cooperative);
        }
        assert_eq!(table.get(a, b), Decimal::new(1, 0));
    }

    #[test]
    fn decay_moves_toward_zero_without_crossing() {
        let mut table = BondTable::new();
        let a = AgentId::new();
        let b = AgentId::new();
        table.update(1, a, b, Interaction::SharedProjectDay); // +0.05
        for day in 2..=12 {
            table.decay(day);
        }
        // 10 days of 0.005 decay exactly consumes the bond; never negative.
        assert_eq!(table.get(a, b), Decimal::ZERO);
        table.decay(13);
        assert_eq!(table.get(a, b), Decimal::ZERO);
    }

    #[test]
    fn self_bonds_are_ignored() {
        let mut table = BondTable::new();
        let a = AgentId::new();
        table.update(1, a, a, Interaction::Cooperative);
        assert_eq!(table.get(a, a), Decimal::ZERO);
    }

    #[test]
    fn labels_span_the_scale() {
        assert_eq!(BondTable::label(Decimal::new(80, 2)), "close ally");
        assert_eq!(BondTable::label(Decimal::ZERO), "neutral");
        assert_eq!(BondTable::label(Decimal::new(-50, 2)), "rival");
        assert_eq!(BondTable::label(Decimal::new(-90, 2)), "enemy");
    }
}
