//! The tile grid: named zones for co-location and the home-lot ledger.
//!
//! Zones drive two mechanics: witnesses must be within the co-location
//! radius of an event, and a meeting only fires when both parties stand in
//! the same zone on the same day.

use serde::{Deserialize, Serialize};
use tracing::info;

use aicity_types::{AgentId, TilePos};

/// A named circular zone on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub center: TilePos,
    pub radius: i32,
}

/// The city's fixed zone map.
#[derive(Debug, Clone)]
pub struct TileGrid {
    zones: Vec<Zone>,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            zones: vec![
                zone("LOC_TOWN_SQUARE", 0, 0, 6),
                zone("LOC_MARKET", 12, 0, 5),
                zone("LOC_WORKSHOPS", -12, 4, 5),
                zone("LOC_RESIDENCES", 0, 12, 6),
                zone("LOC_OUTSKIRTS", -4, -14, 7),
                zone("LOC_STATION", 10, 10, 4),
            ],
        }
    }
}

fn zone(name: &str, x: i32, y: i32, radius: i32) -> Zone {
    Zone {
        name: name.to_owned(),
        center: TilePos { x, y },
        radius,
    }
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// The zone a position falls in, innermost match first.
    pub fn zone_of(&self, pos: TilePos) -> Option<&Zone> {
        self.zones
            .iter()
            .filter(|z| z.center.distance(pos) <= z.radius)
            .min_by_key(|z| z.center.distance(pos))
    }

    /// Whether two positions share a zone.
    pub fn same_zone(&self, a: TilePos, b: TilePos) -> bool {
        match (self.zone_of(a), self.zone_of(b)) {
            (Some(za), Some(zb)) => za.name == zb.name,
            _ => false,
        }
    }
}

/// One claimable home lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeLot {
    pub name: String,
    pub tile: TilePos,
    pub owner: Option<AgentId>,
}

/// The home-lot ledger: first come, first housed.
#[derive(Debug, Clone)]
pub struct HomeLots {
    lots: Vec<HomeLot>,
}

impl Default for HomeLots {
    fn default() -> Self {
        let lots = (0..16)
            .map(|i| HomeLot {
                name: format!("LOT_{i:02}"),
                tile: TilePos {
                    x: -6 + (i % 4) * 4,
                    y: 10 + (i / 4) * 3,
                },
                owner: None,
            })
            .collect();
        Self { lots }
    }
}

impl HomeLots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted lots.
    pub fn from_lots(lots: Vec<HomeLot>) -> Self {
        if lots.is_empty() {
            return Self::default();
        }
        Self { lots }
    }

    pub fn all(&self) -> &[HomeLot] {
        &self.lots
    }

    /// Claim the first free lot for an agent. Returns the lot name.
    pub fn claim(&mut self, agent: AgentId) -> Option<String> {
        if self.lot_of(agent).is_some() {
            return None;
        }
        let lot = self.lots.iter_mut().find(|l| l.owner.is_none())?;
        lot.owner = Some(agent);
        info!(agent = %agent, lot = %lot.name, "home lot claimed");
        Some(lot.name.clone())
    }

    /// The lot an agent owns, if any.
    pub fn lot_of(&self, agent: AgentId) -> Option<&HomeLot> {
        self.lots.iter().find(|l| l.owner == Some(agent))
    }

    /// Free a dead agent's lot.
    pub fn release(&mut self, agent: AgentId) {
        for lot in &mut self.lots {
            if lot.owner == Some(agent) {
                lot.owner = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_lookup_finds_the_square() {
        let grid = TileGrid::new();
        let pos = TilePos { x: 1, y: -2 };
        assert_eq!(
            grid.zone_of(pos).map(|z| z.name.as_str()),
            Some("LOC_TOWN_SQUARE")
        );
    }

    #[test]
    fn far_positions_have_no_zone() {
        let grid = TileGrid::new();
        assert!(grid.zone_of(TilePos { x: 99, y: 99 }).is_none());
    }

    #[test]
    fn same_zone_requires_both_inside() {
        let grid = TileGrid::new();
        let a = TilePos { x: 0, y: 0 };
        let b = TilePos { x: 3, y: 3 };
        let c = TilePos { x: 12, y: 1 };
        assert!(grid.same_zone(a, b));
        assert!(!grid.same_zone(a, c));
    }

    #[test]
    fn lots_claim_once_and_release() {
        let mut lots = HomeLots::new();
        let a = AgentId::new();
        let first = lots.claim(a);
        assert!(first.is_some());
        // A second claim by the same agent is a no-op.
        assert!(lots.claim(a).is_none());
        lots.release(a);
        assert!(lots.lot_of(a).is_none());
    }
}
