//! Standing assets: creation on project completion, daily benefit data,
//! and sabotage.
//!
//! Benefits are applied by the scheduler (it owns the ledger); this module
//! owns the records and says who gets what. Destroyed assets stop applying
//! benefits immediately.

use rand::Rng;
use tracing::{info, warn};

use aicity_types::{
    AgentId, Asset, AssetBenefit, AssetId, AssetKind, AssetStatus, Role, TilePos,
};

use crate::WorldError;

/// Themed names per asset kind, picked at build time.
fn name_pool(kind: AssetKind) -> &'static [&'static str] {
    match kind {
        AssetKind::Watchtower => &[
            "Northern Watchtower",
            "East Watchtower",
            "The Sentinel Tower",
            "Ashwatch Tower",
        ],
        AssetKind::Hospital => &[
            "City Hospital",
            "The Healing Hall",
            "St. Marcus Infirmary",
            "The Menders' House",
        ],
        AssetKind::MarketStall => &[
            "East Market",
            "The Common Exchange",
            "Voss Market",
            "The Trade Post",
        ],
        AssetKind::School => &[
            "School of Arts",
            "The Learning Hall",
            "Keeper's Academy",
            "The Open School",
        ],
        AssetKind::Road => &[
            "The North Road",
            "River Path",
            "The Old Track",
            "Founders' Road",
        ],
        AssetKind::Archive => &[
            "The City Archive",
            "The Memory Hall",
            "Keeper's Archive",
            "The Record House",
        ],
    }
}

/// Physical clues a sabotage leaves at the scene.
const SABOTAGE_CLUES: [&str; 7] = [
    "scorch marks found on the foundation",
    "tools found nearby, not belonging to any known builder",
    "footprints in the dirt, leading away from the east side",
    "a faint smell of accelerant near the wreckage",
    "a bent crowbar found wedged deep in the structure",
    "a torn piece of cloth caught on the outer wall",
    "chisel marks inconsistent with construction work",
];

/// The daily benefit an asset kind provides.
const fn benefit_for(kind: AssetKind) -> AssetBenefit {
    match kind {
        AssetKind::Watchtower => AssetBenefit::RoleBonus {
            role: Role::Police,
            tokens: 30,
        },
        AssetKind::Hospital => AssetBenefit::RoleBonus {
            role: Role::Healer,
            tokens: 40,
        },
        AssetKind::MarketStall => AssetBenefit::RoleSplit {
            role: Role::Merchant,
            pool: 50,
        },
        AssetKind::School => AssetBenefit::RoleBonus {
            role: Role::Teacher,
            tokens: 30,
        },
        AssetKind::Road => AssetBenefit::RoleBonus {
            role: Role::Explorer,
            tokens: 25,
        },
        AssetKind::Archive => AssetBenefit::NarrativeFlag,
    }
}

/// The registry of everything ever built.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: Vec<Asset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_assets(assets: Vec<Asset>) -> Self {
        Self { assets }
    }

    pub fn all(&self) -> &[Asset] {
        &self.assets
    }

    pub fn get(&self, id: AssetId) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Assets currently applying benefits (standing or damaged).
    pub fn standing(&self) -> Vec<&Asset> {
        self.assets.iter().filter(|a| a.is_standing()).collect()
    }

    /// Whether a standing asset of this kind exists.
    pub fn has_standing(&self, kind: AssetKind) -> bool {
        self.standing().iter().any(|a| a.kind == kind)
    }

    /// Standing asset kinds, as flags for prompts and behaviors.
    pub fn standing_kinds(&self) -> Vec<AssetKind> {
        let mut kinds: Vec<AssetKind> =
            self.standing().iter().map(|a| a.kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        kinds
    }

    /// Create a standing asset from a completed project.
    pub fn create<R: Rng>(
        &mut self,
        rng: &mut R,
        kind: AssetKind,
        builders: Vec<AgentId>,
        day: u32,
        tile: Option<TilePos>,
    ) -> AssetId {
        let pool = name_pool(kind);
        let name = pool[rng.gen_range(0..pool.len())].to_owned();
        let asset = Asset {
            id: AssetId::new(),
            name: name.clone(),
            kind,
            builders,
            day_built: day,
            status: AssetStatus::Standing,
            benefit: benefit_for(kind),
            day_destroyed: None,
            tile,
        };
        let id = asset.id;
        info!(asset = %name, ?kind, day, "asset built");
        self.assets.push(asset);
        id
    }

    /// Destroy an asset. Returns the clue left at the scene, for the
    /// private sabotage event's evidence trail.
    pub fn destroy<R: Rng>(
        &mut self,
        rng: &mut R,
        id: AssetId,
        day: u32,
    ) -> Result<&'static str, WorldError> {
        let asset = self
            .assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(WorldError::UnknownAsset(id))?;
        if asset.status == AssetStatus::Destroyed {
            return Err(WorldError::UnknownAsset(id));
        }
        asset.status = AssetStatus::Destroyed;
        asset.day_destroyed = Some(day);
        let clue = SABOTAGE_CLUES[rng.gen_range(0..SABOTAGE_CLUES.len())];
        warn!(asset = %asset.name, day, clue, "asset destroyed");
        Ok(clue)
    }

    /// Mark an asset damaged; it keeps working until destroyed.
    pub fn damage(&mut self, id: AssetId) -> Result<(), WorldError> {
        let asset = self
            .assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(WorldError::UnknownAsset(id))?;
        if asset.status == AssetStatus::Standing {
            asset.status = AssetStatus::Damaged;
        }
        Ok(())
    }

    /// Assets changed on `day`, for the persistence delta.
    pub fn changed_on(&self, day: u32) -> Vec<&Asset> {
        self.assets
            .iter()
            .filter(|a| a.day_built == day || a.day_destroyed == Some(day))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn created_assets_stand_and_carry_benefits() {
        let mut registry = AssetRegistry::new();
        let mut rng = StdRng::seed_from_u64(5);
        let id = registry.create(&mut rng, AssetKind::Hospital, vec![AgentId::new()], 5, None);
        let asset = registry.get(id).unwrap();
        assert!(asset.is_standing());
        assert_eq!(
            asset.benefit,
            AssetBenefit::RoleBonus {
                role: Role::Healer,
                tokens: 40
            }
        );
    }

    #[test]
    fn destroyed_assets_stop_standing() {
        let mut registry = AssetRegistry::new();
        let mut rng = StdRng::seed_from_u64(5);
        let id = registry.create(&mut rng, AssetKind::Watchtower, Vec::new(), 3, None);
        let clue = registry.destroy(&mut rng, id, 9).unwrap();
        assert!(!clue.is_empty());
        assert!(!registry.has_standing(AssetKind::Watchtower));
        assert_eq!(registry.get(id).unwrap().day_destroyed, Some(9));
    }

    #[test]
    fn double_destruction_is_rejected() {
        let mut registry = AssetRegistry::new();
        let mut rng = StdRng::seed_from_u64(5);
        let id = registry.create(&mut rng, AssetKind::Road, Vec::new(), 2, None);
        let _ = registry.destroy(&mut rng, id, 4).unwrap();
        assert!(registry.destroy(&mut rng, id, 5).is_err());
    }

    #[test]
    fn market_benefit_is_a_split() {
        assert_eq!(
            benefit_for(AssetKind::MarketStall),
            AssetBenefit::RoleSplit {
                role: Role::Merchant,
                pool: 50
            }
        );
    }

    #[test]
    fn archive_is_flag_only() {
        assert_eq!(benefit_for(AssetKind::Archive), AssetBenefit::NarrativeFlag);
    }
}
