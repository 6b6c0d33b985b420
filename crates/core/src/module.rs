use crate::{
    grid::{Footprint, GridPoint, Rotation},
    terrain::TerrainPatch,
    util::{string_id, WeightedTable},
};
use anyhow::ensure;
use fnv::FnvBuildHasher;
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

string_id!(
    /// Unique key of a [ModuleDescriptor] within a catalog
    ModuleId
);

/// All known modules, keyed by ID, in declaration order
pub type ModuleMap = IndexMap<ModuleId, ModuleDescriptor, FnvBuildHasher>;

/// A module is a reusable tile that can be placed into the grid. It may cover
/// more than one cell, and may carry terrain data that gets stitched into the
/// map's master terrain after placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: ModuleId,

    /// Size of the module in cells, in its authored (north-facing)
    /// orientation
    #[serde(default)]
    pub footprint: Footprint,

    /// Terrain data carried by this module. Each region covers exactly one
    /// cell of the footprint; cells without a region contribute no terrain.
    #[serde(default)]
    pub terrain: Vec<TerrainRegion>,

    /// Groups of mutually exclusive cosmetic object sets. Each instance of the
    /// module gets exactly one option from every group.
    #[serde(default)]
    pub cosmetics: Vec<CosmeticGroup>,
}

impl ModuleDescriptor {
    /// Create a module with no terrain or cosmetics
    pub fn new(id: impl Into<ModuleId>, footprint: Footprint) -> Self {
        Self {
            id: id.into(),
            footprint,
            terrain: Vec::new(),
            cosmetics: Vec::new(),
        }
    }

    /// Does this module contribute anything to the master terrain?
    pub fn has_terrain(&self) -> bool {
        !self.terrain.is_empty()
    }

    /// Check internal consistency: every terrain region has to sit inside the
    /// footprint, and every region offset has to be unique.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.footprint.width > 0 && self.footprint.height > 0,
            "module {} has an empty footprint",
            self.id
        );
        for (i, region) in self.terrain.iter().enumerate() {
            let [x, y] = region.offset;
            ensure!(
                x < self.footprint.width as u32
                    && y < self.footprint.height as u32,
                "terrain region {:?} of module {} is outside of its \
                footprint {:?}",
                region.offset,
                self.id,
                self.footprint
            );
            ensure!(
                !self.terrain[..i].iter().any(|r| r.offset == region.offset),
                "module {} has multiple terrain regions at {:?}",
                self.id,
                region.offset
            );
        }
        for group in &self.cosmetics {
            ensure!(
                !group.options.is_empty(),
                "cosmetic group {} of module {} has no options",
                group.name,
                self.id
            );
        }
        Ok(())
    }

    /// Get the absolute grid position that a terrain region stitches into,
    /// when this module is placed at `origin` with the given rotation.
    pub fn region_position(
        &self,
        region: &TerrainRegion,
        origin: GridPoint,
        rotation: Rotation,
    ) -> GridPoint {
        let [x, y] = region.offset;
        let (rx, ry) = rotation.rotate_offset(
            (x, y),
            self.footprint.width as u32,
            self.footprint.height as u32,
        );
        origin.offset(rx as i32, ry as i32)
    }

    /// Pick one option from each cosmetic group. Groups where every option has
    /// zero weight are skipped.
    pub fn pick_cosmetics(&self, rng: &mut impl Rng) -> Vec<CosmeticChoice> {
        self.cosmetics
            .iter()
            .filter_map(|group| {
                let table: WeightedTable<&CosmeticOption> = group
                    .options
                    .iter()
                    .map(|option| (option, option.weight))
                    .collect();
                table.into_pick(rng).map(|option| CosmeticChoice {
                    group: group.name.clone(),
                    option: option.name.clone(),
                })
            })
            .collect()
    }
}

/// A chunk of terrain belonging to one cell of a module's footprint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainRegion {
    /// Cell offset of this region from the module's origin, in the module's
    /// unrotated frame
    #[serde(default)]
    pub offset: [u32; 2],
    pub patch: TerrainPatch,
}

/// A set of mutually exclusive cosmetic object sets, e.g. different clutter
/// arrangements for the same room
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CosmeticGroup {
    pub name: String,
    pub options: Vec<CosmeticOption>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CosmeticOption {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

/// The cosmetic option chosen for one group of one module instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmeticChoice {
    pub group: String,
    pub option: String,
}

fn default_weight() -> f32 {
    100.0
}
