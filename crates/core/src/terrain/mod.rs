//! Terrain data, both the per-module patches that modules are authored with
//! and the single master terrain that they get stitched into.

mod array;
pub mod rotate;
mod stitch;

pub use self::{array::Array2, stitch::TerrainStitcher};
use serde::{Deserialize, Serialize};

/// The terrain for one cell of a module. All the arrays in a patch cover the
/// same square of the world, just at different resolutions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainPatch {
    /// Height samples, in world units
    pub heights: Array2<f32>,

    /// Splat weights, one array per terrain texture layer
    #[serde(default)]
    pub alphamaps: Vec<Array2<f32>>,

    /// Detail (grass, pebbles, etc.) densities, one array per detail
    /// prototype
    #[serde(default)]
    pub details: Vec<Array2<u16>>,

    /// Trees, positioned within this patch
    #[serde(default)]
    pub trees: Vec<TreeInstance>,
}

impl TerrainPatch {
    /// A perfectly flat patch with no trees, using the same resolution for
    /// every array. Alpha layers are fully weighted to the first layer.
    pub fn flat(
        resolution: usize,
        alpha_layers: usize,
        detail_layers: usize,
        height: f32,
    ) -> Self {
        let alphamaps = (0..alpha_layers)
            .map(|layer| {
                let weight = if layer == 0 { 1.0 } else { 0.0 };
                Array2::filled(resolution, resolution, weight)
            })
            .collect();
        Self {
            heights: Array2::filled(resolution, resolution, height),
            alphamaps,
            details: vec![
                Array2::filled(resolution, resolution, 0);
                detail_layers
            ],
            trees: Vec::new(),
        }
    }
}

/// A single tree. Positions are normalized to `[0, 1]` on both axes, relative
/// to whatever terrain the tree belongs to (a patch, or the master terrain).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeInstance {
    /// Name of the tree prototype (model) to use
    pub prototype: String,
    pub position: [f32; 2],
    #[serde(default = "default_tree_scale")]
    pub scale: f32,
}

fn default_tree_scale() -> f32 {
    1.0
}

/// Resolutions and layer counts that every terrain patch in a map has to
/// agree on
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainLayout {
    /// Heightmap samples per cell edge
    pub heightmap_resolution: usize,
    /// Splatmap samples per cell edge
    pub alphamap_resolution: usize,
    /// Detail samples per cell edge
    pub detail_resolution: usize,
    pub alpha_layers: usize,
    pub detail_layers: usize,
}

/// Coarse collision data for a single cell: the height bounds of the terrain
/// inside it
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionTile {
    pub min_height: f32,
    pub max_height: f32,
}

/// The single, continuous terrain of a whole map. Every array covers the entire
/// grid, so e.g. the heightmap of a `W x H` cell map with a heightmap
/// resolution of `r` is `W*r x H*r` samples.
///
/// Everything except `details` uses bottom-up rows (row 0 is the southern
/// edge, matching grid `y`). Detail layers are stored top-down, i.e. row 0 is
/// the **northern** edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasterTerrain {
    pub layout: TerrainLayout,
    pub heights: Array2<f32>,
    pub alphamaps: Vec<Array2<f32>>,
    pub details: Vec<Array2<u16>>,
    /// Trees, positioned relative to the whole terrain
    pub trees: Vec<TreeInstance>,
    /// Every distinct prototype referenced by `trees`, sorted. Rebuilt by
    /// [Self::flush].
    pub tree_prototypes: Vec<String>,
    /// `(min, max)` over the entire heightmap. Rebuilt by [Self::flush].
    pub height_range: (f32, f32),
    /// Per-cell height bounds. Rebuilt by [Self::flush].
    pub collision: Array2<CollisionTile>,
}

impl MasterTerrain {
    /// Create an empty (flat, zero height, unpainted) terrain for a grid of
    /// the given size
    pub fn new(layout: TerrainLayout, width: usize, height: usize) -> Self {
        let hres = layout.heightmap_resolution;
        let ares = layout.alphamap_resolution;
        let dres = layout.detail_resolution;
        Self {
            layout,
            heights: Array2::filled(width * hres, height * hres, 0.0),
            alphamaps: vec![
                Array2::filled(width * ares, height * ares, 0.0);
                layout.alpha_layers
            ],
            details: vec![
                Array2::filled(width * dres, height * dres, 0);
                layout.detail_layers
            ],
            trees: Vec::new(),
            tree_prototypes: Vec::new(),
            height_range: (0.0, 0.0),
            collision: Array2::filled(width, height, CollisionTile {
                min_height: 0.0,
                max_height: 0.0,
            }),
        }
    }

    /// A terrain with no samples at all, for maps where nothing carries
    /// terrain
    pub fn empty(layout: TerrainLayout) -> Self {
        Self::new(layout, 0, 0)
    }

    /// Does this terrain have any samples?
    pub fn is_empty(&self) -> bool {
        self.heights.data().is_empty()
    }

    /// Recompute all derived data after the arrays have been modified:
    /// - Height range of the whole map
    /// - Tree prototype list
    /// - Per-cell collision bounds
    pub fn flush(&mut self) {
        let heights = self.heights.data();
        self.height_range = if heights.is_empty() {
            (0.0, 0.0)
        } else {
            heights.iter().fold((f32::MAX, f32::MIN), |(min, max), h| {
                (min.min(*h), max.max(*h))
            })
        };

        let mut prototypes: Vec<String> =
            self.trees.iter().map(|tree| tree.prototype.clone()).collect();
        prototypes.sort_unstable();
        prototypes.dedup();
        self.tree_prototypes = prototypes;

        let res = self.layout.heightmap_resolution;
        let (cells_x, cells_y) = self.collision.dimensions();
        for cell_y in 0..cells_y {
            for cell_x in 0..cells_x {
                let mut tile = CollisionTile {
                    min_height: f32::MAX,
                    max_height: f32::MIN,
                };
                for y in cell_y * res..(cell_y + 1) * res {
                    for x in cell_x * res..(cell_x + 1) * res {
                        if let Some(h) = self.heights.get(x, y) {
                            tile.min_height = tile.min_height.min(*h);
                            tile.max_height = tile.max_height.max(*h);
                        }
                    }
                }
                if let Some(slot) = self.collision.get_mut(cell_x, cell_y) {
                    *slot = tile;
                }
            }
        }
    }
}
