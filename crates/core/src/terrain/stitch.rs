use crate::{
    config::{ExecutionStrategy, MapConfig},
    generate::{GenerationError, ModuleInstance},
    grid::{GridPoint, GridPointSet, Rotation},
    terrain::{
        rotate::{rotate_array, rotate_normalized},
        Array2, MasterTerrain, TerrainLayout, TerrainPatch, TreeInstance,
    },
};
use anyhow::ensure;
use log::{debug, warn};

/// Merges the terrain of every placed module into a single [MasterTerrain].
///
/// Usage is single pass: create a stitcher for a set of instances, call
/// [Self::stitch] once per instance, then [Self::finish]. Each instance's
/// terrain regions are taken out of the instance and dropped once merged.
///
/// Every region lands in exactly one grid cell, and every cell is written at
/// most once, so writes into the master arrays never overlap.
#[derive(Debug)]
pub struct TerrainStitcher {
    terrain: MasterTerrain,
    grid_size: (u16, u16),
    module_size: f64,
    execution: ExecutionStrategy,
    processed: GridPointSet,
}

impl TerrainStitcher {
    /// Create a stitcher with an empty master terrain. Resolutions come from
    /// the config, and layer counts come from the first instance (in the
    /// given order) that carries any terrain. Every other patch has to match.
    /// If no instance carries terrain, the master terrain has no samples.
    pub fn new(config: &MapConfig, instances: &[ModuleInstance]) -> Self {
        let reference = instances
            .iter()
            .filter_map(|instance| instance.terrain.as_ref())
            .flatten()
            .map(|region| &region.patch)
            .next();
        let mut layout = TerrainLayout {
            heightmap_resolution: config.heightmap_resolution as usize,
            alphamap_resolution: config.alphamap_resolution as usize,
            detail_resolution: config.detail_resolution as usize,
            alpha_layers: 0,
            detail_layers: 0,
        };
        let terrain = match reference {
            Some(patch) => {
                layout.alpha_layers = patch.alphamaps.len();
                layout.detail_layers = patch.details.len();
                MasterTerrain::new(
                    layout,
                    config.width as usize,
                    config.height as usize,
                )
            }
            None => {
                debug!("No instances carry terrain");
                MasterTerrain::empty(layout)
            }
        };
        Self {
            terrain,
            grid_size: (config.width, config.height),
            module_size: config.module_size,
            execution: config.execution,
            processed: GridPointSet::default(),
        }
    }

    pub fn layout(&self) -> TerrainLayout {
        self.terrain.layout
    }

    /// Merge all of an instance's terrain into the master terrain. The
    /// instance's terrain is released afterwards, whether it succeeds or not.
    /// Fails with [GenerationError::TerrainMismatch] if any region doesn't
    /// match the master layout, which should abort the whole run.
    pub fn stitch(&mut self, instance: &mut ModuleInstance) -> anyhow::Result<()> {
        let regions = match instance.terrain.take() {
            Some(regions) => regions,
            None => return Ok(()),
        };
        let (width, height) = (
            instance.footprint.width as u32,
            instance.footprint.height as u32,
        );
        for region in regions {
            let [x, y] = region.offset;
            let (dx, dy) =
                instance.rotation.rotate_offset((x, y), width, height);
            let cell = instance.origin.offset(dx as i32, dy as i32);
            if !self.contains(cell) {
                warn!(
                    "Terrain region {:?} of module {} lands outside the grid \
                    at {}, skipping",
                    region.offset, instance.module, cell
                );
                continue;
            }
            if !self.processed.insert(cell) {
                warn!(
                    "Terrain for cell {} was already stitched, skipping \
                    region {:?} of module {}",
                    cell, region.offset, instance.module
                );
                continue;
            }

            self.check_patch(&region.patch).map_err(|err| {
                GenerationError::TerrainMismatch {
                    module: instance.module.clone(),
                    position: cell,
                    reason: err.to_string(),
                }
            })?;
            self.merge_patch(&region.patch, cell, instance.rotation);
        }
        Ok(())
    }

    /// Flush and return the finished terrain
    pub fn finish(mut self) -> MasterTerrain {
        self.terrain.flush();
        self.terrain
    }

    fn contains(&self, cell: GridPoint) -> bool {
        (0..self.grid_size.0 as i32).contains(&cell.x)
            && (0..self.grid_size.1 as i32).contains(&cell.y)
    }

    fn check_patch(&self, patch: &TerrainPatch) -> anyhow::Result<()> {
        let layout = &self.terrain.layout;
        let square = |array_dims: (usize, usize), res: usize, name: &str| {
            ensure!(
                array_dims == (res, res),
                "{} is {}x{}, expected {}x{}",
                name,
                array_dims.0,
                array_dims.1,
                res,
                res
            );
            Ok(())
        };

        square(
            patch.heights.dimensions(),
            layout.heightmap_resolution,
            "heightmap",
        )?;
        ensure!(
            patch.alphamaps.len() == layout.alpha_layers,
            "has {} alpha layers, expected {}",
            patch.alphamaps.len(),
            layout.alpha_layers
        );
        for alphamap in &patch.alphamaps {
            square(
                alphamap.dimensions(),
                layout.alphamap_resolution,
                "alphamap",
            )?;
        }
        ensure!(
            patch.details.len() == layout.detail_layers,
            "has {} detail layers, expected {}",
            patch.details.len(),
            layout.detail_layers
        );
        for detail in &patch.details {
            square(detail.dimensions(), layout.detail_resolution, "detail layer")?;
        }
        Ok(())
    }

    /// Offset of a cell's corner within a master array, given the number of
    /// samples per cell. Derived from world position so that arrays at every
    /// resolution line up on the same world-space boundaries.
    fn sample_offset(&self, cell: GridPoint, resolution: usize) -> (usize, usize) {
        let scale = resolution as f64 / self.module_size;
        let world_x = cell.x as f64 * self.module_size;
        let world_y = cell.y as f64 * self.module_size;
        (
            (world_x * scale).round() as usize,
            (world_y * scale).round() as usize,
        )
    }

    fn merge_patch(
        &mut self,
        patch: &TerrainPatch,
        cell: GridPoint,
        rotation: Rotation,
    ) {
        let layout = self.terrain.layout;

        let (x, y) = self.sample_offset(cell, layout.heightmap_resolution);
        let heights = rotate_array(&patch.heights, rotation, self.execution);
        self.terrain.heights.blit(&heights, x, y);

        let (x, y) = self.sample_offset(cell, layout.alphamap_resolution);
        for (master, alphamap) in
            self.terrain.alphamaps.iter_mut().zip(&patch.alphamaps)
        {
            master.blit(&rotate_array(alphamap, rotation, self.execution), x, y);
        }

        // Detail layers are stored top-down in the master terrain, so both
        // the destination row and the rows within the patch get flipped
        let res = layout.detail_resolution;
        let (x, _) = self.sample_offset(cell, res);
        for (master, detail) in self.terrain.details.iter_mut().zip(&patch.details)
        {
            let total_rows = master.height();
            let y = total_rows - (cell.y as usize + 1) * res;
            let rotated: Array2<u16> =
                rotate_array(detail, rotation, self.execution).flip_rows();
            master.blit(&rotated, x, y);
        }

        let (grid_width, grid_height) =
            (self.grid_size.0 as f32, self.grid_size.1 as f32);
        self.terrain.trees.extend(patch.trees.iter().map(|tree| {
            let [tx, ty] = rotate_normalized(tree.position, rotation);
            TreeInstance {
                prototype: tree.prototype.clone(),
                position: [
                    (cell.x as f32 + tx) / grid_width,
                    (cell.y as f32 + ty) / grid_height,
                ],
                scale: tree.scale,
            }
        }));
    }
}
