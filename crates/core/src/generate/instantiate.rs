use crate::{
    catalog::TileCatalog,
    config::MapConfig,
    generate::{
        budget::Pacer,
        host::{InstanceHandle, InstanceRequest},
        Phase,
    },
    grid::{Footprint, GridMap, GridPoint, Rotation},
    module::{CosmeticChoice, ModuleId, TerrainRegion},
};
use anyhow::Context;
use fnv::FnvHashSet;
use log::{debug, trace, warn};
use nalgebra::Point3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A realized module on the map. There's exactly one instance per origin
/// cell; the other cells of a multi-cell module don't get their own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleInstance {
    pub module: ModuleId,
    pub origin: GridPoint,
    pub rotation: Rotation,
    /// Unrotated footprint of the module
    pub footprint: Footprint,
    /// World position of the origin cell's corner. `y` is up, so grid `x`
    /// maps to world `x` and grid `y` maps to world `z`.
    pub position: Point3<f64>,
    pub cosmetics: Vec<CosmeticChoice>,
    pub handle: InstanceHandle,
    /// This instance's copy of its module's terrain, waiting to be stitched.
    /// `None` once stitched (or if the module has no terrain).
    #[serde(skip)]
    pub terrain: Option<Vec<TerrainRegion>>,
}

/// Convert a grid position to the world position of its corner
pub fn world_position(position: GridPoint, module_size: f64) -> Point3<f64> {
    Point3::new(
        position.x as f64 * module_size,
        0.0,
        position.y as f64 * module_size,
    )
}

/// Instantiate every placed module, in row-major order of origin cells.
///
/// The host is never asked to start a module while an earlier instance of the
/// same module is still loading. In that case we yield frames until the host
/// reports the module as resident. There's a checkpoint before every instance.
pub fn instantiate_all(
    config: &MapConfig,
    map: &GridMap,
    catalog: &TileCatalog,
    rng: &mut impl Rng,
    pacer: &mut Pacer<'_>,
) -> anyhow::Result<Vec<ModuleInstance>> {
    let origins: Vec<_> = map.origins().collect();
    let total = origins.len();
    let mut pending: FnvHashSet<ModuleId> = FnvHashSet::default();
    let mut instances = Vec::with_capacity(total);

    for (i, cell) in origins.into_iter().enumerate() {
        pacer.checkpoint()?;
        // Origins always have a module, this is just to unwrap it
        let module_id = match cell.module() {
            Some(module_id) => module_id,
            None => continue,
        };
        let module = match catalog.module(module_id) {
            Some(module) => module,
            None => {
                warn!(
                    "Cell {} references unknown module {}, skipping",
                    cell.position(),
                    module_id
                );
                continue;
            }
        };

        if pending.contains(module_id) {
            trace!("Waiting for module {} to finish loading", module_id);
            while !pacer.host().is_resident(module_id) {
                pacer.yield_frame()?;
            }
            pending.remove(module_id);
        }

        let position = world_position(cell.position(), config.module_size);
        let cosmetics = module.pick_cosmetics(rng);
        let request = InstanceRequest {
            module: module_id.clone(),
            position,
            yaw_degrees: cell.rotation().yaw_degrees(),
            cosmetics: cosmetics.clone(),
        };
        let handle = pacer.host().instantiate(request).with_context(|| {
            format!(
                "error instantiating module {} at {}",
                module_id,
                cell.position()
            )
        })?;
        if !pacer.host().is_resident(module_id) {
            pending.insert(module_id.clone());
        }

        instances.push(ModuleInstance {
            module: module_id.clone(),
            origin: cell.position(),
            rotation: cell.rotation(),
            footprint: module.footprint,
            position,
            cosmetics,
            handle,
            terrain: if module.has_terrain() {
                Some(module.terrain.clone())
            } else {
                None
            },
        });
        pacer.report(Phase::Instantiation, (i + 1) as f32 / total as f32);
    }

    debug!("Instantiated {} modules", instances.len());
    Ok(instances)
}
