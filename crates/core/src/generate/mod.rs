//! The generation pipeline. A run goes:
//!
//! 1. Apply environment settings
//! 2. Run every generation layer in priority order, placing modules
//! 3. Instantiate every placed module through the [Host]
//! 4. Stitch all module terrain into one master terrain
//! 5. Rebuild navigation data for each configured volume
//!
//! The whole run happens on the calling thread. Every step has yield points
//! that hand control back to the host when the frame budget runs out, and
//! check for cancellation.

mod budget;
mod host;
mod instantiate;

pub use self::{
    budget::{CancellationToken, FrameBudget, Pacer},
    host::{HeadlessHost, Host, InstanceHandle, InstanceRequest, WorldBounds},
    instantiate::{instantiate_all, world_position, ModuleInstance},
};
use crate::{
    catalog::TileCatalog,
    config::MapConfig,
    grid::{GridMap, GridPoint},
    layer::{GenerationLayer, LayerContext},
    module::ModuleId,
    rule::RuleId,
    terrain::{MasterTerrain, TerrainStitcher},
    timed,
};
use anyhow::Context;
use log::{error, info};
use nalgebra::Point3;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::Display;
use validator::Validate;

/// Failures that callers may want to tell apart. These are always wrapped in
/// an [anyhow::Error]; use `downcast_ref::<GenerationError>()` to get them
/// back out.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation was cancelled")]
    Cancelled,

    #[error(
        "terrain of module {module} at {position} does not match the map \
        terrain: {reason}"
    )]
    TerrainMismatch {
        module: ModuleId,
        position: GridPoint,
        reason: String,
    },

    #[error("unknown module {0}")]
    UnknownModule(ModuleId),

    #[error("unknown rule {0}")]
    UnknownRule(RuleId),
}

/// The three phases of a generation run, in order
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Layers,
    Instantiation,
    /// Terrain stitching and navigation rebuilds
    Finalization,
}

impl Phase {
    pub(crate) const COUNT: f32 = 3.0;

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Layers => 0,
            Self::Instantiation => 1,
            Self::Finalization => 2,
        }
    }
}

/// A progress update. `fraction` covers the whole run, not just the current
/// phase, and never decreases within a run.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub phase: Phase,
    pub fraction: f32,
}

/// The output of a successful generation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMap {
    pub config: MapConfig,
    pub grid: GridMap,
    pub terrain: MasterTerrain,
    pub instances: Vec<ModuleInstance>,
}

impl GeneratedMap {
    /// Serialize this map into JSON. Load it back with
    /// [GeneratedMap::from_json].
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("error serializing map")
    }

    /// Deserialize a map from JSON. Will fail if the input is malformed.
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("error deserializing map")
    }

    /// Serialize this map into CBOR. Load it back with
    /// [GeneratedMap::from_bin].
    #[cfg(feature = "bin")]
    pub fn to_bin(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        serde_cbor::to_writer(&mut buffer, self)
            .context("error serializing map")?;
        Ok(buffer)
    }

    /// Deserialize a map from CBOR. Will fail if the input is malformed.
    #[cfg(feature = "bin")]
    pub fn from_bin(read: impl std::io::Read) -> anyhow::Result<Self> {
        serde_cbor::from_reader(read).context("error deserializing map")
    }
}

/// Generate a map using the layers declared in the catalog. This is shorthand
/// for [MapBuilder::new] + [MapBuilder::generate].
pub fn generate(
    config: MapConfig,
    catalog: &TileCatalog,
    host: &mut dyn Host,
    cancellation: CancellationToken,
) -> anyhow::Result<GeneratedMap> {
    MapBuilder::new(config, catalog)?.generate(host, cancellation)
}

/// A container for a single generation run. The layers from the catalog are
/// loaded up front, and more can be added with [Self::add_layer] before
/// calling [Self::generate].
///
/// These fields are public to allow for disjoint borrowing of multiple fields
/// at once. Please **do not mutate the config**.
pub struct MapBuilder<'a> {
    /// This config deterministically controls generation, meaning two maps
    /// generated with the same config and catalog will always be identical.
    pub config: MapConfig,
    pub catalog: &'a TileCatalog,
    /// RNG provider. Every random choice of the run comes from here.
    pub rng: Pcg64,
    pub map: GridMap,
    /// Sorted by priority
    layers: Vec<Box<dyn GenerationLayer>>,
}

impl<'a> MapBuilder<'a> {
    /// Validate the config and set up an empty grid
    pub fn new(config: MapConfig, catalog: &'a TileCatalog) -> anyhow::Result<Self> {
        config.validate().context("invalid config")?;
        let layers = catalog.layers().iter().map(|layer| layer.build()).collect();
        info!(
            "Initialized {}x{} map with seed {}",
            config.width,
            config.height,
            config.seed.to_u64()
        );
        Ok(Self {
            rng: config.seed.rng(),
            map: GridMap::new(config.width, config.height),
            config,
            catalog,
            layers,
        })
    }

    /// Add a custom layer. It runs after every existing layer with a lower
    /// or equal priority.
    pub fn add_layer(&mut self, layer: Box<dyn GenerationLayer>) {
        if let Some(existing) = self
            .layers
            .iter()
            .find(|existing| existing.priority() == layer.priority())
        {
            error!(
                "Layers {} and {} have the same priority {}; they will run \
                in the order they were added",
                existing.id(),
                layer.id(),
                layer.priority()
            );
        }
        let index = self
            .layers
            .partition_point(|existing| existing.priority() <= layer.priority());
        self.layers.insert(index, layer);
    }

    /// Run the full pipeline. On any failure (including cancellation), the
    /// partially built map is discarded.
    pub fn generate(
        mut self,
        host: &mut dyn Host,
        cancellation: CancellationToken,
    ) -> anyhow::Result<GeneratedMap> {
        host.apply_environment(&self.config.environment);
        let mut pacer = Pacer::new(
            host,
            Duration::from_millis(self.config.frame_budget_ms.into()),
            cancellation,
        );

        timed!("Layers", self.run_layers(&mut pacer))?;
        let mut instances = timed!(
            "Instantiation",
            instantiate_all(
                &self.config,
                &self.map,
                self.catalog,
                &mut self.rng,
                &mut pacer,
            )
        )?;
        let terrain =
            timed!("Terrain stitching", self.stitch(&mut instances, &mut pacer))?;
        self.rebuild_navigation(&terrain, &mut pacer)?;
        pacer.report(Phase::Finalization, 1.0);

        info!(
            "Generated map with {} modules ({} empty cells)",
            instances.len(),
            self.map.empty_count()
        );
        Ok(GeneratedMap {
            config: self.config,
            grid: self.map,
            terrain,
            instances,
        })
    }

    fn run_layers(&mut self, pacer: &mut Pacer<'_>) -> anyhow::Result<()> {
        let total = self.layers.len();
        for (i, layer) in self.layers.iter().enumerate() {
            pacer.checkpoint()?;
            let mut context = LayerContext {
                id: layer.id(),
                map: &mut self.map,
                catalog: self.catalog,
                rng: &mut self.rng,
                pacer: &mut *pacer,
            };
            timed!(
                &format!("Layer {}", layer.id()),
                layer.generate(&mut context)
            )
            .with_context(|| format!("error in layer {}", layer.id()))?;
            pacer.report(Phase::Layers, (i + 1) as f32 / total as f32);
        }
        pacer.report(Phase::Layers, 1.0);
        Ok(())
    }

    fn stitch(
        &self,
        instances: &mut [ModuleInstance],
        pacer: &mut Pacer<'_>,
    ) -> anyhow::Result<MasterTerrain> {
        let mut stitcher = TerrainStitcher::new(&self.config, instances);
        let total = instances.len();
        for (i, instance) in instances.iter_mut().enumerate() {
            pacer.checkpoint()?;
            stitcher.stitch(instance).with_context(|| {
                format!(
                    "error stitching terrain of module {} at {}",
                    instance.module, instance.origin
                )
            })?;
            // Navigation gets the last sliver of the phase
            pacer.report(
                Phase::Finalization,
                0.9 * (i + 1) as f32 / total as f32,
            );
        }
        Ok(stitcher.finish())
    }

    fn rebuild_navigation(
        &self,
        terrain: &MasterTerrain,
        pacer: &mut Pacer<'_>,
    ) -> anyhow::Result<()> {
        let size = self.config.module_size;
        let (min_height, max_height) = terrain.height_range;
        let bounds = WorldBounds {
            min: Point3::new(0.0, min_height as f64, 0.0),
            max: Point3::new(
                self.config.width as f64 * size,
                max_height as f64,
                self.config.height as f64 * size,
            ),
        };
        for volume in &self.config.navigation_volumes {
            pacer.checkpoint()?;
            pacer
                .host()
                .rebuild_navigation(volume, bounds)
                .with_context(|| {
                    format!("error rebuilding navigation volume {}", volume.name)
                })?;
        }
        Ok(())
    }
}
