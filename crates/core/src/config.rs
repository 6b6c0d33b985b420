mod seed;

pub use self::seed::Seed;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Cap on the number of samples in any one master terrain array, i.e. on
/// `width * height * resolution^2` for each of the three resolutions
pub const MAX_TERRAIN_SAMPLES: u64 = 1 << 28;

/// Configuration that defines a map generation run. Two maps generated with the
/// same config and the same [TileCatalog](crate::TileCatalog) will always be
/// identical.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_terrain_size"))]
pub struct MapConfig {
    /// RNG seed to use for all randomized processes during generation. See
    /// [Seed] for the accepted formats.
    pub seed: Seed,

    /// Width of the grid, in cells
    #[validate(range(min = 1, max = 4096))]
    pub width: u16,

    /// Height of the grid, in cells
    #[validate(range(min = 1, max = 4096))]
    pub height: u16,

    /// Edge length of a single grid cell, in world units. A module with a 2x1
    /// footprint covers `2 * module_size` by `module_size` world units.
    #[validate(range(min = 0.001))]
    pub module_size: f64,

    /// Number of heightmap samples along one edge of a single cell. Every
    /// module's terrain patch must use exactly this resolution.
    #[validate(range(min = 1, max = 4096))]
    pub heightmap_resolution: u32,

    /// Number of splatmap (alpha) samples along one edge of a single cell
    #[validate(range(min = 1, max = 4096))]
    pub alphamap_resolution: u32,

    /// Number of detail-layer samples along one edge of a single cell
    #[validate(range(min = 1, max = 4096))]
    pub detail_resolution: u32,

    /// How long (in milliseconds) generation may run before it yields control
    /// back to the host's frame loop. The budget is rolling, i.e. the clock
    /// resets every time we yield.
    #[validate(range(min = 1))]
    pub frame_budget_ms: u32,

    /// How array transforms during terrain stitching are executed. This has
    /// no effect on the output, only on speed.
    pub execution: ExecutionStrategy,

    /// Ambient settings that the host applies before generation starts
    #[validate]
    pub environment: EnvironmentConfig,

    /// Navigation volumes to rebuild once the terrain is finalized. Each one
    /// is rebuilt exactly once per run.
    pub navigation_volumes: Vec<NavigationVolume>,
}

impl MapConfig {
    /// Total number of cells in the grid
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Samples in the largest master terrain array this config can produce
    pub fn max_terrain_samples(&self) -> u64 {
        let resolution = self
            .heightmap_resolution
            .max(self.alphamap_resolution)
            .max(self.detail_resolution) as u64;
        self.cell_count() as u64 * resolution * resolution
    }
}

fn validate_terrain_size(config: &MapConfig) -> Result<(), ValidationError> {
    if config.max_terrain_samples() > MAX_TERRAIN_SAMPLES {
        let mut error = ValidationError::new("terrain_too_large");
        error.add_param("samples".into(), &config.max_terrain_samples());
        error.add_param("max".into(), &MAX_TERRAIN_SAMPLES);
        return Err(error);
    }
    Ok(())
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            // Danger! This means the default will vary between calls!
            seed: Seed::random(),
            width: 16,
            height: 16,
            module_size: 32.0,
            heightmap_resolution: 16,
            alphamap_resolution: 16,
            detail_resolution: 16,
            frame_budget_ms: 16,
            execution: ExecutionStrategy::default(),
            environment: EnvironmentConfig::default(),
            navigation_volumes: vec![NavigationVolume::default()],
        }
    }
}

/// Strategy for running the embarrassingly-parallel array transforms used
/// while stitching terrain.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Spread work across rayon's global thread pool
    #[default]
    Parallel,
    /// Run everything on the calling thread
    Sequential,
}

/// Scene-wide settings the host should apply before any modules are
/// instantiated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Ambient light intensity, where 0 is pitch black
    #[validate(range(min = 0.0, max = 1.0))]
    pub ambient_intensity: f32,

    /// Exponential fog density. 0 disables fog.
    #[validate(range(min = 0.0, max = 1.0))]
    pub fog_density: f32,

    /// Name of the skybox to use, if any. Interpretation is up to the host.
    pub skybox: Option<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            ambient_intensity: 0.6,
            fog_density: 0.0,
            skybox: None,
        }
    }
}

/// A region of navigation data that needs to be rebuilt after the terrain is
/// finalized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationVolume {
    pub name: String,
    /// Radius of the agent this volume is baked for, in world units
    pub agent_radius: f64,
}

impl Default for NavigationVolume {
    fn default() -> Self {
        Self {
            name: "default".into(),
            agent_radius: 0.5,
        }
    }
}
