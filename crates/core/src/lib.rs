//! Quilt is a grid-based map generator. Maps are stitched together from
//! reusable tile modules, chosen cell by cell through weighted placement rules
//! that react to what's already been placed around them. Each module can carry
//! its own chunk of terrain, and once every module is placed, all of those
//! chunks get merged into one continuous terrain.
//!
//! ```
//! use quilt::{generate, CancellationToken, HeadlessHost, MapConfig, TileCatalog};
//!
//! let catalog: TileCatalog = serde_json::from_str(r#"{
//!     "modules": [{"id": "grass"}],
//!     "rules": [{"id": "meadow", "variants": [{"module": "grass"}]}],
//!     "layers": [{"id": "base", "type": "fill", "rules": ["meadow"]}]
//! }"#).unwrap();
//! let config = MapConfig {
//!     width: 8,
//!     height: 8,
//!     ..Default::default()
//! };
//! let mut host = HeadlessHost::new();
//! let map = generate(config, &catalog, &mut host, CancellationToken::new())
//!     .unwrap();
//! assert_eq!(map.instances.len(), 64);
//! ```
//!
//! The generator never talks to a renderer directly. Everything it needs from
//! the outside world goes through the [Host] trait. See [MapConfig] for the
//! knobs of a single run, and [TileCatalog] for how modules, rules, and layers
//! are declared.

mod catalog;
mod config;
mod generate;
mod grid;
mod layer;
mod module;
mod rule;
mod terrain;
mod util;

pub use crate::{
    catalog::{CatalogDefinition, RuleMap, TileCatalog},
    config::{
        EnvironmentConfig, ExecutionStrategy, MapConfig, NavigationVolume, Seed,
        MAX_TERRAIN_SAMPLES,
    },
    generate::{
        generate, instantiate_all, world_position, CancellationToken,
        FrameBudget, GeneratedMap, GenerationError, HeadlessHost, Host,
        InstanceHandle, InstanceRequest, MapBuilder, ModuleInstance, Pacer,
        Phase, Progress, WorldBounds,
    },
    grid::{
        ray, Cell, Direction, Footprint, GridMap, GridPoint, GridPointSet,
        Rotation,
    },
    layer::{
        FillLayer, GenerationLayer, LayerContext, LayerDefinition, LayerId,
        LayerKind, ScatterLayer,
    },
    module::{
        CosmeticChoice, CosmeticGroup, CosmeticOption, ModuleDescriptor,
        ModuleId, ModuleMap, TerrainRegion,
    },
    rule::{
        Action, ActionSet, ChainEntry, ChainOperator, Comparison, Condition,
        ConditionChain, ConditionInput, DirectionWeight, PlacementRule,
        Retrieval, RetrievalInput, RuleEvaluationContext, RuleId, TileSource,
        Variant, VariantScope,
    },
    terrain::{
        rotate::{rotate_array, rotate_normalized},
        Array2, CollisionTile, MasterTerrain, TerrainLayout, TerrainPatch,
        TerrainStitcher, TreeInstance,
    },
    util::{sanitize_weight, WeightedTable},
};
