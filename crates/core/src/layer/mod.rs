//! Generation layers are ordered passes over the grid. Each layer applies one
//! category of placement logic (e.g. "fill everything with floor", "scatter
//! some props"), using the rule retrieval API to decide what goes where.
//!
//! Layers run in ascending priority order. The crate ships [FillLayer] and
//! [ScatterLayer], which can be declared in a catalog via [LayerDefinition].
//! Anything else can implement [GenerationLayer] directly.

use crate::{
    catalog::TileCatalog,
    generate::{GenerationError, Pacer},
    grid::{Footprint, GridMap, GridPoint, GridPointSet},
    module::{ModuleDescriptor, ModuleId},
    rule::{PlacementRule, Retrieval, RetrievalInput, RuleId},
    util::{string_id, WeightedTable},
};
use log::{debug, trace};
use rand::Rng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

string_id!(
    /// Unique key of a generation layer
    LayerId
);

/// Everything a layer gets to work with. The fields are public to allow for
/// disjoint borrowing, e.g. reading the map while drawing from the RNG.
pub struct LayerContext<'a, 'h> {
    /// ID of the layer being run. Every module placed through
    /// [Self::place] is tagged with this.
    pub id: &'a LayerId,
    pub map: &'a mut GridMap,
    pub catalog: &'a TileCatalog,
    pub rng: &'a mut Pcg64,
    pub pacer: &'a mut Pacer<'h>,
}

impl<'a, 'h> LayerContext<'a, 'h> {
    /// Get a rule from the catalog, or fail if it doesn't exist
    pub fn rule(&self, id: &RuleId) -> anyhow::Result<&'a PlacementRule> {
        self.catalog
            .rule(id)
            .ok_or_else(|| GenerationError::UnknownRule(id.clone()).into())
    }

    /// A yield point. Layers should call this at least once per cell they
    /// visit.
    pub fn checkpoint(&mut self) -> anyhow::Result<()> {
        self.pacer.checkpoint()
    }

    fn module(&self, id: &ModuleId) -> anyhow::Result<&'a ModuleDescriptor> {
        self.catalog
            .module(id)
            .ok_or_else(|| GenerationError::UnknownModule(id.clone()).into())
    }

    /// Footprint of the module a retrieval picked
    pub fn footprint(&self, retrieval: &Retrieval) -> anyhow::Result<Footprint> {
        Ok(self.module(&retrieval.module)?.footprint)
    }

    /// Put a retrieved module onto the map, tagged with the retrieving rule
    /// and this layer. With `allow_replace`, whatever is in the way gets
    /// cleared out first. Returns whether anything was placed.
    pub fn place(
        &mut self,
        retrieval: &Retrieval,
        allow_replace: bool,
    ) -> anyhow::Result<bool> {
        let module = self.module(&retrieval.module)?;
        let rule = Some(&retrieval.context.rule);
        let placed = if allow_replace {
            self.map.replace(
                retrieval.origin,
                retrieval.rotation,
                module,
                rule,
                Some(self.id),
            )
        } else {
            self.map.place(
                retrieval.origin,
                retrieval.rotation,
                module,
                rule,
                Some(self.id),
            )
        };
        if placed {
            trace!(
                "Layer {} placed {} at {} facing {:?}",
                self.id,
                retrieval.module,
                retrieval.origin,
                retrieval.rotation
            );
        }
        Ok(placed)
    }
}

/// One ordered pass of map generation. Implementations can mutate cells
/// through [LayerContext], but should stick to [GridMap::place] and
/// [GridMap::replace] to keep footprints consistent.
pub trait GenerationLayer: Debug {
    fn id(&self) -> &LayerId;

    /// Lower priorities run first
    fn priority(&self) -> i32;

    /// Run the layer. Errors abort the entire generation run, so they should
    /// be reserved for cancellation and broken invariants. Failing to find a
    /// module for a cell is not an error.
    fn generate(&self, context: &mut LayerContext<'_, '_>) -> anyhow::Result<()>;
}

/// Serializable declaration of one of the built-in layers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub id: LayerId,
    #[serde(default)]
    pub priority: i32,
    #[serde(flatten)]
    pub kind: LayerKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    Fill {
        rules: Vec<RuleId>,
        #[serde(default)]
        allow_replace: bool,
    },
    Scatter {
        rule: RuleId,
        count: u32,
        #[serde(default = "default_max_attempts")]
        max_attempts: u32,
        #[serde(default)]
        allow_replace: bool,
    },
}

fn default_max_attempts() -> u32 {
    100
}

impl LayerDefinition {
    /// Every rule this layer will ask for
    pub fn rules(&self) -> Vec<&RuleId> {
        match &self.kind {
            LayerKind::Fill { rules, .. } => rules.iter().collect(),
            LayerKind::Scatter { rule, .. } => vec![rule],
        }
    }

    pub fn build(&self) -> Box<dyn GenerationLayer> {
        match &self.kind {
            LayerKind::Fill {
                rules,
                allow_replace,
            } => Box::new(FillLayer {
                id: self.id.clone(),
                priority: self.priority,
                rules: rules.clone(),
                allow_replace: *allow_replace,
            }),
            LayerKind::Scatter {
                rule,
                count,
                max_attempts,
                allow_replace,
            } => Box::new(ScatterLayer {
                id: self.id.clone(),
                priority: self.priority,
                rule: rule.clone(),
                count: *count,
                max_attempts: *max_attempts,
                allow_replace: *allow_replace,
            }),
        }
    }
}

/// Visits every cell in row-major order and tries to fill the empty ones.
/// With `allow_replace`, occupied cells are filled too, except for the ones
/// this layer already filled during the same pass.
///
/// At each cell, every rule gets a chance to produce a module with its
/// origin right at the cell. If none can, the rules get a second chance with
/// lookahead retrieval, which may put a large module's origin somewhere
/// nearby. Among the rules that succeed, one is picked by its evaluated rule
/// weight.
#[derive(Clone, Debug)]
pub struct FillLayer {
    pub id: LayerId,
    pub priority: i32,
    pub rules: Vec<RuleId>,
    pub allow_replace: bool,
}

impl FillLayer {
    fn retrieve(
        &self,
        context: &mut LayerContext<'_, '_>,
        position: GridPoint,
        lookahead: bool,
    ) -> anyhow::Result<Option<Retrieval>> {
        let input = RetrievalInput {
            map: context.map,
            modules: context.catalog.modules(),
            layer: Some(context.id),
            allow_replace: self.allow_replace,
        };
        let mut candidates = WeightedTable::with_capacity(self.rules.len());
        for id in &self.rules {
            let rule = context.rule(id)?;
            let retrieval = if lookahead {
                rule.try_retrieve_next_ex(context.rng, &input, position, None)
            } else {
                rule.try_retrieve_next(context.rng, &input, position)
            };
            if let Some(retrieval) = retrieval {
                let weight = retrieval.context.weight;
                candidates.push(retrieval, weight);
            }
        }
        Ok(candidates.into_pick(context.rng))
    }
}

impl GenerationLayer for FillLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn generate(&self, context: &mut LayerContext<'_, '_>) -> anyhow::Result<()> {
        let (width, height) = (context.map.width(), context.map.height());
        let mut placed = 0;
        // Every cell covered by something this pass placed
        let mut produced = GridPointSet::default();
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                context.checkpoint()?;
                let position = GridPoint::new(x, y);
                let empty = context
                    .map
                    .get(position)
                    .map_or(false, |cell| cell.is_empty());
                let occupied = !empty && !self.allow_replace;
                if occupied || produced.contains(&position) {
                    continue;
                }

                let retrieval = match self.retrieve(context, position, false)? {
                    Some(retrieval) => retrieval,
                    None => match self.retrieve(context, position, true)? {
                        Some(retrieval) => retrieval,
                        None => {
                            trace!("Nothing to fill {} with", position);
                            continue;
                        }
                    },
                };
                let footprint = context.footprint(&retrieval)?;
                let cells: Vec<GridPoint> = footprint
                    .cells(retrieval.origin, retrieval.rotation)
                    .collect();
                if cells.iter().any(|cell| produced.contains(cell)) {
                    trace!(
                        "Not replacing this pass's own work at {}",
                        retrieval.origin
                    );
                    continue;
                }
                if context.place(&retrieval, self.allow_replace)? {
                    produced.extend(cells);
                    placed += 1;
                }
            }
        }
        debug!("Layer {} placed {} modules", self.id, placed);
        Ok(())
    }
}

/// Places up to `count` modules from a single rule at random cells. Gives up
/// after `max_attempts` cells have been tried.
#[derive(Clone, Debug)]
pub struct ScatterLayer {
    pub id: LayerId,
    pub priority: i32,
    pub rule: RuleId,
    pub count: u32,
    pub max_attempts: u32,
    pub allow_replace: bool,
}

impl GenerationLayer for ScatterLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn generate(&self, context: &mut LayerContext<'_, '_>) -> anyhow::Result<()> {
        let rule = context.rule(&self.rule)?;
        let (width, height) = (context.map.width(), context.map.height());
        let mut placed = 0;
        for _ in 0..self.max_attempts {
            if placed >= self.count {
                break;
            }
            context.checkpoint()?;
            let position = GridPoint::new(
                context.rng.gen_range(0..width as i32),
                context.rng.gen_range(0..height as i32),
            );
            let input = RetrievalInput {
                map: context.map,
                modules: context.catalog.modules(),
                layer: Some(context.id),
                allow_replace: self.allow_replace,
            };
            if let Some(retrieval) =
                rule.try_retrieve_next_ex(context.rng, &input, position, None)
            {
                if context.place(&retrieval, self.allow_replace)? {
                    placed += 1;
                }
            }
        }
        debug!(
            "Layer {} scattered {}/{} modules",
            self.id, placed, self.count
        );
        Ok(())
    }
}
