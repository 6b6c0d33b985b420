//! Placement rules decide which module goes where. A rule is a weighted list
//! of candidate modules (variants), each with its own per-direction weights,
//! plus a list of conditional actions that tweak those weights based on what's
//! already on the map.
//!
//! Evaluating a rule at a cell never modifies the rule. Instead it produces a
//! [RuleEvaluationContext], which the actions mutate and the retrieval
//! functions consume.

mod action;
mod condition;
mod context;

pub use self::{
    action::{Action, VariantScope},
    condition::{
        ChainEntry, ChainOperator, Comparison, Condition, ConditionChain,
        ConditionInput, TileSource,
    },
    context::RuleEvaluationContext,
};
use crate::{
    grid::{Footprint, GridMap, GridPoint, Rotation},
    layer::LayerId,
    module::{ModuleId, ModuleMap},
    util::{string_id, WeightedTable},
};
use log::trace;
use rand::Rng;
use serde::{Deserialize, Serialize};

string_id!(
    /// Unique key of a [PlacementRule] within a catalog
    RuleId
);

fn default_weight() -> f32 {
    100.0
}

/// A candidate module within a rule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub module: ModuleId,
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Which rotations this module can be placed in, and how likely each one
    /// is. Defaults to all four with equal weight.
    #[serde(default = "default_directions")]
    pub directions: Vec<DirectionWeight>,
}

fn default_directions() -> Vec<DirectionWeight> {
    Rotation::all()
        .map(|rotation| DirectionWeight {
            rotation,
            weight: default_weight(),
        })
        .collect()
}

impl Variant {
    /// Create a variant that can be placed in all four directions, with equal
    /// weight for each
    pub fn new(module: impl Into<ModuleId>, weight: f32) -> Self {
        Self {
            module: module.into(),
            weight,
            directions: default_directions(),
        }
    }

    /// Weight of one direction, or `None` if the variant can't be placed that
    /// way
    pub fn direction_weight(&self, rotation: Rotation) -> Option<f32> {
        self.directions
            .iter()
            .find(|direction| direction.rotation == rotation)
            .map(|direction| direction.weight)
    }

    pub(crate) fn direction_mut(
        &mut self,
        rotation: Rotation,
    ) -> Option<&mut DirectionWeight> {
        self.directions
            .iter_mut()
            .find(|direction| direction.rotation == rotation)
    }

    /// A variant is only worth considering if it has positive weight and at
    /// least one direction with positive weight
    pub fn is_selectable(&self) -> bool {
        is_positive(self.weight)
            && self.directions.iter().any(|d| is_positive(d.weight))
    }
}

fn is_positive(weight: f32) -> bool {
    weight > 0.0
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectionWeight {
    pub rotation: Rotation,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

/// A group of actions, optionally guarded by a condition chain
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSet {
    /// If `None`, the actions always run
    #[serde(default)]
    pub conditions: Option<ConditionChain>,
    pub actions: Vec<Action>,
}

/// A successful retrieval: where to put which module, and which way it faces
#[derive(Clone, Debug, PartialEq)]
pub struct Retrieval {
    /// Where the module's origin goes. For single-cell retrieval this is
    /// always the target cell. Lookahead retrieval can pick a nearby cell.
    pub origin: GridPoint,
    pub module: ModuleId,
    pub rotation: Rotation,
    /// The context the placement was chosen from
    pub context: RuleEvaluationContext,
}

/// Everything a retrieval needs to look at, besides the target cell
#[derive(Copy, Clone, Debug)]
pub struct RetrievalInput<'a> {
    pub map: &'a GridMap,
    pub modules: &'a ModuleMap,
    /// The layer doing the retrieving, if any
    pub layer: Option<&'a LayerId>,
    /// If true, retrievals may choose spots that are already occupied. The
    /// caller is then expected to use [GridMap::replace].
    pub allow_replace: bool,
}

/// A weighted list of modules that can be placed in a cell
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementRule {
    pub id: RuleId,
    /// Odds of this rule relative to other rules competing for the same cell
    #[serde(default = "default_weight")]
    pub weight: f32,
    pub variants: Vec<Variant>,
    /// Run in order during every evaluation
    #[serde(default)]
    pub action_sets: Vec<ActionSet>,
}

impl PlacementRule {
    pub fn new(id: impl Into<RuleId>, variants: Vec<Variant>) -> Self {
        Self {
            id: id.into(),
            weight: default_weight(),
            variants,
            action_sets: Vec::new(),
        }
    }

    /// Every module this rule could ever produce, including ones that only
    /// get added by actions
    pub fn referenced_modules(&self) -> impl Iterator<Item = &ModuleId> {
        let from_actions =
            self.action_sets
                .iter()
                .flat_map(|set| &set.actions)
                .filter_map(|action| match action {
                    Action::IncludeVariant { variant } => Some(&variant.module),
                    _ => None,
                });
        self.variants
            .iter()
            .map(|variant| &variant.module)
            .chain(from_actions)
    }

    /// Evaluate this rule at a cell. The rule's variants are copied into a
    /// fresh context, then every action set runs in order. Conditional sets
    /// only run when their chain passes.
    pub fn evaluate(
        &self,
        map: &GridMap,
        position: GridPoint,
        layer: Option<&LayerId>,
    ) -> RuleEvaluationContext {
        let mut context = RuleEvaluationContext {
            rule: self.id.clone(),
            position,
            variants: self.variants.clone(),
            weight: self.weight,
            included: true,
        };
        let input = ConditionInput {
            map,
            position,
            rule: &self.id,
            layer,
        };
        for action_set in &self.action_sets {
            let passed = action_set
                .conditions
                .as_ref()
                .map_or(true, |chain| chain.evaluate(&input));
            if passed {
                for action in &action_set.actions {
                    action.apply(&mut context);
                }
            }
        }
        context
    }

    /// The largest width and largest height across every module this rule can
    /// produce. The two maximums can come from different modules.
    pub fn max_footprint(&self, modules: &ModuleMap) -> Footprint {
        self.referenced_modules()
            .filter_map(|id| modules.get(id))
            .fold(Footprint::UNIT, |max, module| {
                Footprint::new(
                    max.width.max(module.footprint.width),
                    max.height.max(module.footprint.height),
                )
            })
    }

    /// Try to pick a module to place with its origin exactly at `position`.
    ///
    /// Unless replacement is allowed, every direction that doesn't fit into
    /// free space at `position` is thrown out before picking, so the result
    /// can always be placed. Returns `None` if the rule is excluded here or
    /// nothing fits. That's a normal outcome, not an error.
    pub fn try_retrieve_next(
        &self,
        rng: &mut impl Rng,
        input: &RetrievalInput<'_>,
        position: GridPoint,
    ) -> Option<Retrieval> {
        if !input.map.contains(position) {
            return None;
        }
        let mut context = self.evaluate(input.map, position, input.layer);
        if !context.is_viable() {
            trace!("Rule {} excluded at {}", self.id, position);
            return None;
        }
        context.strip_unfittable(
            input.map,
            input.modules,
            position,
            input.allow_replace,
        );
        if context.variants.is_empty() {
            trace!("Rule {} has nothing that fits at {}", self.id, position);
            return None;
        }

        let (variant, direction) = context.pick(rng)?;
        let module = context.variants[variant].module.clone();
        let rotation = context.variants[variant].directions[direction].rotation;
        Some(Retrieval {
            origin: position,
            module,
            rotation,
            context,
        })
    }

    /// Footprint-aware retrieval. Modules bigger than 1x1 often can't have
    /// their origin at the target cell itself, so this looks at a window of
    /// cells around the target and picks from every (cell, variant, direction)
    /// combination that fits, weighted by variant weight + direction weight.
    ///
    /// With `clamp = None`, the window is a square of side `2*max+1` centered
    /// on `position`, where `max` is the larger dimension of
    /// [Self::max_footprint]. With `clamp = Some(rotation)`, the window is a
    /// line of `max+1` cells starting at `position` and extending in that
    /// direction.
    ///
    /// The rule is evaluated separately at every window cell, so conditions
    /// see each candidate origin. Combinations where either the variant or
    /// the direction has zero weight are skipped.
    pub fn try_retrieve_next_ex(
        &self,
        rng: &mut impl Rng,
        input: &RetrievalInput<'_>,
        position: GridPoint,
        clamp: Option<Rotation>,
    ) -> Option<Retrieval> {
        let max = self.max_footprint(input.modules).max_dimension() as i32;
        let window: Vec<GridPoint> = match clamp {
            None => (-max..=max)
                .flat_map(|dy| {
                    (-max..=max).map(move |dx| position.offset(dx, dy))
                })
                .collect(),
            Some(rotation) => (0..=max as u32)
                .filter_map(|distance| {
                    position.step(rotation.direction(), distance)
                })
                .collect(),
        };

        let mut contexts = Vec::new();
        let mut pool = WeightedTable::new();
        for cell in window {
            if !input.map.contains(cell) {
                continue;
            }
            let mut context = self.evaluate(input.map, cell, input.layer);
            if !context.is_viable() {
                continue;
            }
            context.strip_unfittable(
                input.map,
                input.modules,
                cell,
                input.allow_replace,
            );
            let context_index = contexts.len();
            for (variant_index, variant) in context.variants.iter().enumerate()
            {
                if !is_positive(variant.weight) {
                    continue;
                }
                for (direction_index, direction) in
                    variant.directions.iter().enumerate()
                {
                    if is_positive(direction.weight) {
                        pool.push(
                            (context_index, variant_index, direction_index),
                            variant.weight + direction.weight,
                        );
                    }
                }
            }
            contexts.push(context);
        }

        let (context_index, variant, direction) = match pool.into_pick(rng) {
            Some(entry) => entry,
            None => {
                trace!(
                    "Rule {} has nothing that fits around {}",
                    self.id,
                    position
                );
                return None;
            }
        };
        let context = contexts.swap_remove(context_index);
        let module = context.variants[variant].module.clone();
        let rotation = context.variants[variant].directions[direction].rotation;
        Some(Retrieval {
            origin: context.position,
            module,
            rotation,
            context,
        })
    }
}
