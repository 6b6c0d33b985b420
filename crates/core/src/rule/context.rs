use crate::{
    grid::{GridMap, GridPoint},
    module::ModuleMap,
    rule::{RuleId, Variant},
    util::WeightedTable,
};
use log::warn;
use rand::Rng;

/// The result of evaluating one [PlacementRule](super::PlacementRule) at one
/// cell. Holds its own copy of the rule's variants, so actions can modify it
/// freely without touching the rule. Contexts are cheap to throw away and
/// should never outlive a single retrieval.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleEvaluationContext {
    /// The rule that produced this context
    pub rule: RuleId,
    /// The cell the rule was evaluated at
    pub position: GridPoint,
    pub variants: Vec<Variant>,
    /// Odds of this rule relative to other rules competing for the same cell
    pub weight: f32,
    /// Excluded contexts never produce a placement
    pub included: bool,
}

impl RuleEvaluationContext {
    /// Can this context produce anything at all?
    pub fn is_viable(&self) -> bool {
        self.included && !self.variants.is_empty()
    }

    /// Remove every direction whose rotated footprint can't be placed with its
    /// origin at `origin`, then drop variants with no directions left.
    ///
    /// With `allow_replace`, occupied cells are fair game and only directions
    /// that would poke out of the grid are removed. Variants referencing a
    /// module that doesn't exist are always dropped.
    pub fn strip_unfittable(
        &mut self,
        map: &GridMap,
        modules: &ModuleMap,
        origin: GridPoint,
        allow_replace: bool,
    ) {
        let rule = &self.rule;
        self.variants.retain_mut(|variant| {
            let footprint = match modules.get(&variant.module) {
                Some(module) => module.footprint,
                None => {
                    warn!(
                        "Rule {} references unknown module {}",
                        rule, variant.module
                    );
                    return false;
                }
            };
            variant.directions.retain(|direction| {
                if allow_replace {
                    map.footprint_in_bounds(
                        origin,
                        footprint,
                        direction.rotation,
                    )
                } else {
                    map.is_footprint_free(origin, footprint, direction.rotation)
                }
            });
            !variant.directions.is_empty()
        });
    }

    /// Pick one variant by weight, then one of its directions by weight.
    /// Variants that have no selectable direction are never picked. Returns
    /// `(variant index, direction index)`.
    pub fn pick(&self, rng: &mut impl Rng) -> Option<(usize, usize)> {
        let variants: WeightedTable<usize> = self
            .variants
            .iter()
            .enumerate()
            .filter(|(_, variant)| variant.is_selectable())
            .map(|(i, variant)| (i, variant.weight))
            .collect();
        let variant_index = variants.into_pick(rng)?;

        let directions: WeightedTable<usize> = self.variants[variant_index]
            .directions
            .iter()
            .enumerate()
            .map(|(i, direction)| (i, direction.weight))
            .collect();
        let direction_index = directions.into_pick(rng)?;
        Some((variant_index, direction_index))
    }
}
