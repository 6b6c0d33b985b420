use crate::{
    grid::Rotation,
    module::ModuleId,
    rule::{context::RuleEvaluationContext, DirectionWeight, Variant},
    util::sanitize_weight,
};
use serde::{Deserialize, Serialize};

/// Which variants of a context an action applies to
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantScope {
    #[default]
    All,
    Only(Vec<ModuleId>),
}

impl VariantScope {
    pub fn contains(&self, module: &ModuleId) -> bool {
        match self {
            Self::All => true,
            Self::Only(modules) => modules.contains(module),
        }
    }
}

/// A mutation of a [RuleEvaluationContext]. Actions never touch the map or
/// the rule they came from. Running the same action twice has the same effect
/// as running it once, except for the multiplicative actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Allow the rule to produce a placement
    Include,
    /// Prevent the rule from producing any placement
    Exclude,

    /// Add a variant. If the module is already a variant, its weight is
    /// raised to the context's current rule weight instead.
    IncludeVariant { variant: Variant },
    /// Remove a variant by module
    ExcludeVariant { module: ModuleId },
    SetVariantWeight {
        #[serde(default)]
        scope: VariantScope,
        weight: f32,
    },
    MultiplyVariantWeight {
        #[serde(default)]
        scope: VariantScope,
        factor: f32,
    },

    /// Add a direction to every variant in scope. Variants that already have
    /// the direction keep the larger of the two weights.
    IncludeDirection {
        #[serde(default)]
        scope: VariantScope,
        rotation: Rotation,
        weight: f32,
    },
    ExcludeDirection {
        #[serde(default)]
        scope: VariantScope,
        rotation: Rotation,
    },
    SetDirectionWeight {
        #[serde(default)]
        scope: VariantScope,
        rotation: Rotation,
        weight: f32,
    },
    MultiplyDirectionWeight {
        #[serde(default)]
        scope: VariantScope,
        rotation: Rotation,
        factor: f32,
    },

    SetRuleWeight { weight: f32 },
    MultiplyRuleWeight { factor: f32 },
}

impl Action {
    pub fn apply(&self, context: &mut RuleEvaluationContext) {
        match self {
            Self::Include => context.included = true,
            Self::Exclude => context.included = false,

            Self::IncludeVariant { variant } => {
                let rule_weight = context.weight;
                match context
                    .variants
                    .iter_mut()
                    .find(|existing| existing.module == variant.module)
                {
                    Some(existing) => {
                        existing.weight = existing.weight.max(rule_weight)
                    }
                    None => {
                        let mut variant = variant.clone();
                        variant.weight = sanitize_weight(variant.weight);
                        context.variants.push(variant);
                    }
                }
            }
            Self::ExcludeVariant { module } => {
                context.variants.retain(|variant| &variant.module != module)
            }
            Self::SetVariantWeight { scope, weight } => {
                for variant in scoped(&mut context.variants, scope) {
                    variant.weight = sanitize_weight(*weight);
                }
            }
            Self::MultiplyVariantWeight { scope, factor } => {
                for variant in scoped(&mut context.variants, scope) {
                    variant.weight = sanitize_weight(variant.weight * factor);
                }
            }

            Self::IncludeDirection {
                scope,
                rotation,
                weight,
            } => {
                let weight = sanitize_weight(*weight);
                for variant in scoped(&mut context.variants, scope) {
                    match variant.direction_mut(*rotation) {
                        Some(existing) => {
                            existing.weight = existing.weight.max(weight)
                        }
                        None => variant.directions.push(DirectionWeight {
                            rotation: *rotation,
                            weight,
                        }),
                    }
                }
            }
            Self::ExcludeDirection { scope, rotation } => {
                for variant in scoped(&mut context.variants, scope) {
                    variant.directions.retain(|d| d.rotation != *rotation);
                }
            }
            Self::SetDirectionWeight {
                scope,
                rotation,
                weight,
            } => {
                for variant in scoped(&mut context.variants, scope) {
                    if let Some(direction) = variant.direction_mut(*rotation) {
                        direction.weight = sanitize_weight(*weight);
                    }
                }
            }
            Self::MultiplyDirectionWeight {
                scope,
                rotation,
                factor,
            } => {
                for variant in scoped(&mut context.variants, scope) {
                    if let Some(direction) = variant.direction_mut(*rotation) {
                        direction.weight =
                            sanitize_weight(direction.weight * factor);
                    }
                }
            }

            Self::SetRuleWeight { weight } => {
                context.weight = sanitize_weight(*weight)
            }
            Self::MultiplyRuleWeight { factor } => {
                context.weight = sanitize_weight(context.weight * factor)
            }
        }
    }
}

fn scoped<'a>(
    variants: &'a mut [Variant],
    scope: &'a VariantScope,
) -> impl Iterator<Item = &'a mut Variant> {
    variants
        .iter_mut()
        .filter(move |variant| scope.contains(&variant.module))
}
