use crate::{
    generate::GenerationError,
    layer::{LayerDefinition, LayerId},
    module::{ModuleDescriptor, ModuleId, ModuleMap},
    rule::{PlacementRule, RuleId},
};
use anyhow::{bail, Context};
use fnv::{FnvBuildHasher, FnvHashSet};
use indexmap::IndexMap;
use log::error;
use serde::{Deserialize, Serialize};

pub type RuleMap = IndexMap<RuleId, PlacementRule, FnvBuildHasher>;

/// Everything a map can be built from: modules, the rules that place them,
/// and the layers that run the rules. A catalog is validated once on
/// construction, so everything it holds is known to be consistent:
/// - IDs are unique within each category
/// - Every module referenced by a rule exists
/// - Every rule referenced by a layer exists
///
/// Layers that share a priority are allowed, but logged as an error. They run
/// in declaration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CatalogDefinition", into = "CatalogDefinition")]
pub struct TileCatalog {
    modules: ModuleMap,
    rules: RuleMap,
    /// Sorted by priority (stable)
    layers: Vec<LayerDefinition>,
}

/// Serialized form of a [TileCatalog]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDefinition {
    pub modules: Vec<ModuleDescriptor>,
    pub rules: Vec<PlacementRule>,
    pub layers: Vec<LayerDefinition>,
}

impl TryFrom<CatalogDefinition> for TileCatalog {
    type Error = anyhow::Error;

    fn try_from(definition: CatalogDefinition) -> Result<Self, Self::Error> {
        Self::new(definition.modules, definition.rules, definition.layers)
    }
}

impl From<TileCatalog> for CatalogDefinition {
    fn from(catalog: TileCatalog) -> Self {
        Self {
            modules: catalog.modules.into_values().collect(),
            rules: catalog.rules.into_values().collect(),
            layers: catalog.layers,
        }
    }
}

impl TileCatalog {
    /// Build and validate a catalog
    pub fn new(
        modules: Vec<ModuleDescriptor>,
        rules: Vec<PlacementRule>,
        mut layers: Vec<LayerDefinition>,
    ) -> anyhow::Result<Self> {
        let mut module_map = ModuleMap::default();
        for module in modules {
            module
                .validate()
                .with_context(|| format!("invalid module {}", module.id))?;
            if module_map.contains_key(&module.id) {
                bail!("duplicate module ID {}", module.id);
            }
            module_map.insert(module.id.clone(), module);
        }

        let mut rule_map = RuleMap::default();
        for rule in rules {
            if let Some(missing) = rule
                .referenced_modules()
                .find(|id| !module_map.contains_key(*id))
            {
                return Err(GenerationError::UnknownModule(missing.clone()))
                    .with_context(|| format!("invalid rule {}", rule.id));
            }
            if rule_map.contains_key(&rule.id) {
                bail!("duplicate rule ID {}", rule.id);
            }
            rule_map.insert(rule.id.clone(), rule);
        }

        let mut layer_ids: FnvHashSet<&LayerId> = FnvHashSet::default();
        for layer in &layers {
            if !layer_ids.insert(&layer.id) {
                bail!("duplicate layer ID {}", layer.id);
            }
            if let Some(missing) =
                layer.rules().into_iter().find(|id| !rule_map.contains_key(*id))
            {
                return Err(GenerationError::UnknownRule(missing.clone()))
                    .with_context(|| format!("invalid layer {}", layer.id));
            }
        }
        // Stable, so ties keep declaration order
        layers.sort_by_key(|layer| layer.priority);
        for pair in layers.windows(2) {
            if pair[0].priority == pair[1].priority {
                error!(
                    "Layers {} and {} have the same priority {}; they will run \
                    in declaration order",
                    pair[0].id, pair[1].id, pair[0].priority
                );
            }
        }

        Ok(Self {
            modules: module_map,
            rules: rule_map,
            layers,
        })
    }

    pub fn modules(&self) -> &ModuleMap {
        &self.modules
    }

    pub fn module(&self, id: &ModuleId) -> Option<&ModuleDescriptor> {
        self.modules.get(id)
    }

    pub fn rules(&self) -> &RuleMap {
        &self.rules
    }

    pub fn rule(&self, id: &RuleId) -> Option<&PlacementRule> {
        self.rules.get(id)
    }

    /// Layer definitions, in the order they run
    pub fn layers(&self) -> &[LayerDefinition] {
        &self.layers
    }
}
