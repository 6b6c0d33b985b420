use crate::{
    grid::{Cell, Direction, GridMap, GridPoint, Rotation},
    layer::LayerId,
    module::ModuleId,
    rule::RuleId,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Anything that can claim a placed module as its own. Conditions use these
/// to ask "is there one of *those* nearby?", where *those* can be a specific
/// module, anything placed by a rule, or anything placed by a layer.
///
/// [Self::SameRule] and [Self::SameLayer] stand in for whichever rule/layer
/// is doing the evaluation, so one condition can be shared between rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileSource {
    Module(ModuleId),
    Rule(RuleId),
    Layer(LayerId),
    SameRule,
    SameLayer,
}

impl TileSource {
    /// Does the module covering this cell belong to this source? Always false
    /// for empty cells, and for the relative sources until they've been
    /// resolved (see [Self::resolve]).
    pub fn owns(&self, cell: &Cell) -> bool {
        match self {
            Self::Module(module) => cell.module() == Some(module),
            Self::Rule(rule) => {
                cell.module().is_some() && cell.rule() == Some(rule)
            }
            Self::Layer(layer) => {
                cell.module().is_some() && cell.layer() == Some(layer)
            }
            Self::SameRule | Self::SameLayer => false,
        }
    }

    fn is_relative(&self) -> bool {
        matches!(self, Self::SameRule | Self::SameLayer)
    }

    /// Replace relative sources with the concrete rule/layer from `input`.
    /// [Self::SameLayer] is dropped when no layer is running.
    pub fn resolve<'s>(
        sources: &'s [TileSource],
        input: &ConditionInput<'_>,
    ) -> Cow<'s, [TileSource]> {
        if !sources.iter().any(Self::is_relative) {
            return Cow::Borrowed(sources);
        }
        sources
            .iter()
            .filter_map(|source| match source {
                Self::SameRule => Some(Self::Rule(input.rule.clone())),
                Self::SameLayer => input.layer.cloned().map(Self::Layer),
                other => Some(other.clone()),
            })
            .collect::<Vec<_>>()
            .into()
    }
}

/// How a distance condition compares the nearest match against its threshold
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Nearest match is at most `distance` away
    #[default]
    Within,
    /// Nearest match is more than `distance` away, or there is none at all
    Beyond,
}

impl Comparison {
    fn check(self, nearest: Option<u32>, distance: u32) -> bool {
        match (self, nearest) {
            (Self::Within, Some(nearest)) => nearest <= distance,
            (Self::Within, None) => false,
            (Self::Beyond, Some(nearest)) => nearest > distance,
            (Self::Beyond, None) => true,
        }
    }
}

/// Everything a condition is allowed to look at. Conditions are read-only.
#[derive(Copy, Clone, Debug)]
pub struct ConditionInput<'a> {
    pub map: &'a GridMap,
    /// The cell the rule is being evaluated at
    pub position: GridPoint,
    /// The rule being evaluated
    pub rule: &'a RuleId,
    /// The layer running the evaluation, if any
    pub layer: Option<&'a LayerId>,
}

/// A single yes/no question about the map around the cell being evaluated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// A module from any of `sources` lies within `max_distance` steps in any
    /// of the allowed directions. See [GridMap::check_for_tiles].
    TileWithin {
        sources: Vec<TileSource>,
        max_distance: u32,
        #[serde(default)]
        directions: Option<Vec<Direction>>,
        #[serde(default)]
        rotations: Option<Vec<Rotation>>,
        #[serde(default)]
        snap_to_parent: bool,
    },

    /// The cell exactly `distance` steps away in `direction` holds a module
    /// from any of `sources`
    TileAt {
        sources: Vec<TileSource>,
        direction: Direction,
        #[serde(default = "default_distance")]
        distance: u32,
        #[serde(default)]
        rotations: Option<Vec<Rotation>>,
        #[serde(default)]
        snap_to_parent: bool,
    },

    /// Compare the distance to the nearest module placed by `rule`
    RuleDistance {
        rule: RuleId,
        distance: u32,
        #[serde(default)]
        comparison: Comparison,
    },

    /// Compare the distance to the nearest module placed by `layer`
    LayerDistance {
        layer: LayerId,
        distance: u32,
        #[serde(default)]
        comparison: Comparison,
    },

    /// The evaluated cell lies in the rectangle `[min, max]` (inclusive)
    Position { min: GridPoint, max: GridPoint },
}

fn default_distance() -> u32 {
    1
}

impl Condition {
    pub fn evaluate(&self, input: &ConditionInput<'_>) -> bool {
        let map = input.map;
        match self {
            Self::TileWithin {
                sources,
                max_distance,
                directions,
                rotations,
                snap_to_parent,
            } => map.check_for_tiles(
                input.position,
                &TileSource::resolve(sources, input),
                directions.as_deref(),
                rotations.as_deref(),
                *max_distance,
                *snap_to_parent,
            ),
            Self::TileAt {
                sources,
                direction,
                distance,
                rotations,
                snap_to_parent,
            } => match map.neighbor8(
                input.position,
                *direction,
                *distance,
                *snap_to_parent,
            ) {
                Some(cell) => {
                    rotations
                        .as_ref()
                        .map_or(true, |r| r.contains(&cell.rotation()))
                        && TileSource::resolve(sources, input)
                            .iter()
                            .any(|source| source.owns(cell))
                }
                None => false,
            },
            Self::RuleDistance {
                rule,
                distance,
                comparison,
            } => {
                let nearest =
                    nearest_distance(input.position, map.find_by_rule(rule));
                comparison.check(nearest, *distance)
            }
            Self::LayerDistance {
                layer,
                distance,
                comparison,
            } => {
                let nearest =
                    nearest_distance(input.position, map.find_by_layer(layer));
                comparison.check(nearest, *distance)
            }
            Self::Position { min, max } => {
                let pos = input.position;
                (min.x..=max.x).contains(&pos.x)
                    && (min.y..=max.y).contains(&pos.y)
            }
        }
    }
}

fn nearest_distance(from: GridPoint, cells: Vec<&Cell>) -> Option<u32> {
    cells
        .into_iter()
        .map(|cell| from.distance_to(cell.position()))
        .min()
}

/// How the entries of a [ConditionChain] are combined
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainOperator {
    /// Every entry must pass. Stops at the first failure.
    #[default]
    And,
    /// At least one entry must pass. Stops at the first success.
    Or,
}

/// One link in a condition chain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainEntry {
    #[serde(flatten)]
    pub condition: Condition,
    /// Flip the result of the condition
    #[serde(default)]
    pub negate: bool,
}

impl From<Condition> for ChainEntry {
    fn from(condition: Condition) -> Self {
        Self {
            condition,
            negate: false,
        }
    }
}

/// A list of conditions combined with a single operator, evaluated left to
/// right with short-circuiting
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionChain {
    #[serde(default)]
    pub operator: ChainOperator,
    pub conditions: Vec<ChainEntry>,
}

impl ConditionChain {
    pub fn new(operator: ChainOperator, conditions: Vec<ChainEntry>) -> Self {
        Self {
            operator,
            conditions,
        }
    }

    /// Evaluate the chain. An empty chain always passes.
    pub fn evaluate(&self, input: &ConditionInput<'_>) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        let mut results = self
            .conditions
            .iter()
            .map(|entry| entry.condition.evaluate(input) != entry.negate);
        match self.operator {
            ChainOperator::And => results.all(|passed| passed),
            ChainOperator::Or => results.any(|passed| passed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grid::Footprint, module::ModuleDescriptor};

    fn input<'a>(
        map: &'a GridMap,
        rule: &'a RuleId,
        position: GridPoint,
    ) -> ConditionInput<'a> {
        ConditionInput {
            map,
            position,
            rule,
            layer: None,
        }
    }

    fn test_map() -> GridMap {
        let mut map = GridMap::new(5, 5);
        let wall = ModuleDescriptor::new("wall", Footprint::new(1, 1));
        map.place(
            GridPoint::new(2, 2),
            Rotation::East,
            &wall,
            Some(&RuleId::from("walls")),
            Some(&LayerId::from("structure")),
        );
        map
    }

    #[test]
    fn test_tile_at() {
        let map = test_map();
        let rule = RuleId::from("floor");
        let condition = Condition::TileAt {
            sources: vec![TileSource::Module("wall".into())],
            direction: Direction::East,
            distance: 1,
            rotations: None,
            snap_to_parent: false,
        };
        assert!(condition.evaluate(&input(&map, &rule, GridPoint::new(1, 2))));
        assert!(!condition.evaluate(&input(&map, &rule, GridPoint::new(0, 2))));
        // Off the edge of the map
        assert!(!condition.evaluate(&input(&map, &rule, GridPoint::new(4, 2))));
    }

    #[test]
    fn test_tile_conditions_past_edge() {
        let map = test_map();
        let rule = RuleId::from("floor");
        let walls = vec![TileSource::Module("wall".into())];
        // The wall is west of (4, 2), nothing is east of it
        let east = |distance| Condition::TileAt {
            sources: walls.clone(),
            direction: Direction::East,
            distance,
            rotations: None,
            snap_to_parent: false,
        };
        let pos = input(&map, &rule, GridPoint::new(4, 2));
        for distance in [5, i32::MAX as u32, u32::MAX - 1, u32::MAX] {
            assert!(!east(distance).evaluate(&pos), "{distance}");
        }

        let within = |directions| Condition::TileWithin {
            sources: walls.clone(),
            max_distance: u32::MAX,
            directions,
            rotations: None,
            snap_to_parent: false,
        };
        assert!(within(None).evaluate(&pos));
        assert!(!within(Some(vec![Direction::East])).evaluate(&pos));
    }

    #[test]
    fn test_relative_sources() {
        let map = test_map();
        let beside_wall = GridPoint::new(1, 2);
        let same_rule = Condition::TileAt {
            sources: vec![TileSource::SameRule],
            direction: Direction::East,
            distance: 1,
            rotations: None,
            snap_to_parent: false,
        };
        let walls = RuleId::from("walls");
        let floor = RuleId::from("floor");
        assert!(same_rule.evaluate(&input(&map, &walls, beside_wall)));
        assert!(!same_rule.evaluate(&input(&map, &floor, beside_wall)));

        let same_layer = Condition::TileWithin {
            sources: vec![TileSource::SameLayer],
            max_distance: 3,
            directions: None,
            rotations: None,
            snap_to_parent: false,
        };
        let structure = LayerId::from("structure");
        let in_layer = ConditionInput {
            layer: Some(&structure),
            ..input(&map, &floor, beside_wall)
        };
        assert!(same_layer.evaluate(&in_layer));
        // Outside of any layer there's nothing to be the same as
        assert!(!same_layer.evaluate(&input(&map, &floor, beside_wall)));

        let sources = [TileSource::SameLayer, TileSource::SameRule];
        let resolved = TileSource::resolve(&sources, &in_layer);
        assert_eq!(resolved.as_ref(), &[
            TileSource::Layer(structure.clone()),
            TileSource::Rule(floor.clone()),
        ]);
        assert!(matches!(
            TileSource::resolve(&[TileSource::Rule(floor.clone())], &in_layer),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_distance_conditions() {
        let map = test_map();
        let rule = RuleId::from("floor");
        let near = Condition::RuleDistance {
            rule: "walls".into(),
            distance: 1,
            comparison: Comparison::Within,
        };
        let far = Condition::LayerDistance {
            layer: "structure".into(),
            distance: 1,
            comparison: Comparison::Beyond,
        };
        let at = |x, y| input(&map, &rule, GridPoint::new(x, y));
        assert!(near.evaluate(&at(3, 3)));
        assert!(!near.evaluate(&at(4, 4)));
        assert!(!far.evaluate(&at(3, 1)));
        assert!(far.evaluate(&at(0, 0)));

        // Nothing from this rule anywhere -> never within, always beyond
        let missing = Condition::RuleDistance {
            rule: "ghosts".into(),
            distance: 100,
            comparison: Comparison::Within,
        };
        assert!(!missing.evaluate(&at(2, 2)));
    }

    #[test]
    fn test_chain_short_circuit_and_negate() {
        let map = test_map();
        let rule = RuleId::from("floor");
        let edge = Condition::Position {
            min: GridPoint::new(0, 0),
            max: GridPoint::new(0, 4),
        };
        let near_wall = Condition::TileWithin {
            sources: vec![TileSource::Rule("walls".into())],
            max_distance: 2,
            directions: None,
            rotations: Some(vec![Rotation::East]),
            snap_to_parent: false,
        };

        let and = ConditionChain::new(ChainOperator::And, vec![
            edge.clone().into(),
            near_wall.clone().into(),
        ]);
        let or = ConditionChain::new(ChainOperator::Or, vec![
            edge.clone().into(),
            near_wall.clone().into(),
        ]);
        let not_edge = ConditionChain::new(ChainOperator::And, vec![
            ChainEntry {
                condition: edge,
                negate: true,
            },
        ]);

        // (0,2) is on the edge and 2 away from the wall
        let pos = input(&map, &rule, GridPoint::new(0, 2));
        assert!(and.evaluate(&pos));
        assert!(or.evaluate(&pos));
        assert!(!not_edge.evaluate(&pos));

        // (4,3) is neither
        let pos = input(&map, &rule, GridPoint::new(4, 3));
        assert!(!and.evaluate(&pos));
        assert!(!or.evaluate(&pos));
        assert!(not_edge.evaluate(&pos));

        assert!(ConditionChain::default().evaluate(&pos));
    }

    #[test]
    fn test_deserialize_chain() {
        let chain: ConditionChain = serde_json::from_str(
            r#"{
                "operator": "or",
                "conditions": [
                    {"type": "tile_within", "sources": [{"module": "wall"}],
                     "max_distance": 1, "negate": true},
                    {"type": "position", "min": {"x": 0, "y": 0},
                     "max": {"x": 1, "y": 1}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(chain.operator, ChainOperator::Or);
        assert!(chain.conditions[0].negate);
        assert!(!chain.conditions[1].negate);
    }
}
