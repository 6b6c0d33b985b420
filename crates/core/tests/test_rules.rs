use quilt::{
    Action, ActionSet, ChainOperator, Condition, ConditionChain, Footprint,
    GridMap, GridPoint, ModuleDescriptor, ModuleMap, PlacementRule,
    RetrievalInput, Rotation, RuleId, TileSource, Variant,
};
use rand::SeedableRng;
use rand_pcg::Pcg64;

fn modules(list: &[(&str, u16, u16)]) -> ModuleMap {
    list.iter()
        .map(|(id, width, height)| {
            let module =
                ModuleDescriptor::new(*id, Footprint::new(*width, *height));
            (module.id.clone(), module)
        })
        .collect()
}

fn input<'a>(map: &'a GridMap, modules: &'a ModuleMap) -> RetrievalInput<'a> {
    RetrievalInput {
        map,
        modules,
        layer: None,
        allow_replace: false,
    }
}

/// A single 1x1 variant with no actions is retrievable everywhere
#[test]
fn test_single_variant_everywhere() {
    let modules = modules(&[("tile", 1, 1)]);
    let map = GridMap::new(3, 3);
    let rule = PlacementRule::new("tiles", vec![Variant::new("tile", 100.0)]);
    let mut rng = Pcg64::seed_from_u64(42);

    for y in 0..3 {
        for x in 0..3 {
            let position = GridPoint::new(x, y);
            let retrieval = rule
                .try_retrieve_next(&mut rng, &input(&map, &modules), position)
                .unwrap_or_else(|| panic!("no retrieval at {}", position));
            assert_eq!(retrieval.module.as_str(), "tile");
            assert_eq!(retrieval.origin, position);
            assert!(Rotation::all().any(|r| r == retrieval.rotation));
        }
    }
}

/// Every direction should show up eventually, since they're equally weighted
#[test]
fn test_directions_all_reachable() {
    let modules = modules(&[("tile", 1, 1)]);
    let map = GridMap::new(1, 1);
    let rule = PlacementRule::new("tiles", vec![Variant::new("tile", 100.0)]);
    let mut rng = Pcg64::seed_from_u64(7);
    let mut seen = Vec::new();
    for _ in 0..200 {
        let retrieval = rule
            .try_retrieve_next(&mut rng, &input(&map, &modules), GridPoint::ORIGIN)
            .unwrap();
        if !seen.contains(&retrieval.rotation) {
            seen.push(retrieval.rotation);
        }
    }
    assert_eq!(seen.len(), 4);
}

/// A condition-guarded ExcludeVariant only kicks in once a qualifying
/// neighbor exists
#[test]
fn test_conditional_exclude_variant() {
    let modules = modules(&[("pillar", 1, 1), ("statue", 1, 1)]);
    let mut map = GridMap::new(3, 1);
    let mut rule = PlacementRule::new("decor", vec![
        Variant::new("pillar", 1.0),
        // Statues win whenever they're allowed
        Variant::new("statue", f32::INFINITY),
    ]);
    rule.action_sets.push(ActionSet {
        conditions: Some(ConditionChain::new(ChainOperator::And, vec![
            Condition::TileWithin {
                sources: vec![TileSource::Module("statue".into())],
                max_distance: 1,
                directions: None,
                rotations: None,
                snap_to_parent: false,
            }
            .into(),
        ])),
        actions: vec![Action::ExcludeVariant {
            module: "statue".into(),
        }],
    });
    let mut rng = Pcg64::seed_from_u64(1);

    // No statue anywhere, so statues are picked
    let retrieval = rule
        .try_retrieve_next(&mut rng, &input(&map, &modules), GridPoint::ORIGIN)
        .unwrap();
    assert_eq!(retrieval.module.as_str(), "statue");
    map.place(
        retrieval.origin,
        retrieval.rotation,
        &modules[&retrieval.module],
        Some(&rule.id),
        None,
    );

    // Right next to the statue, only pillars are left
    let next = GridPoint::new(1, 0);
    let context = rule.evaluate(&map, next, None);
    assert_eq!(context.variants.len(), 1);
    for _ in 0..20 {
        let retrieval = rule
            .try_retrieve_next(&mut rng, &input(&map, &modules), next)
            .unwrap();
        assert_eq!(retrieval.module.as_str(), "pillar");
    }

    // Two cells away, statues are back on the table
    let far = GridPoint::new(2, 0);
    let retrieval = rule
        .try_retrieve_next(&mut rng, &input(&map, &modules), far)
        .unwrap();
    assert_eq!(retrieval.module.as_str(), "statue");
}

/// Evaluating a rule never modifies it, no matter what the actions do
#[test]
fn test_evaluation_does_not_mutate_rule() {
    let mut rule = PlacementRule::new("rule", vec![
        Variant::new("a", 10.0),
        Variant::new("b", 10.0),
    ]);
    rule.action_sets = vec![
        ActionSet {
            conditions: Some(ConditionChain::new(ChainOperator::And, vec![
                Condition::Position {
                    min: GridPoint::new(0, 0),
                    max: GridPoint::new(0, 0),
                }
                .into(),
            ])),
            actions: vec![
                Action::ExcludeVariant { module: "a".into() },
                Action::MultiplyRuleWeight { factor: 3.0 },
            ],
        },
        ActionSet {
            conditions: Some(ConditionChain::new(ChainOperator::And, vec![
                Condition::Position {
                    min: GridPoint::new(1, 0),
                    max: GridPoint::new(1, 0),
                }
                .into(),
            ])),
            actions: vec![Action::SetVariantWeight {
                scope: Default::default(),
                weight: 0.0,
            }],
        },
    ];
    let original = rule.clone();
    let map = GridMap::new(2, 1);

    let first = rule.evaluate(&map, GridPoint::new(0, 0), None);
    let second = rule.evaluate(&map, GridPoint::new(1, 0), None);
    let third = rule.evaluate(&map, GridPoint::new(0, 0), None);

    assert_eq!(rule, original);
    assert_eq!(first.variants.len(), 1);
    assert_eq!(first.weight, 300.0);
    assert_eq!(second.variants.len(), 2);
    assert!(second.variants.iter().all(|v| v.weight == 0.0));
    assert_eq!(second.weight, 100.0);
    assert_eq!(first, third);
}

/// Lookahead retrieval finds an origin for a module that can't start at the
/// target cell itself
#[test]
fn test_lookahead_places_large_module() {
    let modules = modules(&[("hall", 2, 2)]);
    let map = GridMap::new(3, 3);
    let rule = PlacementRule::new("halls", vec![Variant::new("hall", 1.0)]);
    let mut rng = Pcg64::seed_from_u64(5);
    let target = GridPoint::new(2, 2);

    // A 2x2 module can never have its origin in the top-right corner
    assert!(rule
        .try_retrieve_next(&mut rng, &input(&map, &modules), target)
        .is_none());
    for _ in 0..20 {
        let retrieval = rule
            .try_retrieve_next_ex(&mut rng, &input(&map, &modules), target, None)
            .unwrap();
        assert!(map.is_footprint_free(
            retrieval.origin,
            Footprint::new(2, 2),
            retrieval.rotation
        ));
    }
}

/// An excluded rule never retrieves anything, with or without lookahead
#[test]
fn test_exclude_rule() {
    let modules = modules(&[("a", 1, 1)]);
    let map = GridMap::new(2, 2);
    let mut rule =
        PlacementRule::new(RuleId::from("r"), vec![Variant::new("a", 1.0)]);
    rule.action_sets.push(ActionSet {
        conditions: None,
        actions: vec![Action::Exclude],
    });
    let mut rng = Pcg64::seed_from_u64(0);
    assert!(rule
        .try_retrieve_next(&mut rng, &input(&map, &modules), GridPoint::ORIGIN)
        .is_none());
    assert!(rule
        .try_retrieve_next_ex(
            &mut rng,
            &input(&map, &modules),
            GridPoint::ORIGIN,
            None
        )
        .is_none());
}
