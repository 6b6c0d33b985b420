use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quilt::{
    generate, CancellationToken, ExecutionStrategy, HeadlessHost, MapConfig,
    TileCatalog,
};

const CATALOG: &str = r#"{
    "modules": [
        {"id": "grass"},
        {"id": "house", "footprint": {"width": 2, "height": 1}},
        {"id": "barn", "footprint": {"width": 3, "height": 2}}
    ],
    "rules": [
        {
            "id": "farms",
            "variants": [
                {"module": "house", "weight": 30},
                {"module": "barn", "weight": 10}
            ],
            "action_sets": [{
                "conditions": {
                    "conditions": [{
                        "type": "tile_within",
                        "sources": [{"module": "barn"}],
                        "max_distance": 3
                    }]
                },
                "actions": [{"type": "exclude_variant", "module": "barn"}]
            }]
        },
        {"id": "meadow", "variants": [{"module": "grass"}]}
    ],
    "layers": [
        {"id": "farmland", "type": "scatter", "rule": "farms", "count": 40},
        {"id": "base", "type": "fill", "priority": 1, "rules": ["meadow"]}
    ]
}"#;

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("map-generation");
    group.sample_size(10);

    let catalog: TileCatalog = serde_json::from_str(CATALOG).unwrap();
    let strategies = [ExecutionStrategy::Sequential, ExecutionStrategy::Parallel];
    for execution in &strategies {
        let config = MapConfig {
            seed: 1234u64.into(),
            width: 64,
            height: 64,
            execution: *execution,
            ..Default::default()
        };
        group.bench_function(format!("map gen ({:?})", execution), |b| {
            b.iter(|| {
                generate(
                    black_box(config.clone()),
                    &catalog,
                    &mut HeadlessHost::new(),
                    CancellationToken::new(),
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
