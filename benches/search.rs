//! Benchmarks for demolition search.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use demolition_search::{
    compute::{
        CollapseSimulator, PhysicsSettings, ScriptedSimulator, build_clusters,
        evolution::SearchEngine,
    },
    schema::{DebrisExtents, JointRegistry, SearchConfig, StructureModel},
};

/// `side^3` joints on a unit lattice.
fn lattice(side: usize) -> JointRegistry {
    let positions = (0..side * side * side).map(|i| {
        [
            (i % side) as f32,
            ((i / side) % side) as f32,
            (i / (side * side)) as f32,
        ]
    });
    JointRegistry::from_positions(positions).expect("lattice is non-empty")
}

fn search_config() -> SearchConfig {
    let mut config = SearchConfig::default();
    config.population.pool_size = 20;
    config.genetics.cluster_radius = 1.5;
    config.random_seed = Some(1);
    config
}

fn bench_build_clusters(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_clusters");

    for side in [4, 8, 12] {
        let registry = lattice(side);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{} joints", registry.len())),
            &registry,
            |b, registry| {
                b.iter(|| build_clusters(black_box(registry.joints()), 1.5));
            },
        );
    }

    group.finish();
}

fn bench_generation_scripted(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation_scripted");

    for side in [4, 8] {
        let registry = lattice(side);
        let sim = ScriptedSimulator::constant(registry.len(), DebrisExtents::default());
        let mut engine =
            SearchEngine::new(search_config(), &registry, sim).expect("valid search setup");

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{} joints", registry.len())),
            &side,
            |b, _| {
                b.iter(|| engine.run_generation().expect("generation runs"));
            },
        );
    }

    group.finish();
}

fn bench_generation_collapse(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation_collapse");
    group.sample_size(20);

    for workers in [1, 4] {
        let model = StructureModel::example();
        let registry = model.registry().expect("example structure is valid");
        let simulators = (0..workers)
            .map(|_| CollapseSimulator::new(model.clone(), PhysicsSettings::default()))
            .collect::<Result<Vec<_>, _>>()
            .expect("example structure is valid");
        let mut config = search_config();
        config.evaluation.workers = workers;
        let mut engine =
            SearchEngine::with_workers(config, &registry, simulators).expect("valid search setup");

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{workers} workers")),
            &workers,
            |b, _| {
                b.iter(|| engine.run_generation().expect("generation runs"));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build_clusters,
    bench_generation_scripted,
    bench_generation_collapse
);
criterion_main!(benches);
