use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use mesh_sweep::algs::{compute_loops, compute_partitions};
use mesh_sweep::builder::GraphBuilder;
use mesh_sweep::graph::{Graph, LoopCategory};

/// Multiphysics-shaped random deck grown by seeded walks.
fn random_deck(blocks: u32, walks: usize, seed: u64) -> Graph {
    let elemental = [LoopCategory::ElemOnElem];
    let nodal = [LoopCategory::Nodal];
    let blocks: Vec<u32> = (1..=blocks).collect();

    let mut b = GraphBuilder::new();
    b.add_family("var", false, false, &blocks, &elemental).unwrap();
    b.add_family("kernel", true, true, &blocks, &elemental).unwrap();
    b.add_family("bc", true, true, &blocks, &elemental).unwrap();
    b.add_family("solution", true, false, &[], &[]).unwrap();
    b.add_family("material", false, false, &blocks, &elemental)
        .unwrap();
    b.add_family("auxkernel", true, true, &blocks, &nodal).unwrap();
    b.add_family("postprocessor", true, true, &blocks, &elemental)
        .unwrap();

    b.bind("kernel", "var").unwrap();
    b.bind("bc", "var").unwrap();
    b.bind("solution", "kernel").unwrap();
    b.bind("solution", "bc").unwrap();

    b.transition("solution", "kernel", 0.5).unwrap();
    b.transition("solution", "bc", 0.4).unwrap();
    b.transition("kernel", "material", 0.3).unwrap();
    b.transition("kernel", "postprocessor", 0.2).unwrap();
    b.transition("bc", "material", 0.3).unwrap();
    b.transition("material", "var", 0.4).unwrap();
    b.transition("auxkernel", "postprocessor", 0.3).unwrap();

    let start = b.node("solution", LoopCategory::None, 0).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    b.walk(&mut rng, start, walks).unwrap();
    b.finish()
}

fn bench_partitioning(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_partitions");
    for &blocks in &[2u32, 4, 8] {
        let g = random_deck(blocks, 24, 42);
        group.bench_with_input(BenchmarkId::new("merged", blocks), &g, |bench, g| {
            bench.iter(|| compute_partitions(g, true).unwrap().len())
        });
        group.bench_with_input(BenchmarkId::new("plain", blocks), &g, |bench, g| {
            bench.iter(|| compute_partitions(g, false).unwrap().len())
        });
    }
    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let g = random_deck(4, 24, 42);
    c.bench_function("partitions_and_loops", |bench| {
        bench.iter(|| {
            let parts = compute_partitions(&g, true).unwrap();
            compute_loops(&parts).len()
        })
    });
}

criterion_group!(benches, bench_partitioning, bench_full_pipeline);
criterion_main!(benches);
