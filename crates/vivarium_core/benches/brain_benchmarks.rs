use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use vivarium_core::brain::{flatten, forward, unflatten, BrainTopology};
use vivarium_core::genetics::CrossoverStrategy;
use vivarium_data::Genome;

fn topology() -> BrainTopology {
    // flocking network, the largest stock shape
    BrainTopology::new(6, vec![6, 3])
}

/// Benchmark a forward pass with typical inputs.
fn bench_brain_forward(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let brain = topology().build_random_with_rng(&mut rng);
    let inputs = [0.5; 6];

    c.bench_function("brain_forward", |b| {
        b.iter(|| {
            let result = forward(&brain, black_box(&inputs));
            black_box(result)
        })
    });
}

/// Benchmark a forward pass with saturating inputs.
fn bench_brain_forward_extreme(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let brain = topology().build_random_with_rng(&mut rng);
    let inputs = [100.0; 6];

    c.bench_function("brain_forward_extreme", |b| {
        b.iter(|| {
            let result = forward(&brain, black_box(&inputs));
            black_box(result)
        })
    });
}

/// Benchmark random brain creation.
fn bench_brain_creation(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let topology = topology();

    c.bench_function("brain_creation", |b| {
        b.iter(|| {
            let brain = topology.build_random_with_rng(&mut rng);
            black_box(brain)
        })
    });
}

/// Benchmark the flatten/unflatten genome round trip.
fn bench_genome_round_trip(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let topology = topology();
    let brain = topology.build_random_with_rng(&mut rng);

    c.bench_function("genome_round_trip", |b| {
        b.iter(|| {
            let genes = flatten(black_box(&brain));
            let restored = unflatten(&genes, &topology).unwrap();
            black_box(restored)
        })
    });
}

/// Benchmark uniform crossover over flat gene vectors.
fn bench_crossover(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let topology = topology();
    let p1 = Genome::new(flatten(&topology.build_random_with_rng(&mut rng)));
    let p2 = Genome::new(flatten(&topology.build_random_with_rng(&mut rng)));

    c.bench_function("crossover_uniform", |b| {
        b.iter(|| {
            let children =
                CrossoverStrategy::Uniform.breed_with_rng(&p1, &p2, 0.05, 0.3, &mut rng);
            black_box(children)
        })
    });
}

criterion_group!(
    benches,
    bench_brain_forward,
    bench_brain_forward_extreme,
    bench_brain_creation,
    bench_genome_round_trip,
    bench_crossover
);
criterion_main!(benches);
