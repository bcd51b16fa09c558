use criterion::{criterion_group, criterion_main, Criterion};
use ovs_core::{RngHandle, WeightSample};
use ovs_stat::RatioAccumulator;

fn sample_weights(count: usize) -> Vec<WeightSample> {
    let mut rng = RngHandle::from_seed(42);
    (0..count)
        .map(|_| WeightSample::new(0.1 + rng.next_unit()).unwrap())
        .collect()
}

fn bench_accumulate(c: &mut Criterion) {
    let weights = sample_weights(5_000);

    c.bench_function("accumulate_11_slots", |b| {
        b.iter(|| {
            let mut acc = RatioAccumulator::new(11, 50).unwrap();
            for chunk in weights.chunks_exact(11) {
                for (slot, &weight) in chunk.iter().enumerate() {
                    acc.add_sample(slot, weight).unwrap();
                }
            }
            acc
        })
    });

    c.bench_function("accumulate_weighted_pairs", |b| {
        b.iter(|| {
            let mut acc = RatioAccumulator::new(1, 50).unwrap();
            for pair in weights.chunks_exact(2) {
                acc.add_weighted(0, pair[0], pair[1]).unwrap();
            }
            acc
        })
    });
}

criterion_group!(benches, bench_accumulate);
criterion_main!(benches);
