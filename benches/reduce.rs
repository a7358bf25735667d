use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use lts_bisim::prelude::*;
use lts_bisim::random::random_lts_with_rng;

const SEED: u64 = 0x1b15;
const SIZES: [usize; 3] = [100, 1_000, 10_000];

fn data(num_states: usize) -> Lts {
    random_lts_with_rng(&mut fastrand::Rng::with_seed(SEED), num_states, 4, 3)
}

fn benchings(c: &mut Criterion) {
    for n in SIZES {
        let lts = data(n);
        for equivalence in Equivalence::ALL {
            c.bench_function(&format!("reduce {equivalence} {n}"), |b| {
                b.iter_batched(
                    || lts.clone(),
                    |mut lts| bisimulation_reduce(black_box(&mut lts), equivalence),
                    BatchSize::SmallInput,
                )
            });
        }
        c.bench_function(&format!("scc_reduce {n}"), |b| {
            b.iter_batched(
                || lts.clone(),
                |mut lts| scc_reduce(black_box(&mut lts), false),
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = benchings
}
criterion_main!(benches);
