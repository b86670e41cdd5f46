use criterion::{criterion_group, criterion_main, Criterion};
use minichain_core::{Allocation, Engine, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn bench_pow(c: &mut Criterion) {
    c.bench_function("mine_block_difficulty_3", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        b.iter(|| {
            let mut engine = Engine::new(3, &[Allocation::new("alice", 1_000_000)]);
            for i in 0..10 {
                engine
                    .submit_transaction(Transaction::new(
                        "alice",
                        format!("bob-{i}"),
                        rng.gen_range(1..10),
                    ))
                    .unwrap();
            }
            let _mined = engine.mine_block("miner");
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
