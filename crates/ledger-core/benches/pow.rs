use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{
    mine::{proof_of_work, MiningOptions},
    Block, Transaction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn bench_pow(c: &mut Criterion) {
    c.bench_function("proof_of_work_difficulty_4", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        let txs: Vec<Transaction> = (0..10)
            .map(|i| {
                let mut tx = Transaction::new(format!("alice-{i}"), format!("{}", rng.gen::<u32>()));
                tx.receipt();
                tx
            })
            .collect();

        let mut block = Block::new(1, txs);
        block.previous_hash = Block::genesis().hash();

        b.iter(|| {
            let mut candidate = block.clone();
            let _hash = proof_of_work(&mut candidate, 4, &MiningOptions::default());
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
