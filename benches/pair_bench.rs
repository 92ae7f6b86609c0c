use criterion::{criterion_group, criterion_main};

mod common;

criterion_group!(pair_benches, common::bench_engine_swap);
criterion_main!(pair_benches);
