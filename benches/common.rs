//! Shared benchmark bodies; the bench entry points pick groups from
//! here.

use std::hint::black_box;

use alloy_primitives::{Address, I256, U256};
use criterion::{BatchSize, Criterion};

use clmm_pair::math::full_math::{mul_div, mul_div_rounding_up};
use clmm_pair::math::swap_math::compute_swap_step;
use clmm_pair::math::tick_math::{get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio};
use clmm_pair::pool::pair::{ManualClock, PairEngine};
use clmm_pair::pool::token::{InMemoryToken, WalletCallback};
use clmm_pair::Q96;

fn addr(b: u8) -> Address {
    Address::with_last_byte(b)
}

pub fn bench_tick_math(c: &mut Criterion) {
    c.bench_function("tick_math/get_sqrt_ratio_at_tick", |b| {
        b.iter(|| get_sqrt_ratio_at_tick(black_box(-24081)).unwrap())
    });

    let ratio = get_sqrt_ratio_at_tick(-24081).unwrap();
    c.bench_function("tick_math/get_tick_at_sqrt_ratio", |b| {
        b.iter(|| get_tick_at_sqrt_ratio(black_box(ratio)).unwrap())
    });
}

pub fn bench_full_math(c: &mut Criterion) {
    let a = U256::from(123456789u64) << 96;
    let b_ = U256::from(987654321u64) << 64;
    let d = U256::from(1_000_000_007u64) << 32;

    c.bench_function("full_math/mul_div", |b| {
        b.iter(|| mul_div(black_box(a), black_box(b_), black_box(d)).unwrap())
    });
    c.bench_function("full_math/mul_div_rounding_up", |b| {
        b.iter(|| mul_div_rounding_up(black_box(a), black_box(b_), black_box(d)).unwrap())
    });
}

pub fn bench_swap_math(c: &mut Criterion) {
    let current = Q96;
    let target = get_sqrt_ratio_at_tick(-600).unwrap();
    let amount = I256::from_raw(U256::from(10u128).pow(U256::from(18u8)));

    c.bench_function("swap_math/compute_swap_step", |b| {
        b.iter(|| {
            compute_swap_step(
                black_box(current),
                black_box(target),
                black_box(2_000_000_000_000_000_000u128),
                black_box(amount),
                3000,
            )
            .unwrap()
        })
    });
}

fn engine_with_ladder() -> PairEngine<InMemoryToken> {
    let mut token0 = InMemoryToken::new(addr(1));
    let mut token1 = InMemoryToken::new(addr(2));
    token0.credit(addr(10), U256::from(u128::MAX));
    token1.credit(addr(10), U256::from(u128::MAX));

    let mut engine = PairEngine::new(
        addr(9),
        addr(10),
        token0,
        token1,
        3000,
        60,
        ManualClock::new(0),
    )
    .unwrap();
    engine.initialize(addr(10), Q96).unwrap();

    // a ladder of overlapping ranges so swaps cross several ticks
    for i in 1i32..=20 {
        engine
            .mint(
                addr(10),
                addr(10),
                -60 * i,
                60 * i,
                1_000_000_000_000_000_000,
            )
            .unwrap();
    }
    engine
}

pub fn bench_engine_swap(c: &mut Criterion) {
    c.bench_function("pair/swap_exact_0_for_1_crossing_ticks", |b| {
        b.iter_batched(
            engine_with_ladder,
            |mut engine| {
                let mut callback = WalletCallback::new(addr(10));
                engine
                    .swap_exact_0_for_1(
                        addr(10),
                        addr(10),
                        U256::from(5_000_000_000_000_000_000u128),
                        None,
                        &mut callback,
                        &[],
                    )
                    .unwrap()
            },
            BatchSize::SmallInput,
        )
    });

    let engine = engine_with_ladder();
    c.bench_function("pair/quote_exact_0_for_1", |b| {
        b.iter(|| {
            engine
                .quote(
                    true,
                    I256::from_raw(U256::from(5_000_000_000_000_000_000u128)),
                    black_box(clmm_pair::math::tick_math::MIN_SQRT_RATIO + U256::ONE),
                )
                .unwrap()
        })
    });
}
