use autotrader::config::RiskConfig;
use autotrader::engine::{evaluate, Position};
use autotrader::market::PriceSimulator;
use autotrader::types::{Price, Size, Symbol};
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;

fn bench_simulator_ticks(c: &mut Criterion) {
    c.bench_function("simulator_10k_ticks", |b| {
        b.iter(|| {
            let mut simulator = PriceSimulator::new(100.0, 0.01, 7);
            for _ in 0..10_000 {
                black_box(simulator.next_tick());
            }
        })
    });

    c.bench_function("simulator_1k_bars", |b| {
        b.iter(|| {
            let mut simulator = PriceSimulator::new(100.0, 0.01, 7);
            for _ in 0..1_000 {
                black_box(simulator.next_bar());
            }
        })
    });
}

fn bench_risk_evaluation(c: &mut Criterion) {
    let config = RiskConfig::default();
    let prices: Vec<Price> = (0..1_000i64)
        .map(|i| Price::new(dec!(100) + rust_decimal::Decimal::new(i % 50 - 25, 1)))
        .collect();

    c.bench_function("risk_rules_1k_ticks", |b| {
        b.iter(|| {
            let mut position = Position::open(
                Symbol::new("EURUSD"),
                Size::new(dec!(100)),
                Price::new(dec!(100)),
                Price::new(dec!(1)),
                Price::new(dec!(1000)),
                dec!(0.9),
            );
            let now = Utc::now();
            for price in &prices {
                black_box(evaluate(&mut position, *price, now, &config));
            }
        })
    });
}

criterion_group!(benches, bench_simulator_ticks, bench_risk_evaluation);
criterion_main!(benches);
