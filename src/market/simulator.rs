use crate::core::events::{PriceBar, Timestamp};
use crate::types::{Price, Size};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Per-tick probability of re-rolling the current trend
const TREND_REROLL_PROBABILITY: f64 = 0.02;
/// Ticks a trend may persist before a forced re-roll
const MAX_TREND_DURATION: u32 = 100;
/// Prices never fall below one cent
const PRICE_FLOOR: f64 = 0.01;
/// Ticks folded into each synthesized OHLCV bar
const TICKS_PER_BAR: usize = 4;
const BAR_INTERVAL_MS: Timestamp = 60_000;

/// Random-walk price generator with persistent directional trends
///
/// Fully deterministic under a fixed seed, so simulated runs replay
/// identically.
pub struct PriceSimulator {
    base_price: f64,
    volatility: f64,
    price: f64,
    trend: i32,
    trend_duration: u32,
    rng: StdRng,
    next_timestamp: Timestamp,
    history: Vec<PriceBar>,
}

impl PriceSimulator {
    pub fn new(base_price: f64, volatility: f64, seed: u64) -> Self {
        Self {
            base_price,
            volatility,
            price: base_price,
            trend: 0,
            trend_duration: 0,
            rng: StdRng::seed_from_u64(seed),
            next_timestamp: 0,
            history: Vec::new(),
        }
    }

    pub fn current_price(&self) -> f64 {
        self.price
    }

    pub fn current_price_decimal(&self) -> Price {
        Price::from_f64(self.price).unwrap_or_else(|| Price::new(rust_decimal::Decimal::ONE))
    }

    /// Advance one tick and return the new price
    pub fn next_tick(&mut self) -> f64 {
        if self.trend_duration >= MAX_TREND_DURATION
            || self.rng.gen_bool(TREND_REROLL_PROBABILITY)
        {
            self.trend = self.rng.gen_range(-1..=1);
            self.trend_duration = 0;
        } else {
            self.trend_duration += 1;
        }

        let step = self.volatility * self.base_price;
        let noise = Normal::new(0.0, step)
            .map(|dist| dist.sample(&mut self.rng))
            .unwrap_or(0.0);
        self.price += self.trend as f64 * step + noise;
        self.price = self.price.max(PRICE_FLOOR);
        self.price
    }

    /// Fold the next few ticks into one OHLCV bar and append it to history
    pub fn next_bar(&mut self) -> PriceBar {
        let open = self.price;
        let mut high = open;
        let mut low = open;
        for _ in 0..TICKS_PER_BAR {
            let price = self.next_tick();
            high = high.max(price);
            low = low.min(price);
        }
        let close = self.price;
        let volume = self.rng.gen_range(500.0..1500.0);

        let timestamp = self.next_timestamp;
        self.next_timestamp += BAR_INTERVAL_MS;

        let bar = PriceBar::new(
            timestamp,
            price_of(open),
            price_of(high),
            price_of(low),
            price_of(close),
            Size::from_f64(volume).unwrap_or_else(Size::zero),
        );
        self.history.push(bar.clone());
        bar
    }

    /// Newest `count` bars, oldest first
    pub fn latest_bars(&self, count: usize) -> Vec<PriceBar> {
        let start = self.history.len().saturating_sub(count);
        self.history[start..].to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Restart the walk from a new base price, keeping the RNG stream
    pub fn reset(&mut self, base_price: f64) {
        self.base_price = base_price;
        self.price = base_price;
        self.trend = 0;
        self.trend_duration = 0;
        self.history.clear();
        self.next_timestamp = 0;
    }
}

fn price_of(value: f64) -> Price {
    Price::from_f64(value).unwrap_or_else(|| Price::new(rust_decimal::Decimal::ONE))
}
