use crate::core::events::PriceBar;
use crate::signal::indicators::{self, Bollinger, Macd};
use crate::types::{Size, Symbol};
use log::debug;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

/// Bars required before the indicator stack is trustworthy
pub const MIN_BARS: usize = 20;

/// Acceptable volatility ceiling (ATR over close)
const MAX_VOLATILITY: f64 = 0.02;

/// Entry decision with derived risk parameters
///
/// Fresh per evaluation, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub should_trade: bool,
    /// Blended model confidence in [0, 1]
    pub confidence: f64,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub position_size: Size,
}

impl Signal {
    /// The do-nothing signal
    pub fn no_trade() -> Self {
        Self {
            should_trade: false,
            confidence: 0.0,
            stop_loss_pct: dec!(0.02),
            take_profit_pct: dec!(0.04),
            position_size: Size::zero(),
        }
    }
}

/// Produces an entry decision from a bar window
#[cfg_attr(test, mockall::automock)]
pub trait SignalProvider: Send + Sync {
    fn evaluate(&self, symbol: &Symbol, bars: &[PriceBar]) -> Signal;
}

/// Weighted-confidence scoring over the indicator kernel
///
/// Three indicator groups are each scored as the fraction of their checks
/// that pass, then blended 40/40/20 (trend/momentum/risk). High-volatility
/// symbols use a relaxed condition-count entry rule instead of the strict
/// gate.
pub struct WeightedConfidenceProvider {
    confidence_threshold: f64,
    high_volatility_symbols: HashSet<String>,
    /// Allow the three-rising-closes momentum entry while the bar window is
    /// still shallow (simulated runs only)
    warmup_momentum: bool,
}

impl WeightedConfidenceProvider {
    pub fn new(confidence_threshold: f64, high_volatility_symbols: HashSet<String>) -> Self {
        Self {
            confidence_threshold,
            high_volatility_symbols,
            warmup_momentum: false,
        }
    }

    pub fn with_warmup_momentum(mut self) -> Self {
        self.warmup_momentum = true;
        self
    }

    fn is_high_volatility(&self, symbol: &Symbol) -> bool {
        self.high_volatility_symbols.contains(symbol.as_str())
    }
}

impl SignalProvider for WeightedConfidenceProvider {
    fn evaluate(&self, symbol: &Symbol, bars: &[PriceBar]) -> Signal {
        if bars.len() < MIN_BARS {
            if self.warmup_momentum && rising_closes(bars, 3) {
                debug!("{}: warmup momentum entry on rising closes", symbol);
                return Signal {
                    should_trade: true,
                    confidence: self.confidence_threshold,
                    stop_loss_pct: dec!(0.02),
                    take_profit_pct: dec!(0.04),
                    position_size: size_for(self.confidence_threshold),
                };
            }
            return Signal::no_trade();
        }

        let closes = indicators::closes(bars);
        let close = *closes.last().expect("bars checked non-empty");

        let sma20 = indicators::sma(&closes, 20);
        let sma50 = indicators::sma(&closes, 50);
        let macd = indicators::macd(&closes);
        let rsi = indicators::rsi(&closes, 14);
        let bands = indicators::bollinger(&closes, 20, 2.0);
        let atr = indicators::atr(bars, 14);
        let volume_ratio = indicators::volume_ratio(bars, 20);

        let bb_position = bands.as_ref().map(|b| b.position(close)).unwrap_or(0.5);
        let volatility = atr.map(|atr| atr / close).unwrap_or(f64::MAX);

        let trend = trend_score(close, sma20, sma50, macd.as_ref(), bb_position);
        let momentum = momentum_score(rsi, volume_ratio, macd.as_ref());
        let risk = risk_score(volatility, bands.as_ref(), close);
        let confidence = 0.4 * trend + 0.4 * momentum + 0.2 * risk;

        let above_sma20 = sma20.map(|sma| close > sma).unwrap_or(false);
        let rsi_in_band = rsi.map(|rsi| rsi > 30.0 && rsi < 70.0).unwrap_or(false);
        let volatility_ok = volatility < MAX_VOLATILITY;

        let should_trade = if self.is_high_volatility(symbol) {
            let conditions = [
                above_sma20,
                volume_ratio.map(|vr| vr > 1.2).unwrap_or(false),
                rsi_in_band,
                sma_cross_up(sma20, sma50),
            ];
            conditions.iter().filter(|met| **met).count() >= 2
        } else {
            confidence > self.confidence_threshold && above_sma20 && rsi_in_band && volatility_ok
        };

        debug!(
            "{}: trend {:.2} momentum {:.2} risk {:.2} confidence {:.2} trade {}",
            symbol, trend, momentum, risk, confidence, should_trade
        );

        let stop_loss_pct = pct_of(2.0 * volatility.min(1.0), 0.02);
        let take_profit_pct = pct_of(4.0 * volatility.min(1.0), 0.04);
        Signal {
            should_trade,
            confidence,
            stop_loss_pct,
            take_profit_pct,
            position_size: if should_trade {
                size_for(confidence)
            } else {
                Size::zero()
            },
        }
    }
}

fn trend_score(
    close: f64,
    sma20: Option<f64>,
    sma50: Option<f64>,
    macd: Option<&Macd>,
    bb_position: f64,
) -> f64 {
    let mut score = 0.0;
    if sma20.map(|sma| close > sma).unwrap_or(false) {
        score += 1.0;
    }
    if sma50.map(|sma| close > sma).unwrap_or(false) {
        score += 1.0;
    }
    if sma_cross_up(sma20, sma50) {
        score += 1.0;
    }
    if macd.map(|m| m.histogram > 0.0).unwrap_or(false) {
        score += 1.0;
    }
    // Band position contributes its raw value rather than a binary check
    score += bb_position.clamp(0.0, 1.0);
    score / 5.0
}

fn momentum_score(rsi: Option<f64>, volume_ratio: Option<f64>, macd: Option<&Macd>) -> f64 {
    let checks = [
        rsi.map(|rsi| rsi > 30.0 && rsi < 70.0).unwrap_or(false),
        volume_ratio.map(|vr| vr > 1.0).unwrap_or(false),
        macd.map(|m| m.macd > m.signal).unwrap_or(false),
    ];
    checks.iter().filter(|met| **met).count() as f64 / checks.len() as f64
}

fn risk_score(volatility: f64, bands: Option<&Bollinger>, close: f64) -> f64 {
    let position_ok = bands
        .map(|bands| {
            let position = bands.position(close);
            position > 0.1 && position < 0.9
        })
        .unwrap_or(false);
    let checks = [volatility < MAX_VOLATILITY, position_ok];
    checks.iter().filter(|met| **met).count() as f64 / checks.len() as f64
}

fn sma_cross_up(sma20: Option<f64>, sma50: Option<f64>) -> bool {
    match (sma20, sma50) {
        (Some(fast), Some(slow)) => fast > slow,
        _ => false,
    }
}

/// True when the last `streak` closes are strictly rising
fn rising_closes(bars: &[PriceBar], streak: usize) -> bool {
    if bars.len() < streak {
        return false;
    }
    bars[bars.len() - streak..]
        .windows(2)
        .all(|pair| pair[1].close > pair[0].close)
}

/// Derived percentage with a floor, carried into exact order math
fn pct_of(value: f64, floor: f64) -> Decimal {
    let value = value.max(floor);
    Decimal::from_f64(value).unwrap_or_else(|| Decimal::from_f64(floor).unwrap_or(dec!(0.02)))
}

/// Position size scales linearly with confidence, 100 units at full
/// conviction
fn size_for(confidence: f64) -> Size {
    Size::from_f64((100.0 * confidence).floor()).unwrap_or_else(Size::zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Price;

    fn bar(i: usize, close: f64, volume: f64) -> PriceBar {
        PriceBar::new(
            i as u64 * 60_000,
            Price::from_f64(close).unwrap(),
            Price::from_f64(close + 0.3).unwrap(),
            Price::from_f64(close - 0.3).unwrap(),
            Price::from_f64(close).unwrap(),
            Size::from_f64(volume).unwrap(),
        )
    }

    /// Gentle uptrend with mixed up/down steps so RSI stays moderate
    fn uptrend_bars(count: usize) -> Vec<PriceBar> {
        let mut close = 100.0;
        (0..count)
            .map(|i| {
                close += if i % 2 == 0 { 0.6 } else { -0.4 };
                bar(i, close, 1000.0)
            })
            .collect()
    }

    fn downtrend_bars(count: usize) -> Vec<PriceBar> {
        let mut close = 100.0;
        (0..count)
            .map(|i| {
                close -= if i % 2 == 0 { 0.6 } else { -0.4 };
                bar(i, close, 1000.0)
            })
            .collect()
    }

    fn provider() -> WeightedConfidenceProvider {
        WeightedConfidenceProvider::new(0.6, HashSet::new())
    }

    #[test]
    fn test_insufficient_bars_is_no_trade_not_error() {
        let signal = provider().evaluate(&Symbol::new("EURUSD"), &uptrend_bars(MIN_BARS - 1));
        assert!(!signal.should_trade);
        assert_eq!(signal.position_size, Size::zero());
    }

    #[test]
    fn test_uptrend_enters_with_sized_position() {
        // Odd count so the window ends on an up step
        let signal = provider().evaluate(&Symbol::new("EURUSD"), &uptrend_bars(61));
        assert!(signal.should_trade, "confidence {}", signal.confidence);
        assert!(signal.confidence > 0.6);
        assert!(signal.position_size.is_positive());
        // Calm series: derived percentages sit on their floors
        assert_eq!(signal.stop_loss_pct, dec!(0.02));
        assert_eq!(signal.take_profit_pct, dec!(0.04));
    }

    #[test]
    fn test_downtrend_stays_out() {
        let signal = provider().evaluate(&Symbol::new("EURUSD"), &downtrend_bars(60));
        assert!(!signal.should_trade);
        assert_eq!(signal.position_size, Size::zero());
    }

    #[test]
    fn test_high_volatility_symbol_uses_relaxed_rule() {
        let tagged: HashSet<String> = ["BTCUSD".to_string()].into_iter().collect();
        let provider = WeightedConfidenceProvider::new(0.99, tagged);

        // Threshold 0.99 blocks the strict gate; the relaxed two-of-four
        // rule still lets the tagged symbol in
        let bars = uptrend_bars(61);
        assert!(provider.evaluate(&Symbol::new("BTCUSD"), &bars).should_trade);
        assert!(!provider.evaluate(&Symbol::new("EURUSD"), &bars).should_trade);
    }

    #[test]
    fn test_warmup_momentum_needs_three_rising_closes() {
        let rising = vec![bar(0, 100.0, 1000.0), bar(1, 100.5, 1000.0), bar(2, 101.0, 1000.0)];
        let choppy = vec![bar(0, 100.0, 1000.0), bar(1, 99.5, 1000.0), bar(2, 101.0, 1000.0)];

        let warm = WeightedConfidenceProvider::new(0.6, HashSet::new()).with_warmup_momentum();
        assert!(warm.evaluate(&Symbol::new("SIMUSD"), &rising).should_trade);
        assert!(!warm.evaluate(&Symbol::new("SIMUSD"), &choppy).should_trade);

        // Without warmup the shallow window never trades
        assert!(!provider().evaluate(&Symbol::new("SIMUSD"), &rising).should_trade);
    }

    #[test]
    fn test_size_tracks_confidence() {
        assert_eq!(size_for(0.75), Size::from_f64(75.0).unwrap());
        assert_eq!(size_for(0.0), Size::zero());
    }
}
