//! Indicator kernel over bar windows
//!
//! All math is f64; exactness matters for order thresholds, not for
//! indicator values.

use crate::core::events::PriceBar;

pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|bar| bar.close.to_f64()).collect()
}

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average series, seeded with the SMA of the first
/// `period` values
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut series = Vec::with_capacity(values.len() - period + 1);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    series.push(current);
    for value in &values[period..] {
        current = alpha * value + (1.0 - alpha) * current;
        series.push(current);
    }
    series
}

pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}

/// MACD(12, 26) with a 9-period signal line
pub fn macd(values: &[f64]) -> Option<Macd> {
    const FAST: usize = 12;
    const SLOW: usize = 26;
    const SIGNAL: usize = 9;

    if values.len() < SLOW {
        return None;
    }
    let fast = ema_series(values, FAST);
    let slow = ema_series(values, SLOW);
    // Align the two series on their common (most recent) suffix
    let offset = fast.len() - slow.len();
    let macd_line: Vec<f64> = slow
        .iter()
        .enumerate()
        .map(|(i, s)| fast[i + offset] - s)
        .collect();
    let signal = if macd_line.len() >= SIGNAL {
        ema(&macd_line, SIGNAL)?
    } else {
        sma(&macd_line, macd_line.len())?
    };
    let macd = *macd_line.last()?;
    Some(Macd {
        macd,
        signal,
        histogram: macd - signal,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// RSI with Wilder smoothing
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for window in values[..period + 1].windows(2) {
        let delta = window[1] - window[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;

    for window in values[period..].windows(2) {
        let delta = window[1] - window[0];
        let (gain, loss) = if delta >= 0.0 {
            (delta, 0.0)
        } else {
            (0.0, -delta)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bollinger {
    /// Where `price` sits inside the band, 0 at the lower edge, 1 at the
    /// upper; 0.5 when the band has no width
    pub fn position(&self, price: f64) -> f64 {
        let width = self.upper - self.lower;
        if width == 0.0 {
            0.5
        } else {
            (price - self.lower) / width
        }
    }
}

/// Bollinger bands over the last `period` values at `k` standard deviations
pub fn bollinger(values: &[f64], period: usize, k: f64) -> Option<Bollinger> {
    let middle = sma(values, period)?;
    let window = &values[values.len() - period..];
    let variance =
        window.iter().map(|v| (v - middle) * (v - middle)).sum::<f64>() / period as f64;
    let deviation = variance.sqrt();
    Some(Bollinger {
        upper: middle + k * deviation,
        middle,
        lower: middle - k * deviation,
    })
}

/// Average true range with Wilder smoothing
pub fn atr(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }
    let true_ranges: Vec<f64> = bars
        .windows(2)
        .map(|pair| {
            let previous_close = pair[0].close.to_f64();
            let high = pair[1].high.to_f64();
            let low = pair[1].low.to_f64();
            (high - low)
                .max((high - previous_close).abs())
                .max((low - previous_close).abs())
        })
        .collect();

    let mut atr = true_ranges[..period].iter().sum::<f64>() / period as f64;
    for tr in &true_ranges[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
    }
    Some(atr)
}

/// Last bar's volume relative to its `period`-bar average
pub fn volume_ratio(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.is_empty() {
        return None;
    }
    use rust_decimal::prelude::ToPrimitive;
    let volumes: Vec<f64> = bars
        .iter()
        .map(|bar| bar.volume.value().to_f64().unwrap_or(0.0))
        .collect();
    let period = period.min(volumes.len());
    let average = volumes[volumes.len() - period..].iter().sum::<f64>() / period as f64;
    if average == 0.0 {
        return None;
    }
    Some(volumes.last()? / average)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Price, Size};

    fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                PriceBar::new(
                    i as u64 * 60_000,
                    Price::from_f64(close).unwrap(),
                    Price::from_f64(close + 0.5).unwrap(),
                    Price::from_f64(close - 0.5).unwrap(),
                    Price::from_f64(close).unwrap(),
                    Size::from_f64(1000.0).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_sma_basic() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&values, 5), Some(3.0));
        assert_eq!(sma(&values, 2), Some(4.5));
        assert_eq!(sma(&values, 6), None);
    }

    #[test]
    fn test_ema_tracks_recent_values_harder() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let ema = ema(&values, 10).unwrap();
        let sma = sma(&values, 10).unwrap();
        // Rising series: EMA sits above the equally weighted mean
        assert!(ema > sma - 1.0);
        assert!(ema < 29.0);
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&rising, 14), Some(100.0));

        let falling: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        assert!(rsi(&falling, 14).unwrap() < 1.0);
    }

    #[test]
    fn test_rsi_balanced_series_is_moderate() {
        // Alternating +0.6 / -0.4 steps
        let mut values = vec![100.0];
        for i in 0..40 {
            let delta = if i % 2 == 0 { 0.6 } else { -0.4 };
            values.push(values.last().unwrap() + delta);
        }
        let rsi = rsi(&values, 14).unwrap();
        assert!(rsi > 30.0 && rsi < 70.0, "rsi was {}", rsi);
    }

    #[test]
    fn test_bollinger_bands_are_symmetric() {
        let values: Vec<f64> = (0..25).map(|i| 100.0 + (i % 2) as f64).collect();
        let bands = bollinger(&values, 20, 2.0).unwrap();
        assert!((bands.upper - bands.middle - (bands.middle - bands.lower)).abs() < 1e-9);
        assert!(bands.position(bands.upper) > 0.99);
        assert!(bands.position(bands.lower) < 0.01);
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let macd = macd(&values).unwrap();
        assert!(macd.macd > 0.0);
        assert!(macd.histogram.abs() < macd.macd.abs() + 1.0);
    }

    #[test]
    fn test_atr_reflects_bar_ranges() {
        let bars = bars_from_closes(&vec![100.0; 30]);
        // Flat closes with one-point ranges: ATR converges to the range
        let atr = atr(&bars, 14).unwrap();
        assert!((atr - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_volume_ratio_flat_volume_is_one() {
        let bars = bars_from_closes(&vec![100.0; 25]);
        assert!((volume_ratio(&bars, 20).unwrap() - 1.0).abs() < 1e-9);
    }
}
