use crate::core::events::OrderSide;
use crate::types::{Price, Size, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// One open position with its exit levels and tracking state
///
/// At most one per symbol. `highest_price` only ever moves up while the
/// position is open; `partially_exited` makes the one-time partial exit
/// idempotent across ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub size: Size,
    pub entry_price: Price,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Price,
    pub take_profit: Price,
    pub trailing_stop_pct: Decimal,
    pub highest_price: Price,
    pub partially_exited: bool,
}

impl Position {
    /// Open a long position; the highest seen price starts at entry
    pub fn open(
        symbol: Symbol,
        size: Size,
        entry_price: Price,
        stop_loss: Price,
        take_profit: Price,
        trailing_stop_pct: Decimal,
    ) -> Self {
        Self {
            symbol,
            side: OrderSide::Buy,
            size,
            entry_price,
            entry_time: Utc::now(),
            stop_loss,
            take_profit,
            trailing_stop_pct,
            highest_price: entry_price,
            partially_exited: false,
        }
    }

    /// Fold a new price into the trailing high
    pub fn update_high(&mut self, price: Price) {
        if price > self.highest_price {
            self.highest_price = price;
        }
    }

    /// Signed fractional move from entry to `price`
    pub fn change_ratio(&self, price: Price) -> Decimal {
        price.change_from(self.entry_price)
    }

    /// Realized profit/loss for closing `size` units at `price`
    pub fn realized_pl(&self, price: Price, size: Size) -> Decimal {
        (price.value() - self.entry_price.value()) * size.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(entry: Decimal) -> Position {
        Position::open(
            Symbol::new("EURUSD"),
            Size::new(dec!(100)),
            Price::new(entry),
            Price::new(entry * dec!(0.98)),
            Price::new(entry * dec!(1.04)),
            dec!(0.015),
        )
    }

    #[test]
    fn test_trailing_high_never_decreases() {
        let mut position = position(dec!(100));
        position.update_high(Price::new(dec!(105)));
        assert_eq!(position.highest_price, Price::new(dec!(105)));

        position.update_high(Price::new(dec!(101)));
        assert_eq!(position.highest_price, Price::new(dec!(105)));
    }

    #[test]
    fn test_change_ratio_from_entry() {
        let position = position(dec!(100));
        assert_eq!(position.change_ratio(Price::new(dec!(104))), dec!(0.04));
        assert_eq!(position.change_ratio(Price::new(dec!(98))), dec!(-0.02));
    }

    #[test]
    fn test_realized_pl() {
        let position = position(dec!(100));
        assert_eq!(
            position.realized_pl(Price::new(dec!(103)), Size::new(dec!(50))),
            dec!(150)
        );
    }
}
