use crate::config::RiskConfig;
use crate::core::events::ExitReason;
use crate::engine::position::Position;
use crate::types::Price;
use chrono::{DateTime, Utc};

/// Outcome of one risk evaluation tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleDecision {
    pub full_exit: Option<ExitReason>,
    pub partial_exit: bool,
}

impl RuleDecision {
    pub fn hold() -> Self {
        Self::default()
    }

    pub fn is_hold(&self) -> bool {
        self.full_exit.is_none() && !self.partial_exit
    }
}

/// Evaluate the exit rules for one price tick, in fixed order
///
/// Folds the price into the trailing high first, then checks stop loss,
/// take profit, trailing stop and time exit; the first that fires wins.
/// The one-time partial exit is only considered when no full exit fired,
/// and never re-arms once `partially_exited` is set.
pub fn evaluate(
    position: &mut Position,
    price: Price,
    now: DateTime<Utc>,
    config: &RiskConfig,
) -> RuleDecision {
    position.update_high(price);

    if price <= position.stop_loss {
        return RuleDecision {
            full_exit: Some(ExitReason::StopLoss),
            partial_exit: false,
        };
    }

    if price >= position.take_profit {
        return RuleDecision {
            full_exit: Some(ExitReason::TakeProfit),
            partial_exit: false,
        };
    }

    let trailing_floor = position
        .highest_price
        .scaled_by(-position.trailing_stop_pct);
    if price < trailing_floor {
        return RuleDecision {
            full_exit: Some(ExitReason::TrailingStop),
            partial_exit: false,
        };
    }

    let held = now.signed_duration_since(position.entry_time);
    if held.to_std().map(|held| held > config.max_hold).unwrap_or(false) {
        return RuleDecision {
            full_exit: Some(ExitReason::TimeExit),
            partial_exit: false,
        };
    }

    if !position.partially_exited {
        let target_pct = position.take_profit.change_from(position.entry_price);
        let trigger = target_pct * config.partial_exit_threshold;
        let covered = position.change_ratio(price);
        let half = position.size.halved();
        if covered >= trigger && half >= config.min_lot {
            return RuleDecision {
                full_exit: None,
                partial_exit: true,
            };
        }
    }

    RuleDecision::hold()
}
