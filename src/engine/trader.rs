use crate::config::{ConfigError, RiskConfig};
use crate::core::events::{ExitReason, OrderIntent, TradeEventKind, TradeLogEntry};
use crate::engine::client::BrokerClient;
use crate::engine::position::Position;
use crate::engine::risk;
use crate::engine::trade_log::TradeLogger;
use crate::market::feed::{FeedError, PriceFeed};
use crate::signal::{Signal, SignalProvider};
use crate::types::{Price, Symbol};
use chrono::Utc;
use log::{error, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Pause after a failed tick before polling again
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Cross-context instructions for a running symbol loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Stop the loop, leaving any open position untouched
    Stop,
    /// Close the open position at market, then keep trading
    ExitNow,
}

/// Loop cadence and sizing parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub bar_count: u32,
    pub risk: RiskConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            bar_count: 50,
            risk: RiskConfig::default(),
        }
    }
}

struct LoopHandle {
    commands: mpsc::Sender<EngineCommand>,
    task: JoinHandle<()>,
}

/// Runs one trading loop per symbol against a [`BrokerClient`]
///
/// Each loop owns its position state outright; other contexts reach it only
/// through the command channel. Errors inside a tick are logged and backed
/// off, never propagated out of the loop.
pub struct PositionEngine<C: BrokerClient + 'static> {
    client: Arc<C>,
    feed: Arc<dyn PriceFeed>,
    provider: Arc<dyn SignalProvider>,
    logger: Arc<dyn TradeLogger>,
    config: EngineConfig,
    loops: StdMutex<HashMap<String, LoopHandle>>,
}

impl<C: BrokerClient + 'static> PositionEngine<C> {
    /// Risk parameters are validated here, before any loop can start
    pub fn new(
        client: Arc<C>,
        feed: Arc<dyn PriceFeed>,
        provider: Arc<dyn SignalProvider>,
        logger: Arc<dyn TradeLogger>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.risk.validate()?;
        Ok(Self {
            client,
            feed,
            provider,
            logger,
            config,
            loops: StdMutex::new(HashMap::new()),
        })
    }

    /// Start the trading loop for a symbol
    pub fn start_symbol(&self, symbol: Symbol) -> Result<(), EngineError> {
        let mut loops = self.loops.lock().unwrap();
        if loops.contains_key(symbol.as_str()) {
            return Err(EngineError::AlreadyRunning(symbol.to_string()));
        }

        let (tx, rx) = mpsc::channel(16);
        let ctx = LoopCtx {
            symbol: symbol.clone(),
            client: Arc::clone(&self.client),
            feed: Arc::clone(&self.feed),
            provider: Arc::clone(&self.provider),
            logger: Arc::clone(&self.logger),
            config: self.config.clone(),
        };
        let task = tokio::spawn(run_symbol_loop(ctx, rx));
        loops.insert(
            symbol.as_str().to_string(),
            LoopHandle { commands: tx, task },
        );
        Ok(())
    }

    /// Ask a symbol loop to stop; returns false when none was running
    pub async fn stop_symbol(&self, symbol: &Symbol) -> bool {
        let handle = self.loops.lock().unwrap().remove(symbol.as_str());
        match handle {
            Some(handle) => {
                let _ = handle.commands.send(EngineCommand::Stop).await;
                let _ = handle.task.await;
                true
            }
            None => false,
        }
    }

    /// Close the symbol's open position at market
    pub async fn exit_now(&self, symbol: &Symbol) -> bool {
        let commands = self
            .loops
            .lock()
            .unwrap()
            .get(symbol.as_str())
            .map(|handle| handle.commands.clone());
        match commands {
            Some(commands) => commands.send(EngineCommand::ExitNow).await.is_ok(),
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        let handles: Vec<LoopHandle> = {
            let mut loops = self.loops.lock().unwrap();
            loops.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let _ = handle.commands.send(EngineCommand::Stop).await;
            let _ = handle.task.await;
        }
    }

    pub fn running_symbols(&self) -> Vec<String> {
        self.loops.lock().unwrap().keys().cloned().collect()
    }
}

struct LoopCtx<C: BrokerClient> {
    symbol: Symbol,
    client: Arc<C>,
    feed: Arc<dyn PriceFeed>,
    provider: Arc<dyn SignalProvider>,
    logger: Arc<dyn TradeLogger>,
    config: EngineConfig,
}

async fn run_symbol_loop<C: BrokerClient>(ctx: LoopCtx<C>, mut commands: mpsc::Receiver<EngineCommand>) {
    info!("Trading loop started for {}", ctx.symbol);
    write_log(
        &*ctx.logger,
        TradeLogEntry::marker(ctx.symbol.clone(), TradeEventKind::Start),
    );

    let mut position: Option<Position> = None;
    let mut interval = tokio::time::interval(ctx.config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(EngineCommand::Stop) | None => break,
                Some(EngineCommand::ExitNow) => {
                    if let Some(open) = position.take() {
                        if let Err(e) = close_position(&ctx, &open, None).await {
                            error!("{}: manual close failed: {}", ctx.symbol, e);
                            position = Some(open);
                        }
                    }
                }
            },
            _ = interval.tick() => {
                if let Err(e) = tick(&ctx, &mut position).await {
                    warn!("{}: tick failed: {}", ctx.symbol, e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    if !ctx.client.is_connected() {
                        info!("{}: client disconnected, attempting recovery", ctx.symbol);
                        if let Err(e) = ctx.client.connect().await {
                            error!("{}: recovery failed, trading stays halted: {}", ctx.symbol, e);
                        }
                    }
                }
            }
        }
    }

    write_log(
        &*ctx.logger,
        TradeLogEntry::marker(ctx.symbol.clone(), TradeEventKind::Stop),
    );
    info!("Trading loop stopped for {}", ctx.symbol);
}

async fn tick<C: BrokerClient>(
    ctx: &LoopCtx<C>,
    position: &mut Option<Position>,
) -> Result<(), TickError> {
    let bars = ctx
        .feed
        .latest_bars(&ctx.symbol, ctx.config.bar_count)
        .await
        .map_err(TickError::Feed)?;
    let price = match bars.last() {
        Some(bar) => bar.close,
        // An empty window is a quiet tick, not an error
        None => return Ok(()),
    };

    match position {
        None => {
            let signal = ctx.provider.evaluate(&ctx.symbol, &bars);
            if signal.should_trade && signal.position_size.is_positive() {
                let opened = open_position(ctx, price, &signal).await?;
                *position = Some(opened);
            }
        }
        Some(open) => {
            let decision = risk::evaluate(open, price, Utc::now(), &ctx.config.risk);
            if let Some(reason) = decision.full_exit {
                close_at(ctx, open, price, Some(reason)).await?;
                *position = None;
            } else if decision.partial_exit {
                partial_exit(ctx, open, price).await?;
            }
        }
    }
    Ok(())
}

/// Exit levels derived at entry time
///
/// The take profit is clamped at least one tick above entry so a coarse
/// tick size can never produce an unreachable or inverted target.
fn entry_levels(price: Price, signal: &Signal, min_tick: Price) -> (Price, Price) {
    let stop_loss = price.scaled_by(-signal.stop_loss_pct);
    let scaled_target = price.scaled_by(signal.take_profit_pct);
    let floor_target = price + min_tick;
    let take_profit = if scaled_target > floor_target {
        scaled_target
    } else {
        floor_target
    };
    (stop_loss, take_profit)
}

async fn open_position<C: BrokerClient>(
    ctx: &LoopCtx<C>,
    price: Price,
    signal: &Signal,
) -> Result<Position, TickError> {
    let min_tick = ctx.client.min_tick(&ctx.symbol);
    let (stop_loss, take_profit) = entry_levels(price, signal, min_tick);

    let intent = OrderIntent::market_buy(ctx.symbol.clone(), signal.position_size);
    ctx.client
        .submit_order(&intent)
        .await
        .map_err(|e| TickError::Client(e.to_string()))?;

    let position = Position::open(
        ctx.symbol.clone(),
        signal.position_size,
        price,
        stop_loss,
        take_profit,
        ctx.config.risk.trailing_stop_pct,
    );
    info!(
        "{}: entered {} @ {} (stop {}, target {}, confidence {:.2})",
        ctx.symbol, position.size, price, stop_loss, take_profit, signal.confidence
    );
    write_log(
        &*ctx.logger,
        TradeLogEntry {
            time: Utc::now(),
            symbol: ctx.symbol.clone(),
            kind: TradeEventKind::Entry,
            price: Some(price),
            size: Some(position.size),
            pl: None,
            exit_reason: None,
            confidence: Some(signal.confidence),
        },
    );
    Ok(position)
}

async fn close_position<C: BrokerClient>(
    ctx: &LoopCtx<C>,
    position: &Position,
    reason: Option<ExitReason>,
) -> Result<(), TickError> {
    let bars = ctx
        .feed
        .latest_bars(&ctx.symbol, 1)
        .await
        .map_err(TickError::Feed)?;
    let price = bars
        .last()
        .map(|bar| bar.close)
        .unwrap_or(position.entry_price);
    close_at(ctx, position, price, reason).await
}

async fn close_at<C: BrokerClient>(
    ctx: &LoopCtx<C>,
    position: &Position,
    price: Price,
    reason: Option<ExitReason>,
) -> Result<(), TickError> {
    let intent = OrderIntent::market_sell(ctx.symbol.clone(), position.size);
    ctx.client
        .submit_order(&intent)
        .await
        .map_err(|e| TickError::Client(e.to_string()))?;

    let pl = position.realized_pl(price, position.size);
    info!(
        "{}: exited {} @ {} ({}, P/L {})",
        ctx.symbol,
        position.size,
        price,
        reason.map(|r| r.as_str()).unwrap_or("manual"),
        pl
    );
    write_log(
        &*ctx.logger,
        TradeLogEntry {
            time: Utc::now(),
            symbol: ctx.symbol.clone(),
            kind: TradeEventKind::Exit,
            price: Some(price),
            size: Some(position.size),
            pl: Some(pl),
            exit_reason: reason,
            confidence: None,
        },
    );
    Ok(())
}

async fn partial_exit<C: BrokerClient>(
    ctx: &LoopCtx<C>,
    position: &mut Position,
    price: Price,
) -> Result<(), TickError> {
    let half = position.size.halved();
    let intent = OrderIntent::market_sell(ctx.symbol.clone(), half);
    ctx.client
        .submit_order(&intent)
        .await
        .map_err(|e| TickError::Client(e.to_string()))?;

    // Flags are only set once the sell went out, so a failed submit retries
    // on the next tick
    position.size = position.size - half;
    position.partially_exited = true;

    let pl = position.realized_pl(price, half);
    info!(
        "{}: partial exit {} @ {} (P/L {}), holding {}",
        ctx.symbol, half, price, pl, position.size
    );
    write_log(
        &*ctx.logger,
        TradeLogEntry {
            time: Utc::now(),
            symbol: ctx.symbol.clone(),
            kind: TradeEventKind::PartialExit,
            price: Some(price),
            size: Some(half),
            pl: Some(pl),
            exit_reason: Some(ExitReason::PartialExit),
            confidence: None,
        },
    );
    Ok(())
}

fn write_log(logger: &dyn TradeLogger, entry: TradeLogEntry) {
    if let Err(e) = logger.record(&entry) {
        warn!("Trade log write failed: {}", e);
    }
}

/// Failure inside a single tick; the loop logs it and backs off
#[derive(Debug)]
enum TickError {
    Feed(FeedError),
    Client(String),
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickError::Feed(e) => write!(f, "feed error: {}", e),
            TickError::Client(msg) => write!(f, "client error: {}", msg),
        }
    }
}

/// Engine-level error
#[derive(Debug, Clone)]
pub enum EngineError {
    AlreadyRunning(String),
    Config(ConfigError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::AlreadyRunning(symbol) => {
                write!(f, "Trading loop already running for {}", symbol)
            }
            EngineError::Config(e) => write!(f, "Engine configuration error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{OrderSide, PriceBar};
    use crate::engine::client::BrokerPosition;
    use crate::engine::trade_log::MemoryTradeLog;
    use crate::types::Size;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records orders, never fails
    #[derive(Default)]
    struct RecordingClient {
        orders: Mutex<Vec<OrderIntent>>,
    }

    impl RecordingClient {
        fn orders(&self) -> Vec<OrderIntent> {
            self.orders.lock().unwrap().clone()
        }
    }

    #[derive(Debug)]
    struct NoError;

    impl fmt::Display for NoError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "no error")
        }
    }

    impl std::error::Error for NoError {}

    #[async_trait]
    impl BrokerClient for RecordingClient {
        type Error = NoError;

        async fn connect(&self) -> Result<(), NoError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), NoError> {
            Ok(())
        }

        async fn get_bars(&self, _: &Symbol, _: u32) -> Result<Vec<PriceBar>, NoError> {
            Ok(Vec::new())
        }

        async fn submit_order(&self, intent: &OrderIntent) -> Result<(), NoError> {
            self.orders.lock().unwrap().push(intent.clone());
            Ok(())
        }

        async fn get_positions(&self) -> Result<Vec<BrokerPosition>, NoError> {
            Ok(Vec::new())
        }

        async fn get_tradable_symbols(&self) -> Result<Vec<Symbol>, NoError> {
            Ok(Vec::new())
        }

        fn min_tick(&self, _: &Symbol) -> Price {
            Price::new(dec!(0.01))
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    /// Serves scripted bar windows, repeating the last one forever
    struct ScriptedFeed {
        windows: Mutex<VecDeque<Vec<PriceBar>>>,
        last: Mutex<Vec<PriceBar>>,
    }

    impl ScriptedFeed {
        fn new(windows: Vec<Vec<PriceBar>>) -> Self {
            Self {
                windows: Mutex::new(windows.into()),
                last: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PriceFeed for ScriptedFeed {
        async fn latest_bars(&self, _: &Symbol, _: u32) -> Result<Vec<PriceBar>, FeedError> {
            let mut windows = self.windows.lock().unwrap();
            match windows.pop_front() {
                Some(window) => {
                    *self.last.lock().unwrap() = window.clone();
                    Ok(window)
                }
                None => Ok(self.last.lock().unwrap().clone()),
            }
        }
    }

    /// Emits the scripted signals in order, then holds off
    struct ScriptedProvider {
        signals: Mutex<VecDeque<Signal>>,
    }

    impl ScriptedProvider {
        fn new(signals: Vec<Signal>) -> Self {
            Self {
                signals: Mutex::new(signals.into()),
            }
        }
    }

    impl SignalProvider for ScriptedProvider {
        fn evaluate(&self, _: &Symbol, _: &[PriceBar]) -> Signal {
            self.signals
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(Signal::no_trade)
        }
    }

    fn window(close: rust_decimal::Decimal) -> Vec<PriceBar> {
        vec![PriceBar::new(
            0,
            Price::new(close),
            Price::new(close),
            Price::new(close),
            Price::new(close),
            Size::new(dec!(1000)),
        )]
    }

    fn entry_signal() -> Signal {
        Signal {
            should_trade: true,
            confidence: 0.8,
            stop_loss_pct: dec!(0.02),
            take_profit_pct: dec!(0.04),
            position_size: Size::new(dec!(100)),
        }
    }

    fn engine_over(
        client: Arc<RecordingClient>,
        feed: Arc<dyn PriceFeed>,
        provider: Arc<dyn SignalProvider>,
        logger: Arc<MemoryTradeLog>,
    ) -> PositionEngine<RecordingClient> {
        let config = EngineConfig {
            poll_interval: Duration::from_secs(1),
            ..Default::default()
        };
        PositionEngine::new(client, feed, provider, logger, config).unwrap()
    }

    #[test]
    fn test_entry_levels_and_min_tick_clamp() {
        let signal = entry_signal();
        let (stop, take) = entry_levels(Price::new(dec!(100)), &signal, Price::new(dec!(0.01)));
        assert_eq!(stop, Price::new(dec!(98.00)));
        assert_eq!(take, Price::new(dec!(104.00)));

        // A coarse tick overrides a tiny percentage target
        let tiny = Signal {
            take_profit_pct: dec!(0.0001),
            ..entry_signal()
        };
        let (_, take) = entry_levels(Price::new(dec!(100)), &tiny, Price::new(dec!(0.5)));
        assert_eq!(take, Price::new(dec!(100.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_then_stop_loss_exit() {
        let client = Arc::new(RecordingClient::default());
        let feed = Arc::new(ScriptedFeed::new(vec![
            window(dec!(100)),
            window(dec!(99)),
            window(dec!(97.5)),
        ]));
        let provider = Arc::new(ScriptedProvider::new(vec![entry_signal()]));
        let logger = Arc::new(MemoryTradeLog::new());
        let engine = engine_over(
            Arc::clone(&client),
            feed,
            provider,
            Arc::clone(&logger),
        );
        let symbol = Symbol::new("EURUSD");

        engine.start_symbol(symbol.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        engine.stop_symbol(&symbol).await;

        let orders = client.orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].quantity, Size::new(dec!(100)));
        assert_eq!(orders[1].side, OrderSide::Sell);
        assert_eq!(orders[1].quantity, Size::new(dec!(100)));

        let kinds: Vec<TradeEventKind> = logger.entries().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TradeEventKind::Start,
                TradeEventKind::Entry,
                TradeEventKind::Exit,
                TradeEventKind::Stop,
            ]
        );
        let exit = &logger.entries()[2];
        assert_eq!(exit.exit_reason, Some(ExitReason::StopLoss));
        assert_eq!(exit.pl, Some(dec!(-250.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_exit_happens_once_then_take_profit() {
        let client = Arc::new(RecordingClient::default());
        let feed = Arc::new(ScriptedFeed::new(vec![
            window(dec!(100)),
            window(dec!(103)),
            window(dec!(103)),
            window(dec!(104.5)),
        ]));
        let provider = Arc::new(ScriptedProvider::new(vec![entry_signal()]));
        let logger = Arc::new(MemoryTradeLog::new());
        let engine = engine_over(
            Arc::clone(&client),
            feed,
            provider,
            Arc::clone(&logger),
        );
        let symbol = Symbol::new("EURUSD");

        engine.start_symbol(symbol.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        engine.stop_symbol(&symbol).await;

        let orders = client.orders();
        // Buy 100, partial sell 50, final sell 50
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[1].side, OrderSide::Sell);
        assert_eq!(orders[1].quantity, Size::new(dec!(50)));
        assert_eq!(orders[2].quantity, Size::new(dec!(50)));

        let kinds: Vec<TradeEventKind> = logger.entries().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TradeEventKind::Start,
                TradeEventKind::Entry,
                TradeEventKind::PartialExit,
                TradeEventKind::Exit,
                TradeEventKind::Stop,
            ]
        );
        assert_eq!(
            logger.entries()[3].exit_reason,
            Some(ExitReason::TakeProfit)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_trade_signal_never_orders() {
        let client = Arc::new(RecordingClient::default());
        let feed = Arc::new(ScriptedFeed::new(vec![window(dec!(100))]));
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let logger = Arc::new(MemoryTradeLog::new());
        let engine = engine_over(
            Arc::clone(&client),
            feed,
            provider,
            Arc::clone(&logger),
        );
        let symbol = Symbol::new("EURUSD");

        engine.start_symbol(symbol.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        engine.stop_symbol(&symbol).await;

        assert!(client.orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_not_consulted_while_position_open() {
        use crate::signal::MockSignalProvider;

        let client = Arc::new(RecordingClient::default());
        let feed = Arc::new(ScriptedFeed::new(vec![
            window(dec!(100)),
            window(dec!(100.5)),
        ]));
        // One evaluation opens the position; while it is open the loop runs
        // the exit rules instead of asking for another signal
        let mut provider = MockSignalProvider::new();
        provider
            .expect_evaluate()
            .times(1)
            .return_const(entry_signal());
        let logger = Arc::new(MemoryTradeLog::new());
        let engine = engine_over(
            Arc::clone(&client),
            feed,
            Arc::new(provider),
            Arc::clone(&logger),
        );
        let symbol = Symbol::new("EURUSD");

        engine.start_symbol(symbol.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        engine.stop_symbol(&symbol).await;

        let orders = client.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_start_is_rejected() {
        let client = Arc::new(RecordingClient::default());
        let feed = Arc::new(ScriptedFeed::new(Vec::new()));
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let logger = Arc::new(MemoryTradeLog::new());
        let engine = engine_over(client, feed, provider, logger);
        let symbol = Symbol::new("EURUSD");

        engine.start_symbol(symbol.clone()).unwrap();
        assert!(matches!(
            engine.start_symbol(symbol.clone()),
            Err(EngineError::AlreadyRunning(_))
        ));
        assert_eq!(engine.running_symbols(), vec!["EURUSD".to_string()]);
        engine.stop_symbol(&symbol).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_risk_config_rejected_before_start() {
        let client = Arc::new(RecordingClient::default());
        let feed: Arc<dyn PriceFeed> = Arc::new(ScriptedFeed::new(Vec::new()));
        let provider: Arc<dyn SignalProvider> = Arc::new(ScriptedProvider::new(Vec::new()));
        let logger: Arc<MemoryTradeLog> = Arc::new(MemoryTradeLog::new());

        let mut config = EngineConfig::default();
        config.risk.stop_loss_pct = dec!(0.08);
        config.risk.take_profit_pct = dec!(0.04);
        assert!(PositionEngine::new(client, feed, provider, logger, config).is_err());
    }
}
