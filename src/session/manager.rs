use crate::auth::{AuthError, OAuthClient, Token, TokenStore, AUTHORIZATION_TIMEOUT};
use crate::broker::protocol::{ExecutionEvent, NewOrderReq};
use crate::broker::{
    BrokerError, BrokerEvent, MessageBroker, Transport, TransportError, WsTransport,
};
use crate::config::{AppConfig, Environment};
use crate::core::events::{OrderIntent, OrderSide, PriceBar};
use crate::engine::client::{BrokerClient, BrokerPosition};
use crate::types::{Price, Symbol};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connection lifecycle, from cold start to a tradable session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    AwaitingAuthorizationCode,
    ExchangingCode,
    ServiceStarting,
    AppAuthenticated,
    AccountAuthenticating,
    AccountAuthenticated,
    SymbolsLoading,
    Ready,
}

/// State plus the last recorded error, published on every transition
pub type SessionSnapshot = (SessionState, Option<String>);

/// Builds a fresh transport for each service start
pub type TransportFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Transport>, TransportError>> + Send + Sync>;

/// Owns authentication, the broker handshake and reconnection policy
///
/// `Disconnected` is re-entrant: any pre-`Ready` failure tears the session
/// back down to it with the error recorded on the watch channel. Auth-coded
/// broker errors always cause a full disconnect, never a silent retry.
pub struct SessionManager {
    config: AppConfig,
    oauth: OAuthClient,
    store: TokenStore,
    transport_factory: TransportFactory,
    token: RwLock<Option<Token>>,
    broker: RwLock<Option<Arc<MessageBroker>>>,
    account_id: RwLock<Option<i64>>,
    positions: Arc<DashMap<String, BrokerPosition>>,
    account_auth_sent: StdMutex<bool>,
    state_tx: Arc<watch::Sender<SessionSnapshot>>,
    state_rx: watch::Receiver<SessionSnapshot>,
    reconnect_guard: Mutex<()>,
    monitor: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Session over the environment's WebSocket endpoint
    pub fn new(config: AppConfig) -> Self {
        let url = config.environment.ws_url().to_string();
        let factory: TransportFactory = Arc::new(move || {
            let url = url.clone();
            Box::pin(async move {
                let transport = WsTransport::connect(&url).await?;
                Ok(Arc::new(transport) as Arc<dyn Transport>)
            })
        });
        Self::with_transport_factory(config, factory)
    }

    /// Session over an injected transport, used by tests
    pub fn with_transport_factory(config: AppConfig, transport_factory: TransportFactory) -> Self {
        let oauth = OAuthClient::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.auth_url.clone(),
            config.token_url.clone(),
            config.redirect_uri.clone(),
            config.scope.clone(),
        );
        let store = TokenStore::new(config.token_path.clone());
        let (state_tx, state_rx) = watch::channel((SessionState::Disconnected, None));
        Self {
            config,
            oauth,
            store,
            transport_factory,
            token: RwLock::new(None),
            broker: RwLock::new(None),
            account_id: RwLock::new(None),
            positions: Arc::new(DashMap::new()),
            account_auth_sent: StdMutex::new(false),
            state_tx: Arc::new(state_tx),
            state_rx,
            reconnect_guard: Mutex::new(()),
            monitor: StdMutex::new(None),
        }
    }

    /// Observe state transitions and the last recorded error
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_rx.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().0
    }

    /// Full connect: token acquisition, then the service-start handshake
    ///
    /// Shares the reconnect guard, so at most one connection attempt runs
    /// at a time across every calling context. A concurrent caller gets
    /// `ReconnectInProgress` instead of a second interleaved handshake.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let _guard = match self.reconnect_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Err(SessionError::ReconnectInProgress),
        };
        self.connect_locked().await
    }

    async fn connect_locked(&self) -> Result<(), SessionError> {
        let token = match self.acquire_token().await {
            Ok(token) => token,
            Err(e) => {
                self.teardown(Some(e.to_string())).await;
                return Err(e);
            }
        };
        if let Err(e) = self.service_start(&token).await {
            self.teardown(Some(e.to_string())).await;
            return Err(e);
        }
        Ok(())
    }

    /// Recover a lost session: verify, then silent refresh + restart, then
    /// escalate to the full authorization flow
    ///
    /// Attempts are serialized; a second caller gets an error instead of a
    /// concurrent attempt. Failures are recorded and reported, never looped.
    pub async fn reconnect(&self) -> Result<(), SessionError> {
        let _guard = match self.reconnect_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Err(SessionError::ReconnectInProgress),
        };

        if self.verify_session().await {
            info!("session still healthy, reconnect skipped");
            return Ok(());
        }

        self.teardown(None).await;

        if let Some(stored) = self.current_token().or_else(|| self.store.load()) {
            if let Some(refresh) = stored.refresh_token.clone() {
                match self.oauth.refresh(&refresh).await {
                    Ok(token) => {
                        self.persist(&token)?;
                        match self.service_start(&token).await {
                            Ok(()) => return Ok(()),
                            Err(e) => {
                                warn!(error = %e, "restart after silent refresh failed");
                                self.teardown(Some(e.to_string())).await;
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "silent refresh failed, escalating"),
                }
            }
        }

        match self.full_connect_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.teardown(Some(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn full_connect_inner(&self) -> Result<(), SessionError> {
        let token = self.full_authorization().await?;
        self.service_start(&token).await
    }

    async fn verify_session(&self) -> bool {
        let broker = match self.current_broker() {
            Some(broker) => broker,
            None => return false,
        };
        if !broker.is_connected() {
            return false;
        }
        let account_id = match self.current_account() {
            Some(id) => id,
            None => return false,
        };
        broker.trader_info(account_id).await.is_ok()
    }

    async fn acquire_token(&self) -> Result<Token, SessionError> {
        if let Some(stored) = self.store.load() {
            if !stored.is_expired() {
                info!("using stored access token");
                self.remember(&stored);
                return Ok(stored);
            }
            if let Some(refresh) = stored.refresh_token.clone() {
                info!("stored token expired, attempting silent refresh");
                match self.oauth.refresh(&refresh).await {
                    Ok(token) => {
                        self.persist(&token)?;
                        return Ok(token);
                    }
                    Err(e) => {
                        warn!(error = %e, "silent refresh failed, falling back to full flow")
                    }
                }
            }
        }
        self.full_authorization().await
    }

    async fn full_authorization(&self) -> Result<Token, SessionError> {
        self.set_state(SessionState::AwaitingAuthorizationCode, None);
        info!(
            url = %self.oauth.authorization_url(),
            "open this URL in a browser to authorize the application"
        );
        let code = self
            .oauth
            .wait_for_authorization_code(AUTHORIZATION_TIMEOUT)
            .await?;

        self.set_state(SessionState::ExchangingCode, None);
        let token = self.oauth.exchange_code(&code).await?;
        self.persist(&token)?;
        Ok(token)
    }

    /// Transport start plus the authentication handshake up to `Ready`
    async fn service_start(&self, token: &Token) -> Result<(), SessionError> {
        self.set_state(SessionState::ServiceStarting, None);
        *self.account_auth_sent.lock().unwrap() = false;

        let transport = (self.transport_factory)().await?;
        let broker = Arc::new(MessageBroker::new(transport));
        broker.start();
        self.spawn_monitor(&broker);
        *self.broker.write().unwrap() = Some(Arc::clone(&broker));

        broker
            .app_auth(&self.config.client_id, self.config.client_secret.expose())
            .await?;
        self.set_state(SessionState::AppAuthenticated, None);

        self.set_state(SessionState::AccountAuthenticating, None);
        let account_id = match self.config.account_id {
            Some(id) => id,
            None => self.pick_account(&broker, token).await?,
        };

        // At most one account-auth send per service start, whatever the
        // broker echoes back
        let already_sent = {
            let mut sent = self.account_auth_sent.lock().unwrap();
            std::mem::replace(&mut *sent, true)
        };
        if already_sent {
            debug!("account auth already sent for this service start");
        } else {
            broker.account_auth(account_id, &token.access_token).await?;
        }
        *self.account_id.write().unwrap() = Some(account_id);
        self.set_state(SessionState::AccountAuthenticated, None);

        let details = broker.trader_info(account_id).await?;
        info!(account = account_id, balance = %details.balance, "account authenticated");

        self.set_state(SessionState::SymbolsLoading, None);
        broker.symbols_list(account_id).await?;
        let wanted: Vec<i64> = self
            .config
            .symbols
            .iter()
            .filter_map(|name| broker.symbol_id_for(name))
            .collect();
        if !wanted.is_empty() {
            broker.symbol_details(account_id, wanted.clone()).await?;
            // Spot streaming is a nicety; polling still works without it
            if let Err(e) = broker.subscribe_spots(account_id, wanted).await {
                warn!(error = %e, "spot subscription failed");
            }
        }

        self.set_state(SessionState::Ready, None);
        info!("session ready");
        Ok(())
    }

    async fn pick_account(
        &self,
        broker: &MessageBroker,
        token: &Token,
    ) -> Result<i64, SessionError> {
        let accounts = broker.get_account_list(&token.access_token).await?;
        let want_live = self.config.environment == Environment::Live;
        let chosen = accounts
            .iter()
            .find(|account| account.is_live == want_live)
            .or_else(|| accounts.first())
            .ok_or(SessionError::NoAccounts)?;
        info!(account = chosen.ctid_trader_account_id, "resolved account from account list");
        Ok(chosen.ctid_trader_account_id)
    }

    fn spawn_monitor(&self, broker: &Arc<MessageBroker>) {
        let mut events = broker.subscribe_events();
        let broker = Arc::clone(broker);
        let state_tx = Arc::clone(&self.state_tx);
        let positions = Arc::clone(&self.positions);

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(BrokerEvent::Execution(execution)) => {
                        apply_execution(&broker, &positions, &execution);
                    }
                    Ok(BrokerEvent::ServerError(err)) if err.is_auth_error() => {
                        warn!(code = %err.error_code, "authentication lost, disconnecting");
                        broker.close().await;
                        let _ = state_tx.send((
                            SessionState::Disconnected,
                            Some(format!("{}: {}", err.error_code, err.description)),
                        ));
                        break;
                    }
                    Ok(BrokerEvent::Disconnected) => {
                        let _ = state_tx.send((
                            SessionState::Disconnected,
                            Some("connection lost".to_string()),
                        ));
                        break;
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut slot = self.monitor.lock().unwrap();
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    fn persist(&self, token: &Token) -> Result<(), SessionError> {
        self.store
            .save(token)
            .map_err(|e| SessionError::Store(e.to_string()))?;
        self.remember(token);
        Ok(())
    }

    fn remember(&self, token: &Token) {
        *self.token.write().unwrap() = Some(token.clone());
    }

    fn current_token(&self) -> Option<Token> {
        self.token.read().unwrap().clone()
    }

    fn current_broker(&self) -> Option<Arc<MessageBroker>> {
        self.broker.read().unwrap().clone()
    }

    fn current_account(&self) -> Option<i64> {
        *self.account_id.read().unwrap()
    }

    fn ready_broker(&self) -> Result<(Arc<MessageBroker>, i64), SessionError> {
        let broker = self.current_broker().ok_or(SessionError::NotReady)?;
        let account_id = self.current_account().ok_or(SessionError::NotReady)?;
        Ok((broker, account_id))
    }

    fn set_state(&self, state: SessionState, error: Option<String>) {
        info!(state = ?state, "session state");
        let _ = self.state_tx.send((state, error));
    }

    async fn teardown(&self, error: Option<String>) {
        let broker = self.broker.write().unwrap().take();
        if let Some(broker) = broker {
            broker.close().await;
        }
        if let Some(monitor) = self.monitor.lock().unwrap().take() {
            monitor.abort();
        }
        self.set_state(SessionState::Disconnected, error);
    }

    async fn map_broker_error(&self, err: BrokerError) -> SessionError {
        if err.is_auth_error() {
            warn!(error = %err, "authentication-class error, tearing session down");
            self.teardown(Some(err.to_string())).await;
        }
        SessionError::Broker(err)
    }
}

/// Fold a fill into the broker-side position view
fn apply_execution(
    broker: &MessageBroker,
    positions: &DashMap<String, BrokerPosition>,
    execution: &ExecutionEvent,
) {
    let (side, volume) = match (execution.trade_side, execution.filled_volume) {
        (Some(side), Some(volume)) => (side, volume),
        _ => return,
    };
    let name = match broker.symbol_name_for(execution.symbol_id) {
        Some(name) => name,
        None => return,
    };
    match side {
        OrderSide::Buy => {
            let price = execution
                .execution_price
                .unwrap_or_else(|| Price::new(Decimal::ZERO));
            positions
                .entry(name.clone())
                .and_modify(|position| position.size = position.size + volume)
                .or_insert(BrokerPosition {
                    symbol: Symbol::new(name),
                    side: OrderSide::Buy,
                    size: volume,
                    entry_price: price,
                });
        }
        OrderSide::Sell => {
            let remove = positions
                .get_mut(&name)
                .map(|mut position| {
                    position.size = position.size - volume;
                    !position.size.is_positive()
                })
                .unwrap_or(false);
            if remove {
                positions.remove(&name);
            }
        }
    }
}

#[async_trait]
impl BrokerClient for SessionManager {
    type Error = SessionError;

    async fn connect(&self) -> Result<(), SessionError> {
        // Recovery entry point for the trading loops. Every symbol loop
        // shares this session, so an attempt already in flight from another
        // loop is a quiet skip, not a failure.
        match self.reconnect().await {
            Err(SessionError::ReconnectInProgress) => {
                info!("reconnect already in flight, skipping");
                Ok(())
            }
            other => other,
        }
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.teardown(None).await;
        Ok(())
    }

    async fn get_bars(&self, symbol: &Symbol, count: u32) -> Result<Vec<PriceBar>, SessionError> {
        let (broker, account_id) = self.ready_broker()?;
        let symbol_id = broker
            .symbol_id_for(symbol.as_str())
            .ok_or_else(|| SessionError::UnknownSymbol(symbol.to_string()))?;
        match broker
            .get_bars(account_id, symbol_id, &self.config.bar_period, count)
            .await
        {
            Ok(bars) => Ok(bars),
            Err(e) => Err(self.map_broker_error(e).await),
        }
    }

    async fn submit_order(&self, intent: &OrderIntent) -> Result<(), SessionError> {
        let (broker, account_id) = self.ready_broker()?;
        let symbol_id = broker
            .symbol_id_for(intent.symbol.as_str())
            .ok_or_else(|| SessionError::UnknownSymbol(intent.symbol.to_string()))?;
        let order = NewOrderReq {
            ctid_trader_account_id: account_id,
            symbol_id,
            trade_side: intent.side,
            volume: intent.quantity,
            time_in_force: intent.time_in_force,
            client_order_id: intent
                .client_order_id
                .clone()
                .unwrap_or_else(|| broker.new_client_order_id()),
        };
        match broker.submit_order(order).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.map_broker_error(e).await),
        }
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, SessionError> {
        Ok(self
            .positions
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_tradable_symbols(&self) -> Result<Vec<Symbol>, SessionError> {
        let (broker, _) = self.ready_broker()?;
        Ok(broker.symbol_names().into_iter().map(Symbol::new).collect())
    }

    fn min_tick(&self, symbol: &Symbol) -> Price {
        if let Some(broker) = self.current_broker() {
            if let Some(details) = broker
                .symbol_id_for(symbol.as_str())
                .and_then(|id| broker.details_for(id))
            {
                return Price::new(Decimal::new(1, details.digits));
            }
        }
        // One cent when the symbol has no published precision
        Price::new(Decimal::new(1, 2))
    }

    fn is_connected(&self) -> bool {
        self.current_broker()
            .map(|broker| broker.is_connected())
            .unwrap_or(false)
    }
}

/// Session-level error
#[derive(Debug, Clone)]
pub enum SessionError {
    Auth(AuthError),
    Broker(BrokerError),
    Transport(TransportError),
    Store(String),
    NoAccounts,
    NotReady,
    UnknownSymbol(String),
    ReconnectInProgress,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Auth(e) => write!(f, "Authentication failed: {}", e),
            SessionError::Broker(e) => write!(f, "Broker error: {}", e),
            SessionError::Transport(e) => write!(f, "Transport error: {}", e),
            SessionError::Store(msg) => write!(f, "Token store error: {}", msg),
            SessionError::NoAccounts => write!(f, "No trading accounts available"),
            SessionError::NotReady => write!(f, "Session is not ready"),
            SessionError::UnknownSymbol(symbol) => write!(f, "Unknown symbol: {}", symbol),
            SessionError::ReconnectInProgress => {
                write!(f, "A reconnection attempt is already in flight")
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<AuthError> for SessionError {
    fn from(e: AuthError) -> Self {
        SessionError::Auth(e)
    }
}

impl From<BrokerError> for SessionError {
    fn from(e: BrokerError) -> Self {
        SessionError::Broker(e)
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        SessionError::Transport(e)
    }
}
