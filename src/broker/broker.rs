use crate::broker::protocol::{
    AccountAuthReq, AccountAuthRes, AccountSummary, ApplicationAuthReq, Envelope, ErrorResponse,
    ExecutionEvent, GetAccountListReq, GetBarsReq, NewOrderReq, Payload, SpotEvent,
    SubscribeSpotsReq, SymbolDetails, SymbolDetailsReq, SymbolEntry, SymbolsListReq,
    TraderDetails, TraderInfoReq,
};
use crate::broker::transport::{Transport, TransportError};
use crate::core::events::PriceBar;
use crate::types::Price;
use dashmap::DashMap;
use log::{debug, trace, warn};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use uuid::Uuid;

/// How long a correlated request may wait for its response
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Unsolicited broker traffic surfaced to subscribers
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    Spot(SpotEvent),
    Execution(ExecutionEvent),
    TraderUpdated(TraderDetails),
    ServerError(ErrorResponse),
    Disconnected,
}

/// Request/response correlation and event dispatch over a [`Transport`]
///
/// Message ids are assigned monotonically at send time. The inbound
/// dispatcher routes correlated payloads to the matching pending call and
/// everything else to the standing event channel; heartbeats never surface.
/// Symbol catalog, symbol details, bar and spot caches are updated as a
/// byproduct of inbound traffic.
pub struct MessageBroker {
    transport: Arc<dyn Transport>,
    next_id: AtomicU64,
    pending: Arc<DashMap<u64, oneshot::Sender<Payload>>>,
    events: broadcast::Sender<BrokerEvent>,
    symbol_ids: Arc<DashMap<String, i64>>,
    symbol_details: Arc<DashMap<i64, SymbolDetails>>,
    bars: Arc<DashMap<i64, Vec<PriceBar>>>,
    last_spot: Arc<DashMap<i64, Price>>,
    dispatcher: StdMutex<Option<JoinHandle<()>>>,
}

impl MessageBroker {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            next_id: AtomicU64::new(0),
            pending: Arc::new(DashMap::new()),
            events,
            symbol_ids: Arc::new(DashMap::new()),
            symbol_details: Arc::new(DashMap::new()),
            bars: Arc::new(DashMap::new()),
            last_spot: Arc::new(DashMap::new()),
            dispatcher: StdMutex::new(None),
        }
    }

    /// Spawn the inbound dispatcher; must be called once before any request
    pub fn start(&self) {
        let transport = Arc::clone(&self.transport);
        let pending = Arc::clone(&self.pending);
        let events = self.events.clone();
        let symbol_ids = Arc::clone(&self.symbol_ids);
        let symbol_details = Arc::clone(&self.symbol_details);
        let bars = Arc::clone(&self.bars);
        let last_spot = Arc::clone(&self.last_spot);

        let handle = tokio::spawn(async move {
            loop {
                match transport.recv().await {
                    Ok(envelope) => {
                        dispatch(
                            envelope,
                            &pending,
                            &events,
                            &symbol_ids,
                            &symbol_details,
                            &bars,
                            &last_spot,
                        );
                    }
                    Err(TransportError::Malformed(msg)) => {
                        warn!("Dropping malformed inbound message: {}", msg);
                    }
                    Err(e) => {
                        warn!("Transport lost, failing {} pending calls: {}", pending.len(), e);
                        // Dropping the senders resolves every waiter with a
                        // connectivity error
                        pending.clear();
                        let _ = events.send(BrokerEvent::Disconnected);
                        break;
                    }
                }
            }
        });

        let mut slot = self.dispatcher.lock().unwrap();
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Send a correlated request and wait for its response
    pub async fn request(&self, payload: Payload) -> Result<Payload, BrokerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        trace!("-> [{}] {}", id, payload.kind());
        if let Err(e) = self.transport.send(Envelope::request(id, payload)).await {
            self.pending.remove(&id);
            return Err(BrokerError::Transport(e));
        }

        match timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(Payload::ErrorResponse(err))) => Err(BrokerError::Server {
                code: err.error_code,
                description: err.description,
            }),
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(BrokerError::Disconnected),
            Err(_) => {
                self.pending.remove(&id);
                Err(BrokerError::Timeout)
            }
        }
    }

    pub async fn app_auth(&self, client_id: &str, client_secret: &str) -> Result<(), BrokerError> {
        let res = self
            .request(Payload::ApplicationAuthReq(ApplicationAuthReq {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            }))
            .await?;
        match res {
            Payload::ApplicationAuthRes(_) => Ok(()),
            other => Err(BrokerError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn account_auth(
        &self,
        account_id: i64,
        access_token: &str,
    ) -> Result<AccountAuthRes, BrokerError> {
        let res = self
            .request(Payload::AccountAuthReq(AccountAuthReq {
                ctid_trader_account_id: account_id,
                access_token: access_token.to_string(),
            }))
            .await?;
        match res {
            Payload::AccountAuthRes(res) => Ok(res),
            other => Err(BrokerError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn get_account_list(
        &self,
        access_token: &str,
    ) -> Result<Vec<AccountSummary>, BrokerError> {
        let res = self
            .request(Payload::GetAccountListReq(GetAccountListReq {
                access_token: access_token.to_string(),
            }))
            .await?;
        match res {
            Payload::GetAccountListRes(res) => Ok(res.accounts),
            other => Err(BrokerError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn trader_info(&self, account_id: i64) -> Result<TraderDetails, BrokerError> {
        let res = self
            .request(Payload::TraderInfoReq(TraderInfoReq {
                ctid_trader_account_id: account_id,
            }))
            .await?;
        match res {
            Payload::TraderInfoRes(res) => Ok(res.trader),
            other => Err(BrokerError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn symbols_list(&self, account_id: i64) -> Result<Vec<SymbolEntry>, BrokerError> {
        let res = self
            .request(Payload::SymbolsListReq(SymbolsListReq {
                ctid_trader_account_id: account_id,
            }))
            .await?;
        match res {
            Payload::SymbolsListRes(res) => Ok(res.symbols),
            other => Err(BrokerError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn symbol_details(
        &self,
        account_id: i64,
        symbol_ids: Vec<i64>,
    ) -> Result<Vec<SymbolDetails>, BrokerError> {
        let res = self
            .request(Payload::SymbolDetailsReq(SymbolDetailsReq {
                ctid_trader_account_id: account_id,
                symbol_ids,
            }))
            .await?;
        match res {
            Payload::SymbolDetailsRes(res) => Ok(res.details),
            other => Err(BrokerError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn subscribe_spots(
        &self,
        account_id: i64,
        symbol_ids: Vec<i64>,
    ) -> Result<(), BrokerError> {
        let res = self
            .request(Payload::SubscribeSpotsReq(SubscribeSpotsReq {
                ctid_trader_account_id: account_id,
                symbol_ids,
            }))
            .await?;
        match res {
            Payload::SubscribeSpotsRes(_) => Ok(()),
            other => Err(BrokerError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn get_bars(
        &self,
        account_id: i64,
        symbol_id: i64,
        period: &str,
        count: u32,
    ) -> Result<Vec<PriceBar>, BrokerError> {
        let res = self
            .request(Payload::GetBarsReq(GetBarsReq {
                ctid_trader_account_id: account_id,
                symbol_id,
                period: period.to_string(),
                count,
            }))
            .await?;
        match res {
            Payload::GetBarsRes(res) => Ok(res.bars),
            other => Err(BrokerError::UnexpectedResponse(other.kind())),
        }
    }

    /// Submit an order; the fill (or rejection) arrives later as an
    /// [`BrokerEvent::Execution`]
    pub async fn submit_order(&self, order: NewOrderReq) -> Result<(), BrokerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "-> [{}] NewOrderReq {:?} symbol {} volume {}",
            id, order.trade_side, order.symbol_id, order.volume
        );
        self.transport
            .send(Envelope::request(id, Payload::NewOrderReq(order)))
            .await
            .map_err(BrokerError::Transport)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.events.subscribe()
    }

    pub fn symbol_id_for(&self, name: &str) -> Option<i64> {
        self.symbol_ids.get(name).map(|entry| *entry.value())
    }

    pub fn symbol_name_for(&self, symbol_id: i64) -> Option<String> {
        self.symbol_ids
            .iter()
            .find(|entry| *entry.value() == symbol_id)
            .map(|entry| entry.key().clone())
    }

    /// Names of every symbol seen in the catalog so far
    pub fn symbol_names(&self) -> Vec<String> {
        self.symbol_ids
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn details_for(&self, symbol_id: i64) -> Option<SymbolDetails> {
        self.symbol_details
            .get(&symbol_id)
            .map(|entry| entry.value().clone())
    }

    pub fn cached_bars(&self, symbol_id: i64) -> Option<Vec<PriceBar>> {
        self.bars.get(&symbol_id).map(|entry| entry.value().clone())
    }

    pub fn last_price(&self, symbol_id: i64) -> Option<Price> {
        self.last_spot.get(&symbol_id).map(|entry| *entry.value())
    }

    pub fn new_client_order_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Tear down the transport; the dispatcher exits on its own once the
    /// stream closes
    pub async fn close(&self) {
        self.transport.close().await;
        self.pending.clear();
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch(
    envelope: Envelope,
    pending: &DashMap<u64, oneshot::Sender<Payload>>,
    events: &broadcast::Sender<BrokerEvent>,
    symbol_ids: &DashMap<String, i64>,
    symbol_details: &DashMap<i64, SymbolDetails>,
    bars: &DashMap<i64, Vec<PriceBar>>,
    last_spot: &DashMap<i64, Price>,
) {
    if envelope.payload.is_heartbeat() {
        trace!("<- heartbeat");
        return;
    }

    // Cache side effects happen before correlation so callers and the
    // dispatcher observe the same state
    match &envelope.payload {
        Payload::SymbolsListRes(res) => {
            for symbol in &res.symbols {
                symbol_ids.insert(symbol.symbol_name.clone(), symbol.symbol_id);
            }
        }
        Payload::SymbolDetailsRes(res) => {
            for details in &res.details {
                symbol_details.insert(details.symbol_id, details.clone());
            }
        }
        Payload::GetBarsRes(res) => {
            bars.insert(res.symbol_id, res.bars.clone());
        }
        Payload::SpotEvent(spot) => {
            if let Some(bid) = spot.bid {
                last_spot.insert(spot.symbol_id, bid);
            }
        }
        _ => {}
    }

    if let Some(id) = envelope.msg_id {
        if let Some((_, tx)) = pending.remove(&id) {
            trace!("<- [{}] {}", id, envelope.payload.kind());
            let _ = tx.send(envelope.payload);
            return;
        }
        // Late or duplicate responses have no waiter left
        debug!(
            "Dropping uncorrelated response [{}] {}",
            id,
            envelope.payload.kind()
        );
        return;
    }

    match envelope.payload {
        Payload::SpotEvent(spot) => {
            let _ = events.send(BrokerEvent::Spot(spot));
        }
        Payload::ExecutionEvent(execution) => {
            let _ = events.send(BrokerEvent::Execution(execution));
        }
        Payload::TraderUpdatedEvent(update) => {
            let _ = events.send(BrokerEvent::TraderUpdated(update.trader));
        }
        Payload::ErrorResponse(err) => {
            warn!("Broker error event {}: {}", err.error_code, err.description);
            let _ = events.send(BrokerEvent::ServerError(err));
        }
        other => {
            debug!("Dropping unexpected uncorrelated {}", other.kind());
        }
    }
}

/// Broker-layer error
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerError {
    Transport(TransportError),
    Timeout,
    Disconnected,
    UnexpectedResponse(&'static str),
    Server { code: String, description: String },
}

impl BrokerError {
    /// True when the failure invalidates the authenticated session
    pub fn is_auth_error(&self) -> bool {
        match self {
            BrokerError::Server { code, .. } => ErrorResponse {
                error_code: code.clone(),
                description: String::new(),
            }
            .is_auth_error(),
            _ => false,
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::Transport(e) => write!(f, "Transport error: {}", e),
            BrokerError::Timeout => write!(f, "Request timed out"),
            BrokerError::Disconnected => write!(f, "Connection lost before response"),
            BrokerError::UnexpectedResponse(kind) => {
                write!(f, "Unexpected response payload: {}", kind)
            }
            BrokerError::Server { code, description } => {
                write!(f, "Broker rejected request ({}): {}", code, description)
            }
        }
    }
}

impl std::error::Error for BrokerError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::mock::MockTransport;
    use crate::broker::protocol::{TraderInfoRes, TraderUpdatedEvent};
    use rust_decimal_macros::dec;

    fn trader(balance: rust_decimal::Decimal) -> TraderDetails {
        TraderDetails {
            ctid_trader_account_id: 42,
            balance: Price::new(balance),
            deposit_currency: None,
        }
    }

    fn broker_over(transport: Arc<MockTransport>) -> MessageBroker {
        let broker = MessageBroker::new(transport);
        broker.start();
        broker
    }

    #[tokio::test]
    async fn test_request_correlates_by_message_id() {
        let transport = Arc::new(MockTransport::new());
        transport.set_responder(|envelope| {
            vec![Envelope {
                msg_id: envelope.msg_id,
                payload: Payload::TraderInfoRes(TraderInfoRes {
                    trader: TraderDetails {
                        ctid_trader_account_id: 42,
                        balance: Price::new(dec!(1000)),
                        deposit_currency: None,
                    },
                }),
            }]
        });
        let broker = broker_over(Arc::clone(&transport));

        let details = broker.trader_info(42).await.unwrap();
        assert_eq!(details.ctid_trader_account_id, 42);

        // Ids are assigned monotonically at send time
        broker.trader_info(42).await.unwrap();
        let sent = transport.sent();
        assert_eq!(sent[0].msg_id, Some(1));
        assert_eq!(sent[1].msg_id, Some(2));
    }

    #[tokio::test]
    async fn test_heartbeats_are_swallowed() {
        let transport = Arc::new(MockTransport::new());
        transport.set_responder(|envelope| {
            vec![
                Envelope::event(Payload::Heartbeat),
                Envelope {
                    msg_id: envelope.msg_id,
                    payload: Payload::ApplicationAuthRes(Default::default()),
                },
            ]
        });
        let broker = broker_over(Arc::clone(&transport));
        let mut events = broker.subscribe_events();

        broker.app_auth("id", "secret").await.unwrap();

        // The heartbeat must not have surfaced as an event
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_error_response_maps_to_server_error() {
        let transport = Arc::new(MockTransport::new());
        transport.set_responder(|envelope| {
            vec![Envelope {
                msg_id: envelope.msg_id,
                payload: Payload::ErrorResponse(ErrorResponse {
                    error_code: "NOT_AUTHENTICATED".to_string(),
                    description: "token invalid".to_string(),
                }),
            }]
        });
        let broker = broker_over(transport);

        let err = broker.trader_info(42).await.unwrap_err();
        assert!(err.is_auth_error());
        assert!(matches!(err, BrokerError::Server { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_calls() {
        let transport = Arc::new(MockTransport::new());
        let broker = Arc::new(broker_over(Arc::clone(&transport)));

        let waiting = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.trader_info(42).await })
        };
        tokio::task::yield_now().await;

        transport.drop_connection();

        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            BrokerError::Disconnected | BrokerError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn test_unsolicited_events_reach_subscribers() {
        let transport = Arc::new(MockTransport::new());
        let broker = broker_over(Arc::clone(&transport));
        let mut events = broker.subscribe_events();

        transport.push_inbound(Envelope::event(Payload::TraderUpdatedEvent(
            TraderUpdatedEvent {
                trader: trader(dec!(2500)),
            },
        )));

        match events.recv().await.unwrap() {
            BrokerEvent::TraderUpdated(details) => {
                assert_eq!(details.balance, Price::new(dec!(2500)))
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_symbol_catalog_cached_from_responses() {
        let transport = Arc::new(MockTransport::new());
        transport.set_responder(|envelope| {
            vec![Envelope {
                msg_id: envelope.msg_id,
                payload: Payload::SymbolsListRes(crate::broker::protocol::SymbolsListRes {
                    symbols: vec![SymbolEntry {
                        symbol_id: 7,
                        symbol_name: "EURUSD".to_string(),
                        enabled: true,
                    }],
                }),
            }]
        });
        let broker = broker_over(transport);

        broker.symbols_list(42).await.unwrap();
        assert_eq!(broker.symbol_id_for("EURUSD"), Some(7));
        assert_eq!(broker.symbol_id_for("GBPUSD"), None);
    }
}
