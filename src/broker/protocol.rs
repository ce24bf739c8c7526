use crate::core::events::{OrderSide, PriceBar, TimeInForce};
use crate::types::{Price, Size};
use serde::{Deserialize, Serialize};

/// Wire envelope: an optional correlation id plus a tagged payload
///
/// Requests carry `msgId`; unsolicited events arrive without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "msgId", default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    pub fn event(payload: Payload) -> Self {
        Self {
            msg_id: None,
            payload,
        }
    }

    pub fn request(msg_id: u64, payload: Payload) -> Self {
        Self {
            msg_id: Some(msg_id),
            payload,
        }
    }
}

/// Protocol message catalog, discriminated by `payloadType` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payloadType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    ApplicationAuthReq(ApplicationAuthReq),
    ApplicationAuthRes(ApplicationAuthRes),
    AccountAuthReq(AccountAuthReq),
    AccountAuthRes(AccountAuthRes),
    GetAccountListReq(GetAccountListReq),
    GetAccountListRes(GetAccountListRes),
    TraderInfoReq(TraderInfoReq),
    TraderInfoRes(TraderInfoRes),
    TraderUpdatedEvent(TraderUpdatedEvent),
    SymbolsListReq(SymbolsListReq),
    SymbolsListRes(SymbolsListRes),
    SymbolDetailsReq(SymbolDetailsReq),
    SymbolDetailsRes(SymbolDetailsRes),
    SubscribeSpotsReq(SubscribeSpotsReq),
    SubscribeSpotsRes(SubscribeSpotsRes),
    SpotEvent(SpotEvent),
    NewOrderReq(NewOrderReq),
    ExecutionEvent(ExecutionEvent),
    GetBarsReq(GetBarsReq),
    GetBarsRes(GetBarsRes),
    Heartbeat,
    ErrorResponse(ErrorResponse),
}

impl Payload {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::ApplicationAuthReq(_) => "ApplicationAuthReq",
            Payload::ApplicationAuthRes(_) => "ApplicationAuthRes",
            Payload::AccountAuthReq(_) => "AccountAuthReq",
            Payload::AccountAuthRes(_) => "AccountAuthRes",
            Payload::GetAccountListReq(_) => "GetAccountListReq",
            Payload::GetAccountListRes(_) => "GetAccountListRes",
            Payload::TraderInfoReq(_) => "TraderInfoReq",
            Payload::TraderInfoRes(_) => "TraderInfoRes",
            Payload::TraderUpdatedEvent(_) => "TraderUpdatedEvent",
            Payload::SymbolsListReq(_) => "SymbolsListReq",
            Payload::SymbolsListRes(_) => "SymbolsListRes",
            Payload::SymbolDetailsReq(_) => "SymbolDetailsReq",
            Payload::SymbolDetailsRes(_) => "SymbolDetailsRes",
            Payload::SubscribeSpotsReq(_) => "SubscribeSpotsReq",
            Payload::SubscribeSpotsRes(_) => "SubscribeSpotsRes",
            Payload::SpotEvent(_) => "SpotEvent",
            Payload::NewOrderReq(_) => "NewOrderReq",
            Payload::ExecutionEvent(_) => "ExecutionEvent",
            Payload::GetBarsReq(_) => "GetBarsReq",
            Payload::GetBarsRes(_) => "GetBarsRes",
            Payload::Heartbeat => "Heartbeat",
            Payload::ErrorResponse(_) => "ErrorResponse",
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Payload::Heartbeat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAuthReq {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationAuthRes {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAuthReq {
    pub ctid_trader_account_id: i64,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAuthRes {
    pub ctid_trader_account_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAccountListReq {
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub ctid_trader_account_id: i64,
    pub is_live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAccountListRes {
    pub accounts: Vec<AccountSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderInfoReq {
    pub ctid_trader_account_id: i64,
}

/// Account-level details reported by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderDetails {
    pub ctid_trader_account_id: i64,
    pub balance: Price,
    #[serde(default)]
    pub deposit_currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderInfoRes {
    pub trader: TraderDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderUpdatedEvent {
    pub trader: TraderDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolsListReq {
    pub ctid_trader_account_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolEntry {
    pub symbol_id: i64,
    pub symbol_name: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolsListRes {
    pub symbols: Vec<SymbolEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDetailsReq {
    pub ctid_trader_account_id: i64,
    pub symbol_ids: Vec<i64>,
}

/// Per-symbol trading parameters; `digits` drives the minimum tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDetails {
    pub symbol_id: i64,
    pub digits: u32,
    pub lot_size: Size,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDetailsRes {
    pub details: Vec<SymbolDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeSpotsReq {
    pub ctid_trader_account_id: i64,
    pub symbol_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeSpotsRes {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotEvent {
    pub symbol_id: i64,
    #[serde(default)]
    pub bid: Option<Price>,
    #[serde(default)]
    pub ask: Option<Price>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderReq {
    pub ctid_trader_account_id: i64,
    pub symbol_id: i64,
    pub trade_side: OrderSide,
    pub volume: Size,
    pub time_in_force: TimeInForce,
    pub client_order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    pub execution_type: String,
    #[serde(default)]
    pub trade_side: Option<OrderSide>,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub symbol_id: i64,
    #[serde(default)]
    pub execution_price: Option<Price>,
    #[serde(default)]
    pub filled_volume: Option<Size>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBarsReq {
    pub ctid_trader_account_id: i64,
    pub symbol_id: i64,
    pub period: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBarsRes {
    pub symbol_id: i64,
    pub bars: Vec<PriceBar>,
}

/// Broker-side failure for a request or the session as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: String,
    pub description: String,
}

impl ErrorResponse {
    /// Auth-coded errors invalidate the whole session rather than a single
    /// request
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self.error_code.as_str(),
            "NOT_AUTHENTICATED" | "ACCESS_TOKEN_INVALID" | "ACCOUNT_NOT_AUTHENTICATED"
        )
    }
}
