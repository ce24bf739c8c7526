use crate::broker::protocol::Envelope;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Bidirectional message transport to the broker
///
/// Implementations must tolerate `send` and `recv` being driven from
/// different tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Next inbound envelope; `Err(TransportError::Closed)` once the peer is
    /// gone
    async fn recv(&self) -> Result<Envelope, TransportError>;

    fn is_connected(&self) -> bool;

    async fn close(&self);
}

/// WebSocket transport over `tokio-tungstenite`
pub struct WsTransport {
    sink: Mutex<WsSink>,
    stream: Mutex<WsStream>,
    connected: AtomicBool,
}

impl WsTransport {
    /// Open the WebSocket connection to the broker endpoint
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        debug!("WebSocket connected to {} ({})", url, response.status());

        let (sink, stream) = ws.split();
        Ok(Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            connected: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        let json = serde_json::to_string(&envelope)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(json)).await.map_err(|e| {
            self.connected.store(false, Ordering::SeqCst);
            TransportError::SendFailed(e.to_string())
        })
    }

    async fn recv(&self) -> Result<Envelope, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| TransportError::Malformed(format!("{}: {}", e, text)));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return serde_json::from_slice(&bytes)
                        .map_err(|e| TransportError::Malformed(e.to_string()));
                }
                // Control frames are answered by tungstenite itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    warn!("WebSocket closed by peer: {:?}", frame);
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::Closed);
                }
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionFailed(e.to_string()));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::Closed);
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut sink = self.sink.lock().await;
        let _ = sink.send(Message::Close(None)).await;
    }
}

/// Transport-level error
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    ConnectionFailed(String),
    SendFailed(String),
    Malformed(String),
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            TransportError::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            TransportError::Malformed(msg) => write!(f, "Malformed message: {}", msg),
            TransportError::Closed => write!(f, "Transport closed"),
        }
    }
}

impl std::error::Error for TransportError {}
