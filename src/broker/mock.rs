use crate::broker::protocol::Envelope;
use crate::broker::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

type Responder = Box<dyn Fn(&Envelope) -> Vec<Envelope> + Send + Sync>;

/// In-memory transport for tests
///
/// Records every outbound envelope, lets tests inject inbound traffic, and
/// optionally answers outbound requests through a scripted responder.
pub struct MockTransport {
    sent: StdMutex<Vec<Envelope>>,
    inbound_tx: UnboundedSender<Envelope>,
    inbound_rx: Mutex<UnboundedReceiver<Envelope>>,
    responder: StdMutex<Option<Responder>>,
    connected: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = unbounded_channel();
        Self {
            sent: StdMutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            responder: StdMutex::new(None),
            connected: AtomicBool::new(true),
        }
    }

    /// Inject an inbound envelope as if the broker had sent it
    pub fn push_inbound(&self, envelope: Envelope) {
        let _ = self.inbound_tx.send(envelope);
    }

    /// Script replies: the closure sees each outbound envelope and returns
    /// the envelopes to feed back inbound
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Envelope) -> Vec<Envelope> + Send + Sync + 'static,
    {
        *self.responder.lock().unwrap() = Some(Box::new(responder));
    }

    /// Everything sent through the transport so far
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Simulate the peer dropping the connection
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        // Wake a blocked recv so it observes the closed flag
        let _ = self.inbound_tx.send(Envelope::event(
            crate::broker::protocol::Payload::Heartbeat,
        ));
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        let replies = {
            let responder = self.responder.lock().unwrap();
            responder.as_ref().map(|r| r(&envelope)).unwrap_or_default()
        };
        self.sent.lock().unwrap().push(envelope);
        for reply in replies {
            let _ = self.inbound_tx.send(reply);
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Envelope, TransportError> {
        let mut rx = self.inbound_rx.lock().await;
        loop {
            if !self.is_connected() {
                return Err(TransportError::Closed);
            }
            match rx.recv().await {
                Some(envelope) => {
                    if !self.is_connected() {
                        return Err(TransportError::Closed);
                    }
                    return Ok(envelope);
                }
                None => return Err(TransportError::Closed),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::protocol::{ApplicationAuthReq, Payload};

    fn app_auth_req(msg_id: u64) -> Envelope {
        Envelope::request(
            msg_id,
            Payload::ApplicationAuthReq(ApplicationAuthReq {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_records_sent_and_delivers_inbound() {
        let transport = MockTransport::new();

        transport.send(app_auth_req(1)).await.unwrap();
        assert_eq!(transport.sent_count(), 1);

        transport.push_inbound(Envelope::event(Payload::Heartbeat));
        let inbound = transport.recv().await.unwrap();
        assert!(inbound.payload.is_heartbeat());
    }

    #[tokio::test]
    async fn test_responder_answers_outbound() {
        let transport = MockTransport::new();
        transport.set_responder(|envelope| {
            vec![Envelope {
                msg_id: envelope.msg_id,
                payload: Payload::ApplicationAuthRes(Default::default()),
            }]
        });

        transport.send(app_auth_req(9)).await.unwrap();
        let reply = transport.recv().await.unwrap();
        assert_eq!(reply.msg_id, Some(9));
    }

    #[tokio::test]
    async fn test_drop_connection_closes_both_directions() {
        let transport = MockTransport::new();
        transport.drop_connection();

        assert!(!transport.is_connected());
        assert_eq!(transport.recv().await, Err(TransportError::Closed));
        assert_eq!(
            transport.send(app_auth_req(1)).await,
            Err(TransportError::Closed)
        );
    }
}
