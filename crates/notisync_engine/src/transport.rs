//! Push transport abstraction.
//!
//! A [`PushConnector`] opens one duplex text channel per call. The
//! supervisor owns reconnection; connectors only report whether the
//! handshake succeeded and then hand back a pair of channel ends. The
//! connection is considered closed when the inbound end yields `None`, and
//! the connector closes its socket once the outbound sender is dropped.

use crate::error::{NotifyError, NotifyResult};
use async_trait::async_trait;
use notisync_protocol::{PushCommand, PushEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::Url;

/// An open push connection.
#[derive(Debug)]
pub struct PushChannel {
    /// Text frames received from the server.
    pub inbound: UnboundedReceiver<String>,
    /// Text frames to send to the server.
    pub outbound: UnboundedSender<String>,
}

/// Opens push connections.
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Performs the handshake with `url` (credentials already embedded).
    async fn open(&self, url: &Url) -> NotifyResult<PushChannel>;
}

/// How a [`MockConnector`] answers an `open` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    /// Complete the handshake.
    Accept,
    /// Fail with a retryable transport error.
    Refuse,
    /// Fail with an authentication error.
    RejectCredentials,
    /// Never answer the handshake.
    Stall,
}

/// The server side of a connection accepted by a [`MockConnector`].
#[derive(Debug)]
pub struct MockServer {
    /// The URL the client connected to.
    pub url: Url,
    to_client: UnboundedSender<String>,
    from_client: UnboundedReceiver<String>,
}

impl MockServer {
    /// Sends a raw text frame to the client.
    pub fn send_raw(&self, frame: impl Into<String>) -> bool {
        self.to_client.send(frame.into()).is_ok()
    }

    /// Sends an encoded event to the client.
    pub fn send_event(&self, event: &PushEvent) -> bool {
        match event.encode() {
            Ok(frame) => self.send_raw(frame),
            Err(_) => false,
        }
    }

    /// Waits for the next command sent by the client.
    ///
    /// Returns `None` once the client dropped the connection.
    pub async fn recv_command(&mut self) -> Option<NotifyResult<PushCommand>> {
        let frame = self.from_client.recv().await?;
        Some(PushCommand::decode(&frame).map_err(NotifyError::from))
    }

    /// Closes the connection from the server side.
    pub fn close(self) {}
}

/// A scripted connector for tests.
///
/// Each `open` consumes the next scripted outcome, falling back to the
/// default outcome once the script is empty. Accepted connections are
/// handed to the test through [`MockConnector::next_server`].
#[derive(Debug)]
pub struct MockConnector {
    script: Mutex<VecDeque<MockOutcome>>,
    default_outcome: Mutex<MockOutcome>,
    attempts: Mutex<Vec<Url>>,
    accepted_tx: UnboundedSender<MockServer>,
    accepted_rx: tokio::sync::Mutex<UnboundedReceiver<MockServer>>,
}

impl MockConnector {
    /// Creates a connector that accepts every connection.
    pub fn new() -> Self {
        Self::with_default(MockOutcome::Accept)
    }

    /// Creates a connector answering unscripted calls with `outcome`.
    pub fn with_default(outcome: MockOutcome) -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            script: Mutex::new(VecDeque::new()),
            default_outcome: Mutex::new(outcome),
            attempts: Mutex::new(Vec::new()),
            accepted_tx,
            accepted_rx: tokio::sync::Mutex::new(accepted_rx),
        }
    }

    /// Queues the outcome of a future `open` call.
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.script.lock().push_back(outcome);
    }

    /// Changes the outcome used once the script is empty.
    pub fn set_default(&self, outcome: MockOutcome) {
        *self.default_outcome.lock() = outcome;
    }

    /// URLs of every `open` call so far.
    pub fn attempts(&self) -> Vec<Url> {
        self.attempts.lock().clone()
    }

    /// Number of `open` calls so far.
    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }

    /// Waits for the next accepted connection.
    pub async fn next_server(&self) -> Option<MockServer> {
        self.accepted_rx.lock().await.recv().await
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushConnector for MockConnector {
    async fn open(&self, url: &Url) -> NotifyResult<PushChannel> {
        self.attempts.lock().push(url.clone());

        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| *self.default_outcome.lock());

        match outcome {
            MockOutcome::Accept => {
                let (to_client, inbound) = mpsc::unbounded_channel();
                let (outbound, from_client) = mpsc::unbounded_channel();
                let server = MockServer {
                    url: url.clone(),
                    to_client,
                    from_client,
                };
                self.accepted_tx
                    .send(server)
                    .map_err(|_| NotifyError::transport_fatal("mock connector dropped"))?;
                Ok(PushChannel { inbound, outbound })
            }
            MockOutcome::Refuse => Err(NotifyError::transport_retryable("connection refused")),
            MockOutcome::RejectCredentials => Err(NotifyError::AuthenticationFailed(
                "handshake rejected with 403".into(),
            )),
            MockOutcome::Stall => std::future::pending().await,
        }
    }
}
