//! Push channel supervision.
//!
//! The [`TransportSupervisor`] owns at most one live push connection. It
//! decodes inbound frames and fans the events out to observers, and after
//! an unexpected close it reconnects with capped exponential backoff until
//! the attempt budget is spent. An explicit [`TransportSupervisor::disconnect`]
//! cancels both the connection and any pending reconnect.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected --connect--> Connecting --handshake ok--> Connected
//!                               |                            |
//!                          handshake failed           unexpected close
//!                               v                            v
//!                      ReconnectScheduled <------------------+
//!                               |
//!                    timer fires (re-reads credential)
//!                               v
//!                          Connecting ... until the budget is spent
//! ```
//!
//! Every connect starts a new *generation*. A driver task only mutates
//! state while its generation is current, so work left over from an
//! earlier connection can never resurrect it.

use crate::config::EngineConfig;
use crate::credentials::CredentialSource;
use crate::error::NotifyError;
use crate::observer::{ObserverId, ObserverList};
use crate::transport::{PushChannel, PushConnector};
use notisync_protocol::{PushCommand, PushEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no reconnect pending.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Connection open.
    Connected,
    /// Waiting `delay` before reconnect attempt `attempt` (1-based).
    ReconnectScheduled {
        /// Attempt number of the pending reconnect.
        attempt: u32,
        /// Delay before the attempt fires.
        delay: Duration,
    },
}

impl ConnectionState {
    /// Returns true if the connection is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Returns true if a handshake is running or the connection is open.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

struct Control {
    state: ConnectionState,
    generation: u64,
    outbound: Option<UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    config: EngineConfig,
    connector: Arc<dyn PushConnector>,
    credentials: Arc<dyn CredentialSource>,
    control: Mutex<Control>,
    events: ObserverList<PushEvent>,
    states: ObserverList<ConnectionState>,
}

/// Maintains the push connection and fans out decoded events.
pub struct TransportSupervisor {
    inner: Arc<Inner>,
}

impl TransportSupervisor {
    /// Creates a disconnected supervisor.
    pub fn new(
        config: EngineConfig,
        connector: Arc<dyn PushConnector>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                credentials,
                control: Mutex::new(Control {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    outbound: None,
                    task: None,
                }),
                events: ObserverList::new(),
                states: ObserverList::new(),
            }),
        }
    }

    /// Opens the push connection with `token`.
    ///
    /// Resolves once the first handshake has succeeded or failed; a failed
    /// handshake leaves a reconnect scheduled. Calling this while a
    /// connection is open or being opened has no effect. Any other call
    /// starts over with a fresh attempt budget.
    pub async fn connect(&self, token: &str) -> ConnectionState {
        let ready = {
            let mut control = self.inner.control.lock();
            if control.state.is_active() {
                debug!(state = ?control.state, "connect ignored; push channel already active");
                return control.state;
            }

            control.generation += 1;
            if let Some(task) = control.task.take() {
                task.abort();
            }
            control.outbound = None;
            control.state = ConnectionState::Connecting;

            let (ready_tx, ready_rx) = oneshot::channel();
            let task = tokio::spawn(Arc::clone(&self.inner).run(
                control.generation,
                token.to_owned(),
                ready_tx,
            ));
            control.task = Some(task);
            ready_rx
        };

        self.inner.states.notify(&ConnectionState::Connecting);
        // Dropped without a value when the driver ends early; both mean "settled".
        let _ = ready.await;
        self.state()
    }

    /// Closes the connection and cancels any pending reconnect.
    ///
    /// No reconnect is scheduled as a consequence of this call.
    pub fn disconnect(&self) {
        let changed = {
            let mut control = self.inner.control.lock();
            control.generation += 1;
            if let Some(task) = control.task.take() {
                task.abort();
            }
            control.outbound = None;
            let changed = control.state != ConnectionState::Disconnected;
            control.state = ConnectionState::Disconnected;
            changed
        };

        if changed {
            info!("push channel disconnected");
            self.inner.states.notify(&ConnectionState::Disconnected);
        }
    }

    /// Sends `command` if the connection is open.
    ///
    /// Best effort: returns false when disconnected and never queues.
    pub fn send(&self, command: PushCommand) -> bool {
        let control = self.inner.control.lock();
        let Some(outbound) = control.outbound.as_ref().filter(|_| control.state.is_connected())
        else {
            debug!(command = command.type_name(), "push command dropped; not connected");
            return false;
        };

        match command.encode() {
            Ok(frame) => outbound.send(frame).is_ok(),
            Err(e) => {
                warn!(error = %e, "failed to encode push command");
                false
            }
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.control.lock().state
    }

    /// Registers a push event observer.
    pub fn add_observer(
        &self,
        observer: impl Fn(&PushEvent) + Send + Sync + 'static,
    ) -> ObserverId {
        self.inner.events.add(observer)
    }

    /// Unregisters a push event observer.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.events.remove(id)
    }

    /// Registers a connection state observer.
    pub fn subscribe_state(
        &self,
        observer: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> ObserverId {
        self.inner.states.add(observer)
    }

    /// Unregisters a connection state observer.
    pub fn unsubscribe_state(&self, id: ObserverId) -> bool {
        self.inner.states.remove(id)
    }
}

impl Drop for TransportSupervisor {
    fn drop(&mut self) {
        if let Some(task) = self.inner.control.lock().task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for TransportSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSupervisor")
            .field("state", &self.state())
            .field("push_url", &self.inner.config.push_url.as_str())
            .finish()
    }
}

impl Inner {
    /// Drives one connection generation until it is superseded or gives up.
    async fn run(
        self: Arc<Self>,
        generation: u64,
        initial_token: String,
        ready: oneshot::Sender<()>,
    ) {
        let mut ready = Some(ready);
        let mut initial_token = Some(initial_token);
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 && !self.transition(generation, ConnectionState::Connecting) {
                return;
            }

            // The credential is read when the attempt fires, never when it was scheduled.
            let token = initial_token
                .take()
                .or_else(|| self.credentials.bearer_token());

            let result = match token {
                Some(token) => {
                    let url = self.config.authenticated_push_url(&token);
                    let limit = self.config.handshake_timeout;
                    tokio::time::timeout(limit, self.connector.open(&url))
                        .await
                        .unwrap_or_else(|_| {
                            Err(NotifyError::transport_retryable(format!(
                                "handshake did not complete within {}ms",
                                limit.as_millis()
                            )))
                        })
                }
                None => Err(NotifyError::MissingCredential),
            };

            match result {
                Ok(PushChannel { inbound, outbound }) => {
                    if !self.install(generation, outbound) {
                        return;
                    }
                    attempt = 0;
                    info!("push channel connected");
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(());
                    }

                    self.pump(generation, inbound).await;

                    if !self.detach(generation) {
                        return;
                    }
                    warn!("push channel closed unexpectedly");
                }
                Err(err) => {
                    if err.is_auth_failure() {
                        self.credentials.on_rejected();
                    }
                    warn!(error = %err, attempt, "push channel connect failed");
                }
            }

            if !self.config.reconnect.allows_attempt(attempt) {
                warn!(attempts = attempt, "push channel reconnect budget exhausted; polling only");
                self.transition(generation, ConnectionState::Disconnected);
                return;
            }

            let delay = self.config.reconnect.delay_for_attempt(attempt);
            attempt += 1;
            let scheduled = ConnectionState::ReconnectScheduled { attempt, delay };
            if !self.transition(generation, scheduled) {
                return;
            }
            info!(attempt, delay_ms = delay.as_millis() as u64, "push channel reconnect scheduled");
            if let Some(ready) = ready.take() {
                let _ = ready.send(());
            }

            tokio::time::sleep(delay).await;
        }
    }

    /// Decodes frames until the connection closes.
    async fn pump(&self, generation: u64, mut inbound: UnboundedReceiver<String>) {
        while let Some(frame) = inbound.recv().await {
            if self.control.lock().generation != generation {
                return;
            }
            match PushEvent::decode(&frame) {
                Ok(event) => {
                    debug!(kind = event.type_name(), "push event received");
                    self.events.notify(&event);
                }
                Err(e) => warn!(error = %e, "dropping malformed push frame"),
            }
        }
    }

    /// Marks the connection open. Returns false if `generation` is stale.
    fn install(&self, generation: u64, outbound: UnboundedSender<String>) -> bool {
        {
            let mut control = self.control.lock();
            if control.generation != generation {
                return false;
            }
            control.outbound = Some(outbound);
            control.state = ConnectionState::Connected;
        }
        self.states.notify(&ConnectionState::Connected);
        true
    }

    /// Drops the outbound end after a close. Returns false if `generation` is stale.
    fn detach(&self, generation: u64) -> bool {
        let mut control = self.control.lock();
        if control.generation != generation {
            return false;
        }
        control.outbound = None;
        true
    }

    /// Moves to `state`. Returns false if `generation` is stale.
    fn transition(&self, generation: u64, state: ConnectionState) -> bool {
        {
            let mut control = self.control.lock();
            if control.generation != generation {
                return false;
            }
            if control.state == state {
                return true;
            }
            control.state = state;
        }
        self.states.notify(&state);
        true
    }
}
