//! Session wiring and teardown.
//!
//! A [`NotificationSession`] owns one store, one push supervisor, one
//! façade and one poller for the lifetime of a signed-in user. Stopping
//! the session (or dropping it) tears all of them down; nothing outlives
//! it.

use crate::api::NotificationApi;
use crate::config::EngineConfig;
use crate::credentials::CredentialSource;
use crate::observer::ObserverId;
use crate::poller::ReconciliationPoller;
use crate::service::NotificationService;
use crate::store::{NotificationStore, StoreState};
use crate::supervisor::{ConnectionState, TransportSupervisor};
use crate::transport::PushConnector;
use notisync_protocol::PushEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// A running notification engine.
pub struct NotificationSession {
    store: Arc<NotificationStore>,
    supervisor: Arc<TransportSupervisor>,
    service: Arc<NotificationService>,
    poller: ReconciliationPoller,
    credentials: Arc<dyn CredentialSource>,
    push_sink: ObserverId,
    stopped: AtomicBool,
}

impl NotificationSession {
    /// Wires the components together and starts them.
    ///
    /// The poller starts with an immediate poll, then the push channel is
    /// opened with the current credential (if any). Returns once the first
    /// handshake has connected or failed.
    pub async fn start(
        config: EngineConfig,
        credentials: Arc<dyn CredentialSource>,
        api: Arc<dyn NotificationApi>,
        connector: Arc<dyn PushConnector>,
    ) -> Self {
        let store = Arc::new(NotificationStore::new());
        let supervisor = Arc::new(TransportSupervisor::new(
            config.clone(),
            connector,
            Arc::clone(&credentials),
        ));

        let sink = Arc::clone(&store);
        let push_sink = supervisor.add_observer(move |event| {
            sink.apply_event(event);
        });

        let service = Arc::new(NotificationService::new(
            Arc::clone(&store),
            api,
            Arc::clone(&supervisor),
        ));
        let poller = ReconciliationPoller::new(Arc::clone(&service), config.poll.clone());

        let session = Self {
            store,
            supervisor,
            service,
            poller,
            credentials,
            push_sink,
            stopped: AtomicBool::new(false),
        };

        session.poller.start();
        session.resume_push().await;
        info!("notification session started");
        session
    }

    /// Opens the push channel again with the current credential.
    ///
    /// Use after a credential refresh once reconnection has given up. Has
    /// no effect while the channel is open or being opened.
    pub async fn resume_push(&self) -> ConnectionState {
        if self.is_stopped() {
            return ConnectionState::Disconnected;
        }
        match self.credentials.bearer_token() {
            Some(token) => self.supervisor.connect(&token).await,
            None => {
                warn!("no credential available; push channel not opened, polling only");
                self.supervisor.state()
            }
        }
    }

    /// Tears the session down. Safe to call more than once.
    ///
    /// Cancels the poller and any reconnect timer, closes the push channel
    /// and clears the store. Calls still in flight complete but their
    /// results are discarded.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.poller.stop();
        self.supervisor.remove_observer(self.push_sink);
        self.supervisor.disconnect();
        self.store.close();
        info!("notification session stopped");
    }

    /// Returns true once [`stop`](Self::stop) has run.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// The command façade.
    pub fn service(&self) -> &Arc<NotificationService> {
        &self.service
    }

    /// The notification store.
    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    /// The push supervisor.
    pub fn supervisor(&self) -> &Arc<TransportSupervisor> {
        &self.supervisor
    }

    /// The reconciliation poller.
    pub fn poller(&self) -> &ReconciliationPoller {
        &self.poller
    }

    /// Current push connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Registers a "store changed" callback.
    pub fn subscribe(&self, observer: impl Fn(&StoreState) + Send + Sync + 'static) -> ObserverId {
        self.store.subscribe(observer)
    }

    /// Registers a raw push event callback (including `document_processed`).
    pub fn subscribe_events(
        &self,
        observer: impl Fn(&PushEvent) + Send + Sync + 'static,
    ) -> ObserverId {
        self.supervisor.add_observer(observer)
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for NotificationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSession")
            .field("connection", &self.connection_state())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
