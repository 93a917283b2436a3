//! Notification fixtures and session harness.
//!
//! Fixture records are deterministic per id: notification `n` was created
//! `n` minutes after [`base_time`], so a higher id is always newer.

use chrono::{DateTime, Duration, TimeZone, Utc};
use notisync_engine::{
    CredentialSource, EngineConfig, MockApi, MockConnector, MockOutcome, NotificationApi,
    NotificationSession, PushConnector, SharedToken,
};
use notisync_protocol::NotificationRecord;
use std::sync::Arc;

/// Token handed out by [`TestHarness`].
pub const TEST_TOKEN: &str = "test-token";

/// Server host used by [`TestHarness`].
pub const TEST_HOST: &str = "http://localhost:8000";

/// Reference time for fixture records (2024-03-01T08:15:00Z).
pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_709_280_900, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// An unread notification with id `id`.
pub fn notification(id: i64) -> NotificationRecord {
    NotificationRecord::new(
        id,
        "document_processed",
        format!("Document {id} processed"),
        format!("Processing of document {id} finished"),
        base_time() + Duration::minutes(id),
    )
    .with_document(id * 10, Some(format!("Deed {id}")))
}

/// Unread notifications for every id in `ids`.
pub fn unread_batch(ids: impl IntoIterator<Item = i64>) -> Vec<NotificationRecord> {
    ids.into_iter().map(notification).collect()
}

/// Wires a session to in-memory transports.
pub struct TestHarness {
    /// The in-memory server.
    pub api: Arc<MockApi>,
    /// The scripted push connector.
    pub connector: Arc<MockConnector>,
    /// The credential source shared by both transports.
    pub credentials: Arc<SharedToken>,
    /// The engine configuration.
    pub config: EngineConfig,
}

impl TestHarness {
    /// Creates a harness whose push handshakes succeed.
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Creates a harness whose server holds `records`.
    pub fn with_records(records: Vec<NotificationRecord>) -> Self {
        Self {
            api: Arc::new(MockApi::with_records(records)),
            connector: Arc::new(MockConnector::new()),
            credentials: Arc::new(SharedToken::new(TEST_TOKEN)),
            config: EngineConfig::for_host(TEST_HOST).expect("valid test host"),
        }
    }

    /// Makes every push handshake end with `outcome`.
    pub fn push_outcome(self, outcome: MockOutcome) -> Self {
        self.connector.set_default(outcome);
        self
    }

    /// Replaces the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Starts a session against the harness transports.
    pub async fn start(&self) -> NotificationSession {
        NotificationSession::start(
            self.config.clone(),
            Arc::clone(&self.credentials) as Arc<dyn CredentialSource>,
            Arc::clone(&self.api) as Arc<dyn NotificationApi>,
            Arc::clone(&self.connector) as Arc<dyn PushConnector>,
        )
        .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
