//! CLI command implementations.

pub mod list;
pub mod read;
pub mod unread;
pub mod watch;

use crate::Format;
use anyhow::{Context as _, Result};
use notisync_engine::{
    CredentialSource, EngineConfig, NotificationApi, NotificationRecord, NotificationService,
    NotificationStore, PushConnector, RestApi, SharedToken, TransportSupervisor,
    WebSocketConnector,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Settings and transports shared by every command.
pub struct Context {
    /// Engine configuration derived from the server URL.
    pub config: EngineConfig,
    /// Credential source for both transports.
    pub credentials: Arc<SharedToken>,
    /// REST client.
    pub api: Arc<dyn NotificationApi>,
    /// Output format.
    pub format: Format,
}

impl Context {
    /// Builds the context; fails if no token was given.
    pub fn new(
        server: &str,
        token: Option<String>,
        timeout: Duration,
        format: Format,
    ) -> Result<Self> {
        let token = token.context("no token given; pass --token or set NOTISYNC_TOKEN")?;
        let config = EngineConfig::for_host(server)
            .with_context(|| format!("invalid server url '{server}'"))?
            .with_request_timeout(timeout);
        let credentials = Arc::new(SharedToken::new(token));
        let source = Arc::clone(&credentials) as Arc<dyn CredentialSource>;
        let api = RestApi::from_config(&config, source)?;

        Ok(Self {
            config,
            credentials,
            api: Arc::new(api),
            format,
        })
    }

    /// Credential source as a trait object.
    pub fn credential_source(&self) -> Arc<dyn CredentialSource> {
        Arc::clone(&self.credentials) as Arc<dyn CredentialSource>
    }

    /// A façade for one-shot commands; its push channel is never opened.
    pub fn one_shot_service(&self) -> NotificationService {
        let connector: Arc<dyn PushConnector> = Arc::new(WebSocketConnector::new());
        let push = Arc::new(TransportSupervisor::new(
            self.config.clone(),
            connector,
            self.credential_source(),
        ));
        NotificationService::new(Arc::new(NotificationStore::new()), Arc::clone(&self.api), push)
    }

    /// Prints `value` as JSON.
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// One line of text output for a record.
pub fn format_record(record: &NotificationRecord) -> String {
    let marker = if record.is_read { ' ' } else { '*' };
    let mut line = format!(
        "{marker} {:>6}  {}  {}",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.title
    );
    if let Some(document) = &record.document_title {
        line.push_str(&format!("  [{document}]"));
    }
    line
}
