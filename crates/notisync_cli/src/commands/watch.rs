//! Watch command implementation.
//!
//! Runs a full session until interrupted: the push channel delivers
//! changes as they happen and the poller keeps the unread count honest
//! while the channel is down.

use super::{format_record, Context};
use crate::Format;
use anyhow::Result;
use notisync_engine::{
    ConnectionState, NotificationId, NotificationSession, PollConfig, PushConnector, PushEvent,
    ReconnectConfig, StoreState, WebSocketConnector,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runs the watch command until Ctrl-C.
pub async fn run(context: Context, poll_interval: Duration, max_reconnects: u32) -> Result<()> {
    let config = context
        .config
        .clone()
        .with_poll(PollConfig::new(poll_interval))
        .with_reconnect(ReconnectConfig::new(max_reconnects));
    let connector: Arc<dyn PushConnector> = Arc::new(WebSocketConnector::new());

    let session = NotificationSession::start(
        config,
        context.credential_source(),
        Arc::clone(&context.api),
        connector,
    )
    .await;
    info!(state = ?session.connection_state(), "watching notifications");

    let format = context.format;
    print_connection(format, &session.connection_state());
    session.supervisor().subscribe_state(move |state| print_connection(format, state));
    session.subscribe_events(move |event| {
        if let PushEvent::DocumentProcessed(document) = event {
            match format {
                Format::Json => {
                    let line = json!({ "event": "document_processed", "document_id": document });
                    println!("{line}");
                }
                Format::Text => println!("document {document} processed"),
            }
        }
    });

    let initial = match session.service().fetch_recent().await {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "initial fetch failed; waiting for updates");
            session.store().state()
        }
    };
    let printer = ChangePrinter::new(format, &initial);
    printer.print_initial(&initial);
    session.subscribe(move |state| printer.print_change(state));

    tokio::signal::ctrl_c().await?;
    session.stop();
    Ok(())
}

fn print_connection(format: Format, state: &ConnectionState) {
    match (format, state) {
        (Format::Json, state) => {
            println!("{}", json!({ "event": "connection", "state": format!("{state:?}") }));
        }
        (Format::Text, ConnectionState::Connected) => println!("-- live"),
        (Format::Text, ConnectionState::ReconnectScheduled { attempt, delay }) => {
            println!("-- reconnecting in {}s (attempt {attempt})", delay.as_secs_f32());
        }
        (Format::Text, ConnectionState::Disconnected) => println!("-- offline, polling only"),
        (Format::Text, ConnectionState::Connecting) => {}
    }
}

/// Prints what changed between store states.
struct ChangePrinter {
    format: Format,
    seen: Mutex<(HashSet<NotificationId>, u32)>,
}

impl ChangePrinter {
    fn new(format: Format, initial: &StoreState) -> Self {
        let ids = initial.notifications.iter().map(|record| record.id).collect();
        Self {
            format,
            seen: Mutex::new((ids, initial.unread_count)),
        }
    }

    fn print_initial(&self, state: &StoreState) {
        match self.format {
            Format::Json => {
                let snapshot = json!({
                    "event": "snapshot",
                    "unread_count": state.unread_count,
                    "notifications": state.notifications,
                });
                println!("{snapshot}");
            }
            Format::Text => {
                for record in &state.notifications {
                    println!("{}", format_record(record));
                }
                println!("{} unread", state.unread_count);
            }
        }
    }

    fn print_change(&self, state: &StoreState) {
        let mut seen = self.seen.lock();
        let (ids, unread) = &mut *seen;

        for record in state.notifications.iter().filter(|record| !ids.contains(&record.id)) {
            match self.format {
                Format::Json => {
                    println!("{}", json!({ "event": "notification", "notification": record }));
                }
                Format::Text => println!("{}", format_record(record)),
            }
        }
        ids.extend(state.notifications.iter().map(|record| record.id));

        if *unread != state.unread_count {
            *unread = state.unread_count;
            match self.format {
                Format::Json => {
                    println!("{}", json!({ "event": "unread_count", "unread_count": *unread }));
                }
                Format::Text => println!("{unread} unread"),
            }
        }
    }
}
