//! End-to-end session tests against in-memory transports.

use notisync_engine::{
    ApiCall, ConnectionState, MockOutcome, NotificationSession, NotifyError, PushCommand,
    ReconnectConfig, StoreState,
};
use notisync_protocol::{DocumentId, NotificationId, PushEvent};
use notisync_testkit::{notification, unread_batch, TestHarness};
use std::time::Duration;
use tokio::sync::mpsc;

/// Forwards every store change to a channel.
fn watch_store(session: &NotificationSession) -> mpsc::UnboundedReceiver<StoreState> {
    let (tx, rx) = mpsc::unbounded_channel();
    session.subscribe(move |state| {
        let _ = tx.send(state.clone());
    });
    rx
}

async fn wait_for_state(
    changes: &mut mpsc::UnboundedReceiver<StoreState>,
    done: impl Fn(&StoreState) -> bool,
) -> StoreState {
    loop {
        let state = changes.recv().await.expect("store stopped notifying");
        if done(&state) {
            return state;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn push_events_reach_the_store() {
    let harness = TestHarness::with_records(unread_batch(1..=3));
    let session = harness.start().await;
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    let server = harness.connector.next_server().await.unwrap();
    assert_eq!(server.url.query(), Some("token=test-token"));

    // Let the first poll land so the listing below replaces its hint.
    tokio::time::sleep(Duration::from_millis(10)).await;
    session.service().fetch_all().await.unwrap();
    let mut changes = watch_store(&session);

    server.send_event(&PushEvent::NewNotification(notification(4)));
    let state = wait_for_state(&mut changes, |s| s.notifications.len() == 4).await;
    assert_eq!(state.notifications[0].id, NotificationId(4));
    assert_eq!(state.unread_count, 4);

    server.send_event(&PushEvent::NotificationRead(NotificationId(2)));
    let state = wait_for_state(&mut changes, |s| s.unread_count == 3).await;
    assert!(state.get(NotificationId(2)).unwrap().is_read);

    session.stop();
}

#[tokio::test(start_paused = true)]
async fn document_processed_reaches_event_subscribers_only() {
    let harness = TestHarness::new();
    let session = harness.start().await;
    let server = harness.connector.next_server().await.unwrap();

    let (tx, mut events) = mpsc::unbounded_channel();
    session.subscribe_events(move |event| {
        let _ = tx.send(event.clone());
    });
    let version = session.store().state().version;

    server.send_event(&PushEvent::DocumentProcessed(DocumentId(12)));
    assert_eq!(
        events.recv().await.unwrap(),
        PushEvent::DocumentProcessed(DocumentId(12))
    );
    assert_eq!(session.store().state().version, version);
}

#[tokio::test(start_paused = true)]
async fn mark_read_while_disconnected_goes_over_request() {
    let harness = TestHarness::with_records(unread_batch(1..=2)).push_outcome(MockOutcome::Refuse);
    let session = harness.start().await;
    assert!(matches!(
        session.connection_state(),
        ConnectionState::ReconnectScheduled { attempt: 1, .. }
    ));

    tokio::time::sleep(Duration::from_millis(10)).await;
    session.service().fetch_all().await.unwrap();
    session.service().mark_as_read(NotificationId(1)).await.unwrap();

    let state = session.store().state();
    assert!(state.get(NotificationId(1)).unwrap().is_read);
    assert_eq!(state.unread_count, 1);
    assert_eq!(harness.api.call_count(ApiCall::MarkRead(NotificationId(1))), 1);
    let server_side = harness.api.records();
    assert!(server_side.iter().find(|r| r.id == NotificationId(1)).unwrap().is_read);
}

#[tokio::test(start_paused = true)]
async fn mark_all_read_uses_both_paths_when_connected() {
    let harness = TestHarness::with_records(unread_batch(1..=3));
    let session = harness.start().await;
    let mut server = harness.connector.next_server().await.unwrap();
    session.service().fetch_recent().await.unwrap();

    session.service().mark_all_as_read().await.unwrap();

    assert_eq!(
        server.recv_command().await.unwrap().unwrap(),
        PushCommand::MarkAllRead
    );
    assert_eq!(harness.api.call_count(ApiCall::MarkAllRead), 1);
    assert_eq!(session.store().state().unread_count, 0);
}

#[tokio::test(start_paused = true)]
async fn poller_reconciles_immediately_and_periodically() {
    let harness = TestHarness::with_records(unread_batch(1..=3)).push_outcome(MockOutcome::Refuse);
    harness.api.set_unread_override(Some(7));
    let session = harness.start().await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.api.call_count(ApiCall::UnreadCount), 1);
    assert_eq!(session.store().state().unread_count, 7);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.api.call_count(ApiCall::UnreadCount), 2);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn stalled_handshake_does_not_block_start_or_polling() {
    let harness = TestHarness::with_records(unread_batch(1..=2)).push_outcome(MockOutcome::Stall);
    harness.api.set_unread_override(Some(2));

    let session = tokio::time::timeout(Duration::from_secs(3600), harness.start())
        .await
        .expect("session start returns while the handshake hangs");
    assert!(matches!(
        session.connection_state(),
        ConnectionState::ReconnectScheduled { attempt: 1, .. }
    ));
    assert!(harness.api.call_count(ApiCall::UnreadCount) >= 1);
    assert_eq!(session.store().state().unread_count, 2);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(harness.api.call_count(ApiCall::UnreadCount) >= 3);
    assert!(harness.connector.attempt_count() > 1);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_tears_everything_down() {
    let harness = TestHarness::with_records(unread_batch(1..=3));
    let session = harness.start().await;
    let mut server = harness.connector.next_server().await.unwrap();
    session.service().fetch_all().await.unwrap();

    session.stop();
    session.stop();

    assert!(session.is_stopped());
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(!session.poller().is_running());
    assert!(session.store().is_closed());
    assert!(session.store().state().notifications.is_empty());
    assert!(server.recv_command().await.is_none());

    assert!(matches!(
        session.service().mark_all_as_read().await,
        Err(NotifyError::SessionClosed)
    ));
    assert_eq!(session.resume_push().await, ConnectionState::Disconnected);

    let polls = harness.api.call_count(ApiCall::UnreadCount);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(harness.api.call_count(ApiCall::UnreadCount), polls);
    assert_eq!(harness.connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn refreshed_credential_resumes_push_after_giving_up() {
    let harness = TestHarness::new().push_outcome(MockOutcome::RejectCredentials);
    let config = harness.config.clone().with_reconnect(ReconnectConfig::new(2));
    let harness = harness.config(config);

    let session = harness.start().await;
    let (tx, mut states) = mpsc::unbounded_channel();
    session.supervisor().subscribe_state(move |state| {
        let _ = tx.send(*state);
    });
    while states.recv().await != Some(ConnectionState::Disconnected) {}
    assert_eq!(harness.connector.attempt_count(), 3);
    assert_eq!(harness.credentials.rejection_count(), 3);

    harness.credentials.set("fresh");
    harness.connector.set_default(MockOutcome::Accept);
    assert_eq!(session.resume_push().await, ConnectionState::Connected);

    let server = harness.connector.next_server().await.unwrap();
    assert_eq!(server.url.query(), Some("token=fresh"));
}

#[tokio::test]
async fn session_without_credential_polls_only() {
    let harness = TestHarness::new();
    harness.credentials.clear();
    let session = harness.start().await;

    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(harness.connector.attempt_count(), 0);
    assert!(session.poller().is_running());
}
