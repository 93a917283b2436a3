//! Property-based test generators using proptest.
//!
//! Ids are drawn from a small range so that generated operations collide:
//! duplicates, early read events and overlapping snapshots are the cases
//! the store's merge rules exist for.

use crate::fixtures::notification;
use notisync_engine::{NotificationStore, SnapshotKind};
use notisync_protocol::{DocumentId, NotificationId, NotificationRecord, PushEvent};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for notification ids in `1..=max_id`.
pub fn notification_id_strategy(max_id: i64) -> impl Strategy<Value = NotificationId> {
    (1..=max_id).prop_map(NotificationId)
}

/// Strategy for fixture records with an arbitrary read flag.
pub fn record_strategy(max_id: i64) -> impl Strategy<Value = NotificationRecord> {
    (1..=max_id, any::<bool>()).prop_map(|(id, is_read)| notification(id).with_read(is_read))
}

/// Strategy for a snapshot: distinct records, newest first.
pub fn snapshot_strategy(
    max_id: i64,
    max_len: usize,
) -> impl Strategy<Value = Vec<NotificationRecord>> {
    prop::collection::vec(record_strategy(max_id), 0..=max_len).prop_map(|records| {
        let mut by_id = BTreeMap::new();
        for record in records {
            by_id.insert(record.id, record);
        }
        // BTreeMap iterates by ascending id; fixture ids ascend with time.
        by_id.into_values().rev().collect()
    })
}

/// Strategy for inbound push events.
pub fn push_event_strategy(max_id: i64) -> impl Strategy<Value = PushEvent> {
    prop_oneof![
        4 => (1..=max_id).prop_map(|id| PushEvent::NewNotification(notification(id))),
        3 => notification_id_strategy(max_id).prop_map(PushEvent::NotificationRead),
        1 => Just(PushEvent::AllNotificationsRead),
        1 => (1..100i64).prop_map(|id| PushEvent::DocumentProcessed(DocumentId(id))),
    ]
}

/// One input to the store.
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// A push event or optimistic local update.
    Event(PushEvent),
    /// A full listing.
    FullSnapshot(Vec<NotificationRecord>),
    /// A recent (partial) listing.
    RecentSnapshot(Vec<NotificationRecord>),
    /// A polled unread count.
    UnreadCount(u32),
}

impl StoreOp {
    /// Applies this operation to `store`.
    pub fn apply(&self, store: &NotificationStore) -> bool {
        match self {
            StoreOp::Event(event) => store.apply_event(event),
            StoreOp::FullSnapshot(records) => {
                store.apply_snapshot(records.clone(), SnapshotKind::Full)
            }
            StoreOp::RecentSnapshot(records) => {
                store.apply_snapshot(records.clone(), SnapshotKind::Recent)
            }
            StoreOp::UnreadCount(count) => store.apply_unread_count(*count),
        }
    }

    /// Returns true for operations that make the count derived again.
    pub fn rederives_count(&self) -> bool {
        match self {
            StoreOp::Event(event) => event.touches_notifications(),
            StoreOp::FullSnapshot(_) | StoreOp::RecentSnapshot(_) => true,
            StoreOp::UnreadCount(_) => false,
        }
    }
}

/// Strategy for store operations.
pub fn store_op_strategy(max_id: i64) -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        6 => push_event_strategy(max_id).prop_map(StoreOp::Event),
        1 => snapshot_strategy(max_id, max_id as usize).prop_map(StoreOp::FullSnapshot),
        2 => snapshot_strategy(max_id, 5).prop_map(StoreOp::RecentSnapshot),
        1 => (0..50u32).prop_map(StoreOp::UnreadCount),
    ]
}

/// Strategy for a sequence of store operations.
pub fn store_ops_strategy(max_id: i64, max_len: usize) -> impl Strategy<Value = Vec<StoreOp>> {
    prop::collection::vec(store_op_strategy(max_id), 0..=max_len)
}
