//! The notification store and its merge rules.
//!
//! The store is the only shared mutable state in the engine. Push events,
//! poll results and optimistic façade updates all enter through
//! [`NotificationStore::apply_event`], [`NotificationStore::apply_snapshot`]
//! and [`NotificationStore::apply_unread_count`]; nothing else mutates
//! records or the counter.
//!
//! ## Merge rules
//!
//! - Inserts are idempotent: a record whose id is already held is ignored.
//! - Read flags only move from unread to read, except when a full snapshot
//!   from the server overrides them.
//! - A read event for an unknown id is remembered as a read marker and
//!   applied when the record arrives. A full snapshot discards markers at
//!   or below its newest id; those records were deleted or never existed.
//! - Mark-all-read leaves a timestamp behind; records created at or before
//!   it are inserted as read.
//! - A full snapshot may remove records; a recent (partial) snapshot never
//!   does.
//! - The unread count is derived from the records. A polled count is only a
//!   display hint until the next structural change.

use crate::observer::{ObserverId, ObserverList};
use chrono::{DateTime, Utc};
use notisync_protocol::{NotificationId, NotificationRecord, PushEvent};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Which endpoint a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// The complete list; membership is authoritative.
    Full,
    /// The most recent few records; never causes deletions.
    Recent,
}

/// Observer-visible state of the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreState {
    /// Held records, newest first.
    pub notifications: Vec<NotificationRecord>,
    /// Unread count to display.
    pub unread_count: u32,
    /// Polled unread count currently overriding the derived one, if any.
    pub server_unread_hint: Option<u32>,
    /// Time of the last mark-all-read seen by this client.
    pub read_all_as_of: Option<DateTime<Utc>>,
    /// Incremented on every visible change.
    pub version: u64,
}

impl StoreState {
    /// Number of held records that are unread.
    pub fn derived_unread_count(&self) -> u32 {
        count_unread(&self.notifications)
    }

    /// Looks up a held record.
    pub fn get(&self, id: NotificationId) -> Option<&NotificationRecord> {
        self.notifications.iter().find(|record| record.id == id)
    }
}

/// Pending read markers kept at most; the lowest ids are evicted first.
const MAX_READ_MARKERS: usize = 256;

fn count_unread(records: &[NotificationRecord]) -> u32 {
    records.iter().filter(|record| !record.is_read).count() as u32
}

#[derive(Default)]
struct StoreInner {
    records: Vec<NotificationRecord>,
    read_markers: BTreeSet<NotificationId>,
    read_all_as_of: Option<DateTime<Utc>>,
    unread_hint: Option<u32>,
    version: u64,
    closed: bool,
}

impl StoreInner {
    fn position(&self, id: NotificationId) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    fn insert(&mut self, mut record: NotificationRecord) -> bool {
        if self.position(record.id).is_some() {
            trace!(id = %record.id, "duplicate notification ignored");
            return false;
        }

        if self.read_markers.remove(&record.id) {
            debug!(id = %record.id, "applying early read marker");
            record.is_read = true;
        }
        if let Some(marker) = self.read_all_as_of {
            if record.created_at <= marker {
                record.is_read = true;
            }
        }

        let index = self
            .records
            .partition_point(|held| held.display_order(&record).is_lt());
        self.records.insert(index, record);
        true
    }

    fn mark_read(&mut self, id: NotificationId) -> bool {
        match self.position(id) {
            Some(index) => {
                let record = &mut self.records[index];
                let changed = !record.is_read;
                record.is_read = true;
                changed
            }
            None => {
                debug!(%id, "read marker stored for unknown notification");
                self.read_markers.insert(id);
                if self.read_markers.len() > MAX_READ_MARKERS {
                    if let Some(evicted) = self.read_markers.pop_first() {
                        debug!(id = %evicted, "oldest read marker evicted");
                    }
                }
                false
            }
        }
    }

    fn mark_all_read(&mut self, as_of: DateTime<Utc>) -> bool {
        let mut changed = false;
        for record in self.records.iter_mut().filter(|record| !record.is_read) {
            record.is_read = true;
            changed = true;
        }
        let marker = self.read_all_as_of.map_or(as_of, |held| held.max(as_of));
        if self.read_all_as_of != Some(marker) {
            self.read_all_as_of = Some(marker);
            changed = true;
        }
        changed
    }

    fn merge_full(&mut self, records: Vec<NotificationRecord>) -> bool {
        let incoming: HashSet<NotificationId> = records.iter().map(|record| record.id).collect();
        if let Some(newest) = incoming.iter().max() {
            self.read_markers.retain(|id| id > newest);
        }

        let before = self.records.len();
        self.records.retain(|record| incoming.contains(&record.id));
        let mut changed = self.records.len() != before;

        for record in records {
            match self.position(record.id) {
                Some(index) => {
                    if self.records[index] != record {
                        self.records[index] = record;
                        changed = true;
                    }
                }
                None => {
                    self.records.push(record);
                    changed = true;
                }
            }
        }

        self.records.sort_by(|a, b| a.display_order(b));
        changed
    }

    fn merge_recent(&mut self, records: Vec<NotificationRecord>) -> bool {
        let mut changed = false;

        for mut record in records {
            match self.position(record.id) {
                Some(index) => {
                    record.is_read |= self.records[index].is_read;
                    if self.records[index] != record {
                        self.records[index] = record;
                        changed = true;
                    }
                }
                None => changed |= self.insert(record),
            }
        }

        if changed {
            self.records.sort_by(|a, b| a.display_order(b));
        }
        changed
    }

    /// Drops the polled hint so the count is derived again.
    fn rederive(&mut self) -> bool {
        self.unread_hint.take().is_some()
    }

    fn state(&self) -> StoreState {
        let derived = count_unread(&self.records);
        StoreState {
            notifications: self.records.clone(),
            unread_count: self.unread_hint.unwrap_or(derived),
            server_unread_hint: self.unread_hint,
            read_all_as_of: self.read_all_as_of,
            version: self.version,
        }
    }
}

/// In-memory notification state shared by every engine component.
///
/// Mutations are serialized by an internal mutex; observers are notified
/// after the mutex is released. Observers never see the version go
/// backwards: a snapshot overtaken by a newer delivery is skipped.
pub struct NotificationStore {
    inner: Mutex<StoreInner>,
    observers: ObserverList<StoreState>,
    delivered: AtomicU64,
}

impl NotificationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            observers: ObserverList::new(),
            delivered: AtomicU64::new(0),
        }
    }

    /// Applies a push event (or an optimistic local equivalent).
    ///
    /// Returns true if the observer-visible state changed.
    pub fn apply_event(&self, event: &PushEvent) -> bool {
        if !event.touches_notifications() {
            return false;
        }

        self.mutate(|inner| {
            let changed = match event {
                PushEvent::NewNotification(record) => inner.insert(record.clone()),
                PushEvent::NotificationRead(id) => inner.mark_read(*id),
                PushEvent::AllNotificationsRead => inner.mark_all_read(Utc::now()),
                PushEvent::DocumentProcessed(_) => false,
            };
            inner.rederive() || changed
        })
    }

    /// Merges a list fetched over the request/response path.
    pub fn apply_snapshot(&self, records: Vec<NotificationRecord>, kind: SnapshotKind) -> bool {
        self.mutate(|inner| {
            let changed = match kind {
                SnapshotKind::Full => inner.merge_full(records),
                SnapshotKind::Recent => inner.merge_recent(records),
            };
            inner.rederive() || changed
        })
    }

    /// Records a polled unread count as a display hint.
    pub fn apply_unread_count(&self, count: u32) -> bool {
        self.mutate(|inner| inner.unread_hint.replace(count) != Some(count))
    }

    /// Returns a copy of the current state.
    pub fn state(&self) -> StoreState {
        self.inner.lock().state()
    }

    /// Registers a "store changed" callback.
    pub fn subscribe(&self, observer: impl Fn(&StoreState) + Send + Sync + 'static) -> ObserverId {
        self.observers.add(observer)
    }

    /// Unregisters a callback.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Tears the store down; every later mutation is ignored.
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            let version = inner.version;
            *inner = StoreInner {
                version,
                closed: true,
                ..StoreInner::default()
            };
        }
        self.observers.clear();
        debug!("notification store closed");
    }

    /// Returns true once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn mutate(&self, apply: impl FnOnce(&mut StoreInner) -> bool) -> bool {
        let snapshot = {
            let mut inner = self.inner.lock();
            if inner.closed {
                debug!("store closed; dropping update");
                return false;
            }
            if !apply(&mut inner) {
                return false;
            }
            inner.version += 1;
            inner.state()
        };

        if self.delivered.fetch_max(snapshot.version, Ordering::SeqCst) < snapshot.version {
            self.observers.notify(&snapshot);
        }
        true
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}
