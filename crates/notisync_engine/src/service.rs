//! Command façade over the store and both transports.
//!
//! Reads go over the request/response path and merge into the store.
//! Writes update the store optimistically, nudge the push channel when it
//! is open, and always issue the durable request. A failed request is
//! reported to the caller but never rolled back; the next authoritative
//! read or push event reconciles.

use crate::api::NotificationApi;
use crate::error::{NotifyError, NotifyResult};
use crate::store::{NotificationStore, SnapshotKind, StoreState};
use crate::supervisor::TransportSupervisor;
use notisync_protocol::{NotificationId, PushCommand, PushEvent};
use std::sync::Arc;
use tracing::{debug, warn};

/// High-level notification operations.
pub struct NotificationService {
    store: Arc<NotificationStore>,
    api: Arc<dyn NotificationApi>,
    push: Arc<TransportSupervisor>,
}

impl NotificationService {
    /// Creates a façade over `store`, `api` and `push`.
    pub fn new(
        store: Arc<NotificationStore>,
        api: Arc<dyn NotificationApi>,
        push: Arc<TransportSupervisor>,
    ) -> Self {
        Self { store, api, push }
    }

    /// Fetches every notification and replaces the held set with it.
    pub async fn fetch_all(&self) -> NotifyResult<StoreState> {
        self.fetch(SnapshotKind::Full).await
    }

    /// Fetches the most recent notifications and merges them in.
    ///
    /// Records outside the recent window are kept.
    pub async fn fetch_recent(&self) -> NotifyResult<StoreState> {
        self.fetch(SnapshotKind::Recent).await
    }

    /// Fetches the server's unread count and records it as a display hint.
    pub async fn fetch_unread_count(&self) -> NotifyResult<u32> {
        self.ensure_open()?;
        let count = self.api.unread_count().await.inspect_err(|e| {
            warn!(error = %e, "unread count fetch failed");
        })?;
        self.ensure_open()?;
        self.store.apply_unread_count(count);
        Ok(count)
    }

    /// Marks one notification as read.
    ///
    /// The store changes before the request is sent; an error means only
    /// that the server did not confirm.
    pub async fn mark_as_read(&self, id: NotificationId) -> NotifyResult<()> {
        self.ensure_open()?;
        self.store.apply_event(&PushEvent::NotificationRead(id));
        if !self.push.send(PushCommand::MarkRead(id)) {
            debug!(%id, "push channel unavailable; relying on request");
        }
        self.api.mark_read(id).await.inspect_err(|e| {
            warn!(%id, error = %e, "mark as read not confirmed by server");
        })
    }

    /// Marks every notification as read.
    pub async fn mark_all_as_read(&self) -> NotifyResult<()> {
        self.ensure_open()?;
        self.store.apply_event(&PushEvent::AllNotificationsRead);
        if !self.push.send(PushCommand::MarkAllRead) {
            debug!("push channel unavailable; relying on request");
        }
        self.api.mark_all_read().await.inspect_err(|e| {
            warn!(error = %e, "mark all as read not confirmed by server");
        })
    }

    /// The store this façade writes to.
    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    /// The push supervisor this façade sends through.
    pub fn supervisor(&self) -> &Arc<TransportSupervisor> {
        &self.push
    }

    async fn fetch(&self, kind: SnapshotKind) -> NotifyResult<StoreState> {
        self.ensure_open()?;
        let request = match kind {
            SnapshotKind::Full => self.api.list_all().await,
            SnapshotKind::Recent => self.api.list_recent().await,
        };
        let records = request.inspect_err(|e| {
            warn!(?kind, error = %e, "notification fetch failed");
        })?;

        self.ensure_open()?;
        debug!(?kind, count = records.len(), "merging fetched notifications");
        self.store.apply_snapshot(records, kind);
        Ok(self.store.state())
    }

    fn ensure_open(&self) -> NotifyResult<()> {
        if self.store.is_closed() {
            return Err(NotifyError::SessionClosed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("push", &self.push)
            .finish_non_exhaustive()
    }
}
