//! Request/response API boundary.

use crate::error::{NotifyError, NotifyResult};
use async_trait::async_trait;
use notisync_protocol::{NotificationId, NotificationRecord};
use parking_lot::Mutex;

/// Number of records returned by the recent listing.
pub const RECENT_LIMIT: usize = 5;

/// Notification endpoints of the server.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Lists every notification of the user.
    async fn list_all(&self) -> NotifyResult<Vec<NotificationRecord>>;

    /// Lists the most recent notifications (at most [`RECENT_LIMIT`]).
    async fn list_recent(&self) -> NotifyResult<Vec<NotificationRecord>>;

    /// Returns the server's unread count.
    async fn unread_count(&self) -> NotifyResult<u32>;

    /// Marks one notification as read.
    async fn mark_read(&self, id: NotificationId) -> NotifyResult<()>;

    /// Marks every notification as read.
    async fn mark_all_read(&self) -> NotifyResult<()>;
}

/// A call recorded by [`MockApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCall {
    /// `list_all`
    ListAll,
    /// `list_recent`
    ListRecent,
    /// `unread_count`
    UnreadCount,
    /// `mark_read`
    MarkRead(NotificationId),
    /// `mark_all_read`
    MarkAllRead,
}

/// Failure injected into a [`MockApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// The request never reached the server.
    Network,
    /// The server answered with this status.
    Status(u16),
}

impl MockFailure {
    fn to_error(self) -> NotifyError {
        match self {
            MockFailure::Network => NotifyError::transport_retryable("connection refused"),
            MockFailure::Status(status @ (401 | 403)) => {
                NotifyError::AuthenticationFailed(format!("status {status}"))
            }
            MockFailure::Status(status) => NotifyError::ServerError {
                status,
                message: "mock failure".into(),
            },
        }
    }
}

/// In-memory server for tests.
///
/// Holds a list of records that the read endpoints serve and the write
/// endpoints mutate. Every call is recorded.
#[derive(Debug, Default)]
pub struct MockApi {
    records: Mutex<Vec<NotificationRecord>>,
    calls: Mutex<Vec<ApiCall>>,
    failure: Mutex<Option<MockFailure>>,
    unread_override: Mutex<Option<u32>>,
}

impl MockApi {
    /// Creates a server with no notifications.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a server holding `records`.
    pub fn with_records(records: Vec<NotificationRecord>) -> Self {
        let api = Self::new();
        api.set_records(records);
        api
    }

    /// Replaces the server-side records.
    pub fn set_records(&self, records: Vec<NotificationRecord>) {
        *self.records.lock() = records;
    }

    /// Adds a server-side record.
    pub fn add_record(&self, record: NotificationRecord) {
        self.records.lock().push(record);
    }

    /// Server-side records.
    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records.lock().clone()
    }

    /// Makes every call fail with `failure` until cleared with `None`.
    pub fn set_failure(&self, failure: Option<MockFailure>) {
        *self.failure.lock() = failure;
    }

    /// Reports `count` as unread regardless of the records.
    pub fn set_unread_override(&self, count: Option<u32>) {
        *self.unread_override.lock() = count;
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    /// Number of calls equal to `call`.
    pub fn call_count(&self, call: ApiCall) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    fn record_call(&self, call: ApiCall) -> NotifyResult<()> {
        self.calls.lock().push(call);
        match *self.failure.lock() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn sorted(&self) -> Vec<NotificationRecord> {
        let mut records = self.records.lock().clone();
        records.sort_by(|a, b| a.display_order(b));
        records
    }
}

#[async_trait]
impl NotificationApi for MockApi {
    async fn list_all(&self) -> NotifyResult<Vec<NotificationRecord>> {
        self.record_call(ApiCall::ListAll)?;
        Ok(self.sorted())
    }

    async fn list_recent(&self) -> NotifyResult<Vec<NotificationRecord>> {
        self.record_call(ApiCall::ListRecent)?;
        let mut records = self.sorted();
        records.truncate(RECENT_LIMIT);
        Ok(records)
    }

    async fn unread_count(&self) -> NotifyResult<u32> {
        self.record_call(ApiCall::UnreadCount)?;
        if let Some(count) = *self.unread_override.lock() {
            return Ok(count);
        }
        let unread = self.records.lock().iter().filter(|r| !r.is_read).count();
        Ok(u32::try_from(unread).unwrap_or(u32::MAX))
    }

    async fn mark_read(&self, id: NotificationId) -> NotifyResult<()> {
        self.record_call(ApiCall::MarkRead(id))?;
        let mut records = self.records.lock();
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.is_read = true;
                Ok(())
            }
            None => Err(NotifyError::ServerError {
                status: 404,
                message: format!("notification {id} not found"),
            }),
        }
    }

    async fn mark_all_read(&self) -> NotifyResult<()> {
        self.record_call(ApiCall::MarkAllRead)?;
        for record in self.records.lock().iter_mut() {
            record.is_read = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record(id: i64, minutes: i64) -> NotificationRecord {
        let base = Utc.timestamp_opt(1_709_280_900, 0).unwrap();
        NotificationRecord::new(id, "system", "title", "message", base + Duration::minutes(minutes))
    }

    #[tokio::test]
    async fn serves_and_mutates_records() {
        let api = MockApi::with_records((1..=7).map(|id| record(id, id)).collect());

        let recent = api.list_recent().await.unwrap();
        let ids: Vec<i64> = recent.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![7, 6, 5, 4, 3]);

        api.mark_read(NotificationId(7)).await.unwrap();
        assert_eq!(api.unread_count().await.unwrap(), 6);

        api.mark_all_read().await.unwrap();
        assert_eq!(api.unread_count().await.unwrap(), 0);

        assert_eq!(
            api.calls(),
            vec![
                ApiCall::ListRecent,
                ApiCall::MarkRead(NotificationId(7)),
                ApiCall::UnreadCount,
                ApiCall::MarkAllRead,
                ApiCall::UnreadCount,
            ]
        );
    }

    #[tokio::test]
    async fn injected_failures() {
        let api = MockApi::with_records(vec![record(1, 0)]);

        api.set_failure(Some(MockFailure::Status(401)));
        assert!(matches!(
            api.list_all().await,
            Err(NotifyError::AuthenticationFailed(_))
        ));

        api.set_failure(Some(MockFailure::Network));
        assert!(api.unread_count().await.unwrap_err().is_retryable());

        api.set_failure(None);
        assert!(matches!(
            api.mark_read(NotificationId(99)).await,
            Err(NotifyError::ServerError { status: 404, .. })
        ));
        assert_eq!(api.call_count(ApiCall::MarkRead(NotificationId(99))), 1);
    }
}
