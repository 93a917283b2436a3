//! Notification records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Server-assigned notification identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub i64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for NotificationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of the document a notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A single notification as held by the client.
///
/// Field names follow the server's JSON representation. `time_since` and
/// `document_title` are display values rendered by the server and are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Unique, immutable identifier.
    pub id: NotificationId,
    /// Opaque kind tag (e.g. `document_process`, `share`).
    #[serde(rename = "notification_type")]
    pub kind: String,
    /// Display title.
    pub title: String,
    /// Display message.
    pub message: String,
    /// Whether the notification has been read.
    pub is_read: bool,
    /// Creation time on the server.
    pub created_at: DateTime<Utc>,
    /// Related document, if any.
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    /// Title of the related document, if any.
    #[serde(default)]
    pub document_title: Option<String>,
    /// Server-rendered relative age ("5 minutes ago").
    #[serde(default)]
    pub time_since: Option<String>,
}

impl NotificationRecord {
    /// Creates an unread record with no related document.
    pub fn new(
        id: impl Into<NotificationId>,
        kind: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            title: title.into(),
            message: message.into(),
            is_read: false,
            created_at,
            document_id: None,
            document_title: None,
            time_since: None,
        }
    }

    /// Sets the read flag.
    pub fn with_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    /// Sets the related document.
    pub fn with_document(mut self, document_id: i64, title: Option<String>) -> Self {
        self.document_id = Some(DocumentId(document_id));
        self.document_title = title;
        self
    }

    /// Display ordering: newest first, ties broken by descending id.
    pub fn display_order(&self, other: &Self) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}
