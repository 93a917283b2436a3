//! Push channel frames.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::{DocumentId, NotificationId, NotificationRecord};
use serde::Deserialize;
use serde_json::{json, Value};

const NOTIFICATION_NEW: &str = "notification_new";
const NOTIFICATION_READ: &str = "notification_read";
const NOTIFICATION_READ_ALL: &str = "notification_read_all";
const DOCUMENT_PROCESSED: &str = "document_processed";

/// The `{type, data}` envelope shared by every frame.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn parse(text: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(ProtocolError::invalid_structure("expected JSON object"));
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Deserialize)]
struct IdPayload {
    id: NotificationId,
}

#[derive(Deserialize)]
struct DocumentPayload {
    document_id: DocumentId,
}

/// An event delivered by the server over the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// A notification was created for this user.
    NewNotification(NotificationRecord),
    /// A notification was marked read (possibly from another tab or device).
    NotificationRead(NotificationId),
    /// Every notification was marked read.
    AllNotificationsRead,
    /// A document finished server-side processing.
    DocumentProcessed(DocumentId),
}

impl PushEvent {
    /// Returns the wire discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            PushEvent::NewNotification(_) => NOTIFICATION_NEW,
            PushEvent::NotificationRead(_) => NOTIFICATION_READ,
            PushEvent::AllNotificationsRead => NOTIFICATION_READ_ALL,
            PushEvent::DocumentProcessed(_) => DOCUMENT_PROCESSED,
        }
    }

    /// Returns true if applying this event can change notification state.
    pub fn touches_notifications(&self) -> bool {
        !matches!(self, PushEvent::DocumentProcessed(_))
    }

    /// Decodes a text frame.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        let envelope = Envelope::parse(text)?;

        match envelope.kind.as_str() {
            NOTIFICATION_NEW => Ok(PushEvent::NewNotification(serde_json::from_value(
                envelope.data,
            )?)),
            NOTIFICATION_READ => {
                let payload: IdPayload = serde_json::from_value(envelope.data)?;
                Ok(PushEvent::NotificationRead(payload.id))
            }
            NOTIFICATION_READ_ALL => Ok(PushEvent::AllNotificationsRead),
            DOCUMENT_PROCESSED => {
                let payload: DocumentPayload = serde_json::from_value(envelope.data)?;
                Ok(PushEvent::DocumentProcessed(payload.document_id))
            }
            other => Err(ProtocolError::unknown_type(other)),
        }
    }

    /// Encodes to a text frame, as the server would send it.
    pub fn encode(&self) -> ProtocolResult<String> {
        let data = match self {
            PushEvent::NewNotification(record) => serde_json::to_value(record)?,
            PushEvent::NotificationRead(id) => json!({ "id": id }),
            PushEvent::AllNotificationsRead => Value::Null,
            PushEvent::DocumentProcessed(document_id) => json!({ "document_id": document_id }),
        };
        Ok(json!({ "type": self.type_name(), "data": data }).to_string())
    }
}

/// A command sent by the client over the push channel.
///
/// Commands are fire-and-forget; the server never acknowledges them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushCommand {
    /// Mark a single notification read.
    MarkRead(NotificationId),
    /// Mark every notification read.
    MarkAllRead,
}

impl PushCommand {
    /// Returns the wire discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            PushCommand::MarkRead(_) => NOTIFICATION_READ,
            PushCommand::MarkAllRead => NOTIFICATION_READ_ALL,
        }
    }

    /// Encodes to a text frame.
    pub fn encode(&self) -> ProtocolResult<String> {
        let data = match self {
            PushCommand::MarkRead(id) => json!({ "id": id }),
            PushCommand::MarkAllRead => Value::Null,
        };
        Ok(json!({ "type": self.type_name(), "data": data }).to_string())
    }

    /// Decodes a text frame, as the server would read it.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        let envelope = Envelope::parse(text)?;

        match envelope.kind.as_str() {
            NOTIFICATION_READ => {
                let payload: IdPayload = serde_json::from_value(envelope.data)?;
                Ok(PushCommand::MarkRead(payload.id))
            }
            NOTIFICATION_READ_ALL => Ok(PushCommand::MarkAllRead),
            other => Err(ProtocolError::unknown_type(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn decode_new_notification() {
        let frame = r#"{"type":"notification_new","data":{
            "id":3,"notification_type":"share","title":"Shared","message":"Bob shared a file",
            "is_read":false,"created_at":"2024-05-02T08:00:00Z","document_id":9,
            "document_title":"Q1 report","time_since":"just now"}}"#;

        match PushEvent::decode(frame).unwrap() {
            PushEvent::NewNotification(record) => {
                assert_eq!(record.id, NotificationId(3));
                assert_eq!(record.document_id, Some(DocumentId(9)));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn decode_read_events() {
        let read = PushEvent::decode(r#"{"type":"notification_read","data":{"id":5}}"#).unwrap();
        assert_eq!(read, PushEvent::NotificationRead(NotificationId(5)));

        let all = PushEvent::decode(r#"{"type":"notification_read_all","data":null}"#).unwrap();
        assert_eq!(all, PushEvent::AllNotificationsRead);

        // `data` may be omitted entirely for read-all
        let all = PushEvent::decode(r#"{"type":"notification_read_all"}"#).unwrap();
        assert_eq!(all, PushEvent::AllNotificationsRead);
    }

    #[test]
    fn decode_document_processed() {
        let event =
            PushEvent::decode(r#"{"type":"document_processed","data":{"document_id":12}}"#)
                .unwrap();
        assert_eq!(event, PushEvent::DocumentProcessed(DocumentId(12)));
        assert!(!event.touches_notifications());
    }

    #[test]
    fn decode_rejects_malformed_frames() {
        assert!(matches!(
            PushEvent::decode("not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            PushEvent::decode("[1,2,3]"),
            Err(ProtocolError::InvalidStructure { .. })
        ));
        assert!(matches!(
            PushEvent::decode(r#"{"type":"presence","data":{}}"#),
            Err(ProtocolError::UnknownType { .. })
        ));
        assert!(PushEvent::decode(r#"{"type":"notification_read","data":{"id":"x"}}"#).is_err());
        assert!(PushEvent::decode(r#"{"type":"notification_new","data":null}"#).is_err());
        assert!(PushEvent::decode(r#"{"data":{"id":1}}"#).is_err());
    }

    #[test]
    fn encode_commands() {
        let json: Value =
            serde_json::from_str(&PushCommand::MarkRead(NotificationId(5)).encode().unwrap())
                .unwrap();
        assert_eq!(json, json!({"type": "notification_read", "data": {"id": 5}}));

        let json: Value =
            serde_json::from_str(&PushCommand::MarkAllRead.encode().unwrap()).unwrap();
        assert_eq!(json, json!({"type": "notification_read_all", "data": null}));
    }

    #[test]
    fn server_side_encoding_is_decodable() {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        let record = NotificationRecord::new(4, "comment", "New comment", "on Q1", created_at);
        let event = PushEvent::NewNotification(record);

        assert_eq!(PushEvent::decode(&event.encode().unwrap()).unwrap(), event);
        assert_eq!(
            PushCommand::decode(&PushCommand::MarkAllRead.encode().unwrap()).unwrap(),
            PushCommand::MarkAllRead
        );
    }
}
