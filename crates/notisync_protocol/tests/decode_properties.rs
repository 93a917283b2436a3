//! Property tests for frame decoding.

use notisync_protocol::{NotificationId, PushCommand, PushEvent};
use proptest::prelude::*;

proptest! {
    #[test]
    fn arbitrary_text_never_panics(text in ".*") {
        let _ = PushEvent::decode(&text);
        let _ = PushCommand::decode(&text);
    }

    #[test]
    fn arbitrary_object_with_known_type_never_panics(
        kind in prop::sample::select(vec![
            "notification_new",
            "notification_read",
            "notification_read_all",
            "document_processed",
        ]),
        data in prop::sample::select(vec![
            "null", "{}", "[]", "1", "\"x\"", "{\"id\":null}", "{\"document_id\":\"7\"}",
        ]),
    ) {
        let frame = format!(r#"{{"type":"{kind}","data":{data}}}"#);
        let _ = PushEvent::decode(&frame);
    }

    #[test]
    fn read_frames_carry_their_id(id in any::<i64>()) {
        let frame = format!(r#"{{"type":"notification_read","data":{{"id":{id}}}}}"#);
        prop_assert_eq!(
            PushEvent::decode(&frame).unwrap(),
            PushEvent::NotificationRead(NotificationId(id))
        );
        prop_assert_eq!(
            PushCommand::decode(&frame).unwrap(),
            PushCommand::MarkRead(NotificationId(id))
        );
    }
}
