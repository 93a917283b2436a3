//! Request/response bodies of the notification REST endpoints.

use serde::{Deserialize, Serialize};

/// Body of `GET notifications/unread_count/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    /// Number of unread notifications held by the server.
    pub unread_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_count_body() {
        let body: UnreadCountResponse = serde_json::from_str(r#"{"unread_count": 4}"#).unwrap();
        assert_eq!(body.unread_count, 4);
    }
}
