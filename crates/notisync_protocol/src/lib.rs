//! # NotiSync Protocol
//!
//! Wire types and JSON codecs for the NotiSync notification engine.
//!
//! This crate provides:
//! - `NotificationRecord` as served by the REST endpoints and push channel
//! - `PushEvent` for inbound push frames
//! - `PushCommand` for outbound push frames
//! - REST response bodies (`UnreadCountResponse`)
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Frame format
//!
//! Every push frame is a JSON object with a `type` discriminator and a
//! `data` payload:
//!
//! ```text
//! {"type": "notification_new",      "data": { ...record... }}
//! {"type": "notification_read",     "data": {"id": 5}}
//! {"type": "notification_read_all", "data": null}
//! {"type": "document_processed",    "data": {"document_id": 12}}
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod record;
mod rest;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{PushCommand, PushEvent};
pub use record::{DocumentId, NotificationId, NotificationRecord};
pub use rest::UnreadCountResponse;
