//! # NotiSync Engine
//!
//! Client-side engine that keeps a user's notifications and unread count
//! current against a document-processing server.
//!
//! This crate provides:
//! - Push channel supervision with capped exponential backoff
//! - A convergent notification store with idempotent merge rules
//! - A command façade (optimistic local update, best-effort push, durable request)
//! - A periodic unread-count poller
//! - Session wiring with deterministic teardown
//!
//! ## Architecture
//!
//! Two transports feed one store:
//!
//! ```text
//!   push channel ──> TransportSupervisor ──┐
//!                                          ├──> NotificationStore ──> observers
//!   REST API ──> NotificationService ──────┘
//!                      ^
//!          ReconciliationPoller (every 60s)
//! ```
//!
//! ## Key Invariants
//!
//! - Every change to records or the unread count goes through the store
//! - Applying the same event twice is the same as applying it once
//! - Read flags never flip back to unread except from a full server listing
//! - The displayed unread count equals the number of unread records, except
//!   while a polled count is standing in for it
//! - At most one live push connection and one pending reconnect per session

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod config;
mod credentials;
mod error;
mod http;
mod observer;
mod poller;
mod service;
mod session;
mod store;
mod supervisor;
mod transport;
mod websocket;

pub use api::{ApiCall, MockApi, MockFailure, NotificationApi, RECENT_LIMIT};
pub use config::{EngineConfig, PollConfig, ReconnectConfig};
pub use credentials::{CredentialSource, SharedToken};
pub use error::{NotifyError, NotifyResult};
pub use http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestClient, RestApi};
pub use observer::ObserverId;
pub use poller::ReconciliationPoller;
pub use service::NotificationService;
pub use session::NotificationSession;
pub use store::{NotificationStore, SnapshotKind, StoreState};
pub use supervisor::{ConnectionState, TransportSupervisor};
pub use transport::{MockConnector, MockOutcome, MockServer, PushChannel, PushConnector};
pub use websocket::WebSocketConnector;

pub use notisync_protocol::{DocumentId, NotificationId, NotificationRecord, PushCommand, PushEvent};
