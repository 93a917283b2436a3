//! Bearer credential boundary.
//!
//! The engine never refreshes credentials itself. It reads the current token
//! whenever it opens a connection or issues a request, and reports rejections
//! back so the surrounding auth layer can act on them.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Supplies the bearer token used by both transports.
pub trait CredentialSource: Send + Sync {
    /// Returns the current bearer token, if any.
    fn bearer_token(&self) -> Option<String>;

    /// Called when the server rejected the current token.
    fn on_rejected(&self) {}
}

/// A credential source holding a replaceable token.
///
/// The auth layer calls [`SharedToken::set`] after a refresh; the next
/// reconnect attempt picks the new value up.
#[derive(Debug, Default)]
pub struct SharedToken {
    token: RwLock<Option<String>>,
    rejections: AtomicU64,
}

impl SharedToken {
    /// Creates a source holding `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            rejections: AtomicU64::new(0),
        }
    }

    /// Creates a source with no token.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replaces the token.
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    /// Removes the token (e.g. on logout).
    pub fn clear(&self) {
        *self.token.write() = None;
    }

    /// Number of rejections reported since creation.
    pub fn rejection_count(&self) -> u64 {
        self.rejections.load(Ordering::SeqCst)
    }
}

impl CredentialSource for SharedToken {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn on_rejected(&self) {
        self.rejections.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_token_lifecycle() {
        let source = SharedToken::empty();
        assert_eq!(source.bearer_token(), None);

        source.set("first");
        assert_eq!(source.bearer_token().as_deref(), Some("first"));

        source.set("refreshed");
        assert_eq!(source.bearer_token().as_deref(), Some("refreshed"));

        source.clear();
        assert_eq!(source.bearer_token(), None);
    }

    #[test]
    fn rejections_are_counted() {
        let source = SharedToken::new("stale");
        source.on_rejected();
        source.on_rejected();
        assert_eq!(source.rejection_count(), 2);
    }
}
