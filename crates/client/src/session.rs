//! Session lifecycle signals
//!
//! The client never navigates anywhere itself. When a session cannot be renewed it
//! broadcasts [`SessionEvent::Expired`] and the hosting application decides what
//! that means: a redirect, a re-login prompt or an exit code.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// The refresh endpoint answered without a token
    MissingToken,
    /// The refresh call failed or was rejected
    RefreshFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new access token was stored
    Refreshed,
    /// The stored token was discarded; the user has to log in at `login_route`
    Expired {
        reason: ExpiryReason,
        login_route: &'static str,
    },
}

/// Fan-out of session events to any number of subscribers
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
