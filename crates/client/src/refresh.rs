//! Single-flight token refresh
//!
//! The first request to need a new token performs the refresh; every request
//! arriving while it is in flight parks a one-shot continuation in the queue.
//! When the refresh settles the queue is drained in FIFO order with the same
//! outcome before the in-flight flag is cleared.

use crate::error::RefreshError;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// New token, or the reason there is none
pub type RefreshOutcome = Result<String, RefreshError>;

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// Serializes token refreshes for one client instance
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        // Never held across an await and never panics while held
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a refresh is currently running
    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    /// Number of requests parked behind the running refresh
    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Run `refresh` unless one is already in flight, in which case wait for its outcome
    pub async fn run<F, Fut>(&self, refresh: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome>,
    {
        let waiter = {
            let mut state = self.lock();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("Refresh already in flight, queueing request");
            return rx.await.unwrap_or(Err(RefreshError::Abandoned));
        }

        let mut guard = InFlight {
            coordinator: self,
            settled: false,
        };
        let outcome = refresh().await;
        guard.settle(&outcome);
        outcome
    }

    fn settle(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        if !waiters.is_empty() {
            debug!(count = waiters.len(), ok = outcome.is_ok(), "Draining queued requests");
        }
        for waiter in waiters {
            // The waiting request may have been dropped meanwhile
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Drains the queue even when the refreshing future is dropped mid-flight
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(&Err(RefreshError::Abandoned));
        }
    }
}
