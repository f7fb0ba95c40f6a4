use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default)]
struct DrainState {
    in_flight: usize,
    closed: bool,
}

/// Tracks in-flight requests for the shutdown sequence.
///
/// Every request holds an [`InFlightGuard`] for its whole lifetime. Once
/// intake is closed, [`drained`](Self::drained) resolves as soon as the last
/// guard is dropped.
#[derive(Debug, Clone)]
pub struct DrainCoordinator {
    state: Arc<watch::Sender<DrainState>>,
}

/// Counts one request as in flight until dropped.
#[derive(Debug)]
#[must_use = "the request stops counting as in flight when the guard is dropped"]
pub struct InFlightGuard {
    state: Arc<watch::Sender<DrainState>>,
}

impl Default for DrainCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl DrainCoordinator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(DrainState::default());
        Self { state: Arc::new(tx) }
    }

    pub fn enter(&self) -> InFlightGuard {
        self.state.send_modify(|s| s.in_flight += 1);
        InFlightGuard {
            state: self.state.clone(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.state.borrow().in_flight
    }

    /// Mark intake as stopped. Requests already in flight keep running.
    pub fn close(&self) {
        self.state.send_modify(|s| s.closed = true);
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Resolves once intake is closed and nothing is in flight.
    pub async fn drained(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|s| s.closed && s.in_flight == 0).await;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.in_flight = s.in_flight.saturating_sub(1));
    }
}
