//! Debounce state machine for reconciliation passes
//!
//! The coordinator never touches the filesystem or a clock; callers pass in
//! `Instant`s and ask [`WatchCoordinator::poll`] whether a pass is due.

use std::time::{Duration, Instant};

/// Which watched tree a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchRoot {
    Library,
    Managed,
}

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    /// A change was seen; a pass starts at `deadline` unless more arrive
    Pending { deadline: Instant },
    /// A pass is running; `queued` records changes seen meanwhile
    Reconciling { queued: bool },
}

/// What the next pass has to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileRequest {
    /// Rebuild the library index before classifying
    pub rebuild_index: bool,
    /// Drop cached fingerprints and rehash everything
    pub full: bool,
}

impl ReconcileRequest {
    fn merge(&mut self, other: ReconcileRequest) {
        self.rebuild_index |= other.rebuild_index;
        self.full |= other.full;
    }
}

/// Debounces change notifications into reconciliation passes
#[derive(Debug)]
pub struct WatchCoordinator {
    state: WatchState,
    debounce: Duration,
    /// Work accumulated for the next pass
    next: ReconcileRequest,
}

impl WatchCoordinator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: WatchState::Idle,
            debounce,
            next: ReconcileRequest::default(),
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn is_idle(&self) -> bool {
        self.state == WatchState::Idle
    }

    /// A raw change notification under `root`.
    pub fn on_change(&mut self, root: WatchRoot, now: Instant) {
        if root == WatchRoot::Library {
            self.next.rebuild_index = true;
        }
        self.arm(now + self.debounce);
    }

    /// Notifications were lost; the next pass rebuilds everything from disk.
    pub fn on_overflow(&mut self, now: Instant) {
        self.next.merge(ReconcileRequest {
            rebuild_index: true,
            full: true,
        });
        self.arm(now + self.debounce);
    }

    /// An explicit request for a pass, due immediately.
    pub fn request(&mut self, request: ReconcileRequest, now: Instant) {
        self.next.merge(request);
        self.state = match self.state {
            WatchState::Idle | WatchState::Pending { .. } => WatchState::Pending { deadline: now },
            WatchState::Reconciling { .. } => WatchState::Reconciling { queued: true },
        };
    }

    fn arm(&mut self, deadline: Instant) {
        self.state = match self.state {
            WatchState::Idle | WatchState::Pending { .. } => WatchState::Pending { deadline },
            WatchState::Reconciling { .. } => WatchState::Reconciling { queued: true },
        };
    }

    /// Start a pass if the debounce interval has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<ReconcileRequest> {
        match self.state {
            WatchState::Pending { deadline } if now >= deadline => {
                self.state = WatchState::Reconciling { queued: false };
                Some(std::mem::take(&mut self.next))
            }
            _ => None,
        }
    }

    /// The running pass finished and its result was delivered.
    pub fn on_reconciled(&mut self, now: Instant) {
        if let WatchState::Reconciling { queued } = self.state {
            self.state = if queued {
                WatchState::Pending {
                    deadline: now + self.debounce,
                }
            } else {
                WatchState::Idle
            };
        }
    }

    /// The running pass was superseded; redo its work on the next pass.
    pub fn on_superseded(&mut self, request: ReconcileRequest, now: Instant) {
        self.next.merge(request);
        if let WatchState::Reconciling { .. } = self.state {
            self.state = WatchState::Reconciling { queued: true };
        }
        self.on_reconciled(now);
    }

    /// When [`Self::poll`] should next be called, if a pass is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            WatchState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }
}
