use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::ReloadError;

/// Where the hot-reload cycle currently is.
///
/// ```text
/// Idle -> Pending -> Reloading -> Idle
///                              -> Failed -> (acknowledge) Idle
///                                        -> (next change) Pending
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    /// A change was seen and is waiting out the debounce window or the queue.
    Pending,
    Reloading,
    /// The last pass failed; the previous live tree is still in place.
    Failed,
}

/// A point-in-time copy of [`ReloadStatus`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub state: ReloadState,
    /// Error of the most recent failed pass. Kept until the next success.
    pub last_error: Option<ReloadError>,
    pub changed_at: Instant,
    /// Number of passes finished so far, successful or not.
    pub completed: u64,
}

#[derive(Debug)]
struct Shared {
    snapshot: Mutex<StatusSnapshot>,
    settled: Condvar,
}

/// Shared, observable reload state. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct ReloadStatus {
    shared: Arc<Shared>,
}

impl Default for ReloadStatus {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl ReloadStatus {
    pub fn new(now: Instant) -> Self {
        let snapshot = StatusSnapshot { state: ReloadState::Idle, last_error: None, changed_at: now, completed: 0 };
        Self { shared: Arc::new(Shared { snapshot: Mutex::new(snapshot), settled: Condvar::new() }) }
    }

    fn lock(&self) -> MutexGuard<'_, StatusSnapshot> {
        self.shared.snapshot.lock()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().clone()
    }

    pub fn state(&self) -> ReloadState {
        self.lock().state
    }

    pub fn last_error(&self) -> Option<ReloadError> {
        self.lock().last_error.clone()
    }

    fn transition(snap: &mut StatusSnapshot, state: ReloadState, now: Instant) {
        if snap.state != state {
            log::trace!("reload status {:?} -> {state:?}", snap.state);
        }
        snap.state = state;
        snap.changed_at = now;
    }

    /// A change was observed. Ignored while a pass is running; the pass that
    /// follows will pick it up.
    pub fn mark_pending(&self, now: Instant) {
        let mut snap = self.lock();
        if snap.state != ReloadState::Reloading {
            Self::transition(&mut snap, ReloadState::Pending, now);
        }
    }

    pub fn begin(&self, now: Instant) {
        Self::transition(&mut self.lock(), ReloadState::Reloading, now);
    }

    pub fn succeed(&self, now: Instant) {
        {
            let mut snap = self.lock();
            Self::transition(&mut snap, ReloadState::Idle, now);
            snap.last_error = None;
            snap.completed += 1;
        }
        self.shared.settled.notify_all();
    }

    pub fn fail(&self, err: ReloadError, now: Instant) {
        {
            let mut snap = self.lock();
            Self::transition(&mut snap, ReloadState::Failed, now);
            snap.last_error = Some(err);
            snap.completed += 1;
        }
        self.shared.settled.notify_all();
    }

    /// Leave `Failed` after the error has been shown. The error itself is
    /// kept in [`last_error`](Self::last_error).
    pub fn acknowledge(&self, now: Instant) {
        let mut snap = self.lock();
        if snap.state == ReloadState::Failed {
            Self::transition(&mut snap, ReloadState::Idle, now);
        }
    }

    /// Block until more than `completed` passes have finished, or `timeout`
    /// elapses. Returns the snapshot at that point.
    pub fn wait_completed(&self, completed: u64, timeout: Duration) -> StatusSnapshot {
        let mut guard = self.lock();
        self.shared.settled.wait_while_for(&mut guard, |s| s.completed <= completed, timeout);
        guard.clone()
    }
}
