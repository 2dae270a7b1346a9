use std::time::{Duration, Instant};

/// Trailing-edge debouncer: fires once, `quiet` after the last
/// [`touch`](Self::touch).
///
/// Time is passed in explicitly so callers decide the clock.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet, deadline: None }
    }

    /// Record an event at `now`, pushing the deadline back.
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
        log::trace!("debounce armed for {:?}", self.quiet);
    }

    /// How long until the deadline, zero if already passed. `None` when idle.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    /// `true` exactly once per burst, when `now` has reached the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
