use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of "now" for the engine. The session samples it exactly once per
/// tick, so every scheduling decision is a pure function of that sample and
/// a whole play-through can be replayed against a synthetic clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Used by tests and headless replay
/// drivers; no sleeps required.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    /// Jumps to an absolute elapsed time since the clock was created.
    pub fn set_elapsed(&self, elapsed: Duration) {
        *self.offset.lock().unwrap() = elapsed;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }
}
