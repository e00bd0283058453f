#![forbid(unsafe_code)]

//! Single-slot idle timer.
//!
//! [`IdleTimer`] owns at most one pending deadline. Arming it again replaces
//! the previous deadline in the same call, so there is never a window where
//! two deadlines are live. The timer does not run on its own: callers feed
//! it the current [`Instant`] through [`IdleTimer::poll`] (typically on tick
//! and before handling each key), and it reports whether the deadline has
//! passed since it was armed.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────┐  restart(now)  ┌────────────────────┐
//! │ Disarmed │───────────────▶│ Armed { deadline } │◀──┐ restart(now)
//! └──────────┘                └────────────────────┘───┘ (replaces deadline)
//!      ▲                        │            │
//!      │        cancel()        │            │ poll(now >= deadline) == true
//!      └────────────────────────┴────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use ftree_runtime::timer::IdleTimer;
//! use web_time::{Duration, Instant};
//!
//! let mut timer = IdleTimer::new(Duration::from_millis(300));
//! let t0 = Instant::now();
//! timer.restart(t0);
//! assert!(!timer.poll(t0 + Duration::from_millis(299)));
//! assert!(timer.poll(t0 + Duration::from_millis(300)));
//! // Fires at most once per arm.
//! assert!(!timer.poll(t0 + Duration::from_millis(900)));
//! ```

use web_time::{Duration, Instant};

/// Identity of one arming of an [`IdleTimer`].
///
/// Each call to [`IdleTimer::restart`] yields a fresh handle; handles from
/// earlier arms compare unequal and are reported as stale by
/// [`IdleTimer::is_current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    generation: u64,
}

impl TimerHandle {
    /// Monotonic arm counter backing this handle.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Disarmed,
    Armed { deadline: Instant, handle: TimerHandle },
}

/// An exclusively owned, single-deadline idle timer.
#[derive(Debug, Clone)]
pub struct IdleTimer {
    window: Duration,
    slot: Slot,
    generation: u64,
}

impl IdleTimer {
    /// Create a disarmed timer with the given idle window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slot: Slot::Disarmed,
            generation: 0,
        }
    }

    /// The idle window measured from each restart.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Change the idle window. A pending deadline keeps its old value.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Cancel any pending deadline and arm a new one at `now + window`.
    pub fn restart(&mut self, now: Instant) -> TimerHandle {
        self.generation = self.generation.wrapping_add(1);
        let handle = TimerHandle {
            generation: self.generation,
        };
        self.slot = Slot::Armed {
            deadline: now + self.window,
            handle,
        };
        handle
    }

    /// Drop the pending deadline, if any.
    ///
    /// Returns `true` if a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.is_armed();
        self.slot = Slot::Disarmed;
        was_armed
    }

    /// Check the deadline against `now`.
    ///
    /// Returns `true` exactly once per arm, the first time `now` reaches the
    /// deadline; the timer is disarmed when it fires.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.slot {
            Slot::Armed { deadline, .. } if now >= deadline => {
                self.slot = Slot::Disarmed;
                true
            }
            _ => false,
        }
    }

    /// Whether a deadline is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(self.slot, Slot::Armed { .. })
    }

    /// The pending deadline, if armed.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.slot {
            Slot::Armed { deadline, .. } => Some(deadline),
            Slot::Disarmed => None,
        }
    }

    /// Whether `handle` identifies the pending arm.
    #[must_use]
    pub fn is_current(&self, handle: TimerHandle) -> bool {
        matches!(self.slot, Slot::Armed { handle: h, .. } if h == handle)
    }

    /// Time left until the deadline, saturating at zero. `None` if disarmed.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}
