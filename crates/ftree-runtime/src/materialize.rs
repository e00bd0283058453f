#![forbid(unsafe_code)]

//! Cancellable waits for a row to materialize.
//!
//! Under virtualization a row that is scrolled to does not exist until the
//! next render pass builds it. [`MaterializationWaiter`] tracks waits keyed
//! by target id; the host calls [`notify`](MaterializationWaiter::notify)
//! from its render hook with an existence check, and every wait whose target
//! now exists resolves. Waits are bounded by an optional deadline
//! ([`expire`](MaterializationWaiter::expire)) and abandoned when their
//! [`CancellationToken`] is cancelled.
//!
//! Each wait is observed through a [`Materialization`] handle, which is a
//! [`Future`] for async hosts and also exposes [`state`](Materialization::state)
//! and [`try_take`](Materialization::try_take) for frame-driven hosts.
//!
//! # Example
//!
//! ```
//! use ftree_runtime::cancellation::CancellationToken;
//! use ftree_runtime::materialize::{MaterializationWaiter, WaitState};
//! use web_time::{Duration, Instant};
//!
//! let mut waiter = MaterializationWaiter::new();
//! let now = Instant::now();
//! let wait = waiter.wait_for("row-42", now, Some(Duration::from_secs(1)), CancellationToken::never());
//!
//! // Render pass without the row: still pending.
//! waiter.notify(|_| false);
//! assert_eq!(wait.state(), WaitState::Pending);
//!
//! // Render pass that built the row.
//! waiter.notify(|id| id == "row-42");
//! assert_eq!(wait.try_take(), Some(Ok("row-42".to_owned())));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use web_time::{Duration, Instant};

use crate::cancellation::CancellationToken;

/// Why a materialization wait ended without its target appearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The wait was superseded and its token cancelled.
    Cancelled {
        /// Id the wait was looking for.
        target: String,
    },
    /// The deadline passed before the target materialized.
    TimedOut {
        /// Id the wait was looking for.
        target: String,
        /// How long the wait was outstanding.
        waited: Duration,
    },
}

impl WaitError {
    /// Id the failed wait was looking for.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Cancelled { target } | Self::TimedOut { target, .. } => target,
        }
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled { target } => {
                write!(f, "wait for `{target}` was cancelled")
            }
            Self::TimedOut { target, waited } => {
                write!(
                    f,
                    "`{target}` did not materialize within {}ms",
                    waited.as_millis()
                )
            }
        }
    }
}

impl std::error::Error for WaitError {}

/// Observable state of a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitState {
    /// Target has not appeared yet.
    Pending,
    /// Target materialized; carries its id.
    Ready(String),
    /// Wait ended without the target.
    Failed(WaitError),
}

struct WaitSlot {
    target: String,
    started: Instant,
    deadline: Option<Instant>,
    token: CancellationToken,
    outcome: Option<Result<String, WaitError>>,
    taken: bool,
    waker: Option<Waker>,
}

impl WaitSlot {
    /// Settle on cancellation if it was requested while pending.
    fn observe_cancellation(&mut self) {
        if self.outcome.is_none() && self.token.is_cancelled() {
            self.outcome = Some(Err(WaitError::Cancelled {
                target: self.target.clone(),
            }));
        }
    }
}

/// Settle a pending slot and wake its task outside the borrow.
fn settle(slot: &RefCell<WaitSlot>, outcome: Result<String, WaitError>) {
    let waker = {
        let mut slot = slot.borrow_mut();
        if slot.outcome.is_some() {
            return;
        }
        slot.outcome = Some(outcome);
        slot.waker.take()
    };
    if let Some(waker) = waker {
        waker.wake();
    }
}

/// Handle to one materialization wait.
///
/// Cloning shares the same wait.
#[derive(Clone)]
pub struct Materialization {
    slot: Rc<RefCell<WaitSlot>>,
}

impl Materialization {
    /// Id this wait is looking for.
    #[must_use]
    pub fn target(&self) -> String {
        self.slot.borrow().target.clone()
    }

    /// Current state. Cancellation is observed here even before the waiter
    /// next runs.
    #[must_use]
    pub fn state(&self) -> WaitState {
        let mut slot = self.slot.borrow_mut();
        slot.observe_cancellation();
        match &slot.outcome {
            None => WaitState::Pending,
            Some(Ok(id)) => WaitState::Ready(id.clone()),
            Some(Err(err)) => WaitState::Failed(err.clone()),
        }
    }

    /// Whether the wait has not settled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state(), WaitState::Pending)
    }

    /// Take the outcome once it is settled.
    ///
    /// Returns `None` while pending and on every call after the first
    /// successful take.
    pub fn try_take(&self) -> Option<Result<String, WaitError>> {
        let mut slot = self.slot.borrow_mut();
        slot.observe_cancellation();
        if slot.taken {
            return None;
        }
        let outcome = slot.outcome.clone()?;
        slot.taken = true;
        Some(outcome)
    }
}

impl fmt::Debug for Materialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Materialization")
            .field("target", &slot.target)
            .field("settled", &slot.outcome.is_some())
            .finish()
    }
}

impl Future for Materialization {
    type Output = Result<String, WaitError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        slot.observe_cancellation();
        if let Some(outcome) = &slot.outcome {
            return Poll::Ready(outcome.clone());
        }
        let parked = slot
            .waker
            .as_ref()
            .is_some_and(|waker| waker.will_wake(cx.waker()));
        if !parked {
            slot.waker = Some(cx.waker().clone());
        }
        let token = slot.token.clone();
        drop(slot);
        token.register_waker(cx.waker());
        Poll::Pending
    }
}

/// Registry of outstanding materialization waits.
#[derive(Default)]
pub struct MaterializationWaiter {
    waits: Vec<Rc<RefCell<WaitSlot>>>,
}

impl MaterializationWaiter {
    /// Create an empty waiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting for `target`.
    ///
    /// `timeout` of `None` waits until notified or cancelled.
    pub fn wait_for(
        &mut self,
        target: impl Into<String>,
        now: Instant,
        timeout: Option<Duration>,
        token: CancellationToken,
    ) -> Materialization {
        let target = target.into();
        tracing::debug!(
            message = "materialize.wait",
            target = %target,
            timeout_ms = timeout.map(|t| t.as_millis() as u64)
        );
        let slot = Rc::new(RefCell::new(WaitSlot {
            target,
            started: now,
            deadline: timeout.map(|t| now + t),
            token,
            outcome: None,
            taken: false,
            waker: None,
        }));
        self.waits.push(Rc::clone(&slot));
        Materialization { slot }
    }

    /// Materialization hook: resolve every pending wait whose target exists.
    ///
    /// Cancelled waits are settled and dropped along the way. Returns the
    /// number of waits that resolved successfully.
    pub fn notify(&mut self, exists: impl Fn(&str) -> bool) -> usize {
        let mut resolved = 0;
        self.waits.retain(|slot| {
            let (cancelled, target) = {
                let s = slot.borrow();
                if s.outcome.is_some() {
                    return false;
                }
                (s.token.is_cancelled(), s.target.clone())
            };
            if cancelled {
                settle(slot, Err(WaitError::Cancelled { target }));
                return false;
            }
            if exists(&target) {
                tracing::debug!(message = "materialize.ready", target = %target);
                settle(slot, Ok(target));
                resolved += 1;
                return false;
            }
            true
        });
        resolved
    }

    /// Fail every pending wait whose deadline is at or before `now`.
    ///
    /// Returns the number of waits that timed out.
    pub fn expire(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        self.waits.retain(|slot| {
            let (cancelled, overdue, target, started) = {
                let s = slot.borrow();
                if s.outcome.is_some() {
                    return false;
                }
                let overdue = s.deadline.is_some_and(|deadline| now >= deadline);
                (s.token.is_cancelled(), overdue, s.target.clone(), s.started)
            };
            if cancelled {
                settle(slot, Err(WaitError::Cancelled { target }));
                return false;
            }
            if !overdue {
                return true;
            }
            let waited = now.saturating_duration_since(started);
            tracing::debug!(
                message = "materialize.timeout",
                target = %target,
                waited_ms = waited.as_millis() as u64
            );
            settle(slot, Err(WaitError::TimedOut { target, waited }));
            expired += 1;
            false
        });
        expired
    }

    /// Fail every pending wait as cancelled.
    pub fn cancel_all(&mut self) {
        for slot in self.waits.drain(..) {
            let target = slot.borrow().target.clone();
            settle(&slot, Err(WaitError::Cancelled { target }));
        }
    }

    /// Number of waits still outstanding.
    ///
    /// Waits whose token has been cancelled are not counted.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.waits
            .iter()
            .filter(|slot| {
                let s = slot.borrow();
                s.outcome.is_none() && !s.token.is_cancelled()
            })
            .count()
    }

    /// Earliest pending deadline, for hosts that schedule ticks.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.waits
            .iter()
            .filter_map(|slot| {
                let s = slot.borrow();
                if s.outcome.is_none() && !s.token.is_cancelled() {
                    s.deadline
                } else {
                    None
                }
            })
            .min()
    }
}

impl fmt::Debug for MaterializationWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializationWaiter")
            .field("pending", &self.pending())
            .finish()
    }
}
