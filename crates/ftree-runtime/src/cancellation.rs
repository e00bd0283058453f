#![forbid(unsafe_code)]

//! Cooperative cancellation for in-flight waits.
//!
//! A [`CancellationSource`] hands out [`CancellationToken`]s. Work that may be
//! superseded (a materialization wait started by an older typeahead query)
//! holds a token and checks it; the owner of the source calls
//! [`CancellationSource::cancel`] when the work is no longer wanted.
//!
//! Tokens can also park a [`Waker`] so a future suspended on the work is
//! woken as soon as cancellation is requested, instead of on its next
//! unrelated poll.
//!
//! # Example
//!
//! ```
//! use ftree_runtime::cancellation::CancellationSource;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//! assert!(!token.is_cancelled());
//!
//! source.cancel();
//! assert!(token.is_cancelled());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Waker;

/// A cloneable view of a cancellation request.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationInner>,
}

/// The control handle that triggers cancellation.
///
/// Dropping the source does **not** cancel its tokens; call
/// [`cancel`](Self::cancel) explicitly.
pub struct CancellationSource {
    inner: Arc<CancellationInner>,
}

struct CancellationInner {
    cancelled: AtomicBool,
    wakers: Mutex<Vec<Waker>>,
}

impl CancellationSource {
    /// Create a new cancellation source with an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationInner {
                cancelled: AtomicBool::new(false),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Obtain a token that observes this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Request cancellation and wake every parked waker.
    ///
    /// Idempotent: later calls find no wakers and change nothing.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let wakers = {
            let mut guard = self.inner.wakers.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for waker in wakers {
            waker.wake();
        }
    }

    /// Check whether cancellation has already been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    /// A token that can never be cancelled.
    #[must_use]
    pub fn never() -> Self {
        CancellationSource::new().token()
    }

    /// Returns `true` if cancellation has been requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Park `waker` until cancellation is requested.
    ///
    /// If cancellation already happened the waker is woken immediately.
    /// Wakers that would wake the same task as a parked one are not
    /// duplicated.
    pub fn register_waker(&self, waker: &Waker) {
        if self.is_cancelled() {
            waker.wake_by_ref();
            return;
        }
        let mut guard = self.inner.wakers.lock().unwrap_or_else(|e| e.into_inner());
        if !guard.iter().any(|parked| parked.will_wake(waker)) {
            guard.push(waker.clone());
        }
    }

    /// Whether both tokens observe the same source.
    #[must_use]
    pub fn same_source(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
