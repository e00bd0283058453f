#![forbid(unsafe_code)]

//! Cooperative runtime primitives for FrankenTree.
//!
//! # Role in FrankenTree
//! Everything in the tree widget runs on one logical thread and reacts to
//! discrete events: key presses, ticks, and render passes. Nothing here
//! blocks. Time is passed in explicitly as an [`Instant`](web_time::Instant)
//! so every state machine is deterministic under test.
//!
//! # Primary responsibilities
//! - **[`timer::IdleTimer`]**: a single owned timer slot with
//!   cancel-then-restart semantics.
//! - **[`cancellation`]**: source/token pairs used to abandon in-flight work.
//! - **[`observer`]**: visibility observation with automatic teardown when
//!   its callback or configuration changes.
//! - **[`materialize`]**: cancellable, time-bounded waits for a row to exist.

pub mod cancellation;
pub mod materialize;
pub mod observer;
pub mod timer;

pub use cancellation::{CancellationSource, CancellationToken};
pub use materialize::{Materialization, MaterializationWaiter, WaitError, WaitState};
pub use observer::{
    ObservationPrimitive, ObserverConfig, PrimitiveFactory, Span, SpanIntersection,
    SpanIntersectionFactory, VisibilityCallback, VisibilityEntry, VisibilityObserver,
};
pub use timer::{IdleTimer, TimerHandle};
