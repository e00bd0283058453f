#![forbid(unsafe_code)]

//! Visibility observation with managed lifecycle.
//!
//! # Design
//!
//! A platform visibility primitive (something that reports when observed
//! targets enter or leave a root region) is abstracted as
//! [`ObservationPrimitive`]. [`VisibilityObserver`] owns one primitive built
//! from a callback and an [`ObserverConfig`] and exposes the three consumer
//! operations: `observe`, `unobserve`, `disconnect`.
//!
//! The primitive is rebuilt whenever the callback (compared by `Rc`
//! identity) or the configuration (compared by value) changes. The old
//! primitive is disconnected first, which drops every prior observation:
//! callers must re-observe their targets after such a change. Dropping the
//! observer disconnects a live primitive exactly once.
//!
//! [`SpanIntersection`] is the concrete primitive used by the tree widget.
//! Targets are one-dimensional extents (row spans along the scroll axis),
//! and the root is the viewport widened by the configured margin.
//!
//! # Failure Modes
//!
//! - **Detached target**: a target whose bounds cannot be resolved is
//!   reported as not intersecting; no error is surfaced.
//! - **Re-entrant callback**: the callback runs while the primitive is
//!   mutably borrowed. It must not call back into the same observer; write
//!   to shared state (`Rc<RefCell<..>>`) and act on it after `update`
//!   returns.

use std::hash::Hash;
use std::rc::Rc;

use ahash::AHashMap;

/// A closed interval along the scroll axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Span {
    /// Leading edge.
    pub start: f64,
    /// Trailing edge (`end >= start`).
    pub end: f64,
}

impl Span {
    /// Create a span, ordering the edges if given reversed.
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Extent of the span.
    #[must_use]
    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the span has zero extent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() <= 0.0
    }

    /// Whether `point` lies within the closed span.
    #[must_use]
    pub fn contains(&self, point: f64) -> bool {
        point >= self.start && point <= self.end
    }

    /// Length of the overlap with `other` (zero when disjoint).
    #[must_use]
    pub fn overlap(&self, other: &Span) -> f64 {
        (self.end.min(other.end) - self.start.max(other.start)).max(0.0)
    }

    /// Grow both edges by `margin` (negative margins shrink, never inverting).
    #[must_use]
    pub fn expand(&self, margin: f64) -> Self {
        let start = self.start - margin;
        let end = self.end + margin;
        if end < start {
            let mid = (self.start + self.end) / 2.0;
            Self { start: mid, end: mid }
        } else {
            Self { start, end }
        }
    }
}

/// Configuration for a visibility primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverConfig {
    /// Identifier of the scroll container measured against. `None` means
    /// the top-level viewport.
    pub root: Option<String>,

    /// Amount the root region is grown on both edges before intersection
    /// is measured. Default: 0.
    pub margin: f64,

    /// Visible-ratio thresholds in `[0, 1]`. A change event fires whenever
    /// a target's ratio crosses one of them. `0.0` means "any overlap".
    /// Default: `[0.0]`.
    pub thresholds: Vec<f64>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            root: None,
            margin: 0.0,
            thresholds: vec![0.0],
        }
    }
}

impl ObserverConfig {
    /// Measure against a named scroll container.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Grow the root region by `margin` on both edges.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Use a single threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.thresholds = vec![threshold];
        self
    }

    /// Use a list of thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Return a config with thresholds clamped to `[0, 1]`, sorted,
    /// deduplicated, and non-empty, and with a finite margin.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.thresholds.retain(|t| !t.is_nan());
        for t in &mut self.thresholds {
            *t = t.clamp(0.0, 1.0);
        }
        self.thresholds.sort_by(f64::total_cmp);
        self.thresholds.dedup();
        if self.thresholds.is_empty() {
            self.thresholds.push(0.0);
        }
        if !self.margin.is_finite() {
            self.margin = 0.0;
        }
        self
    }
}

/// One visibility change record.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityEntry<K> {
    /// The observed target.
    pub target: K,
    /// Whether the target overlaps the root region.
    pub is_intersecting: bool,
    /// Fraction of the target inside the root region, in `[0, 1]`.
    pub ratio: f64,
    /// Target bounds, `None` when the target could not be resolved.
    pub bounds: Option<Span>,
    /// The root region the target was measured against.
    pub root_bounds: Span,
}

/// Callback receiving batches of visibility changes.
pub type VisibilityCallback<K> = Rc<dyn Fn(&[VisibilityEntry<K>])>;

/// A platform visibility-detection primitive.
pub trait ObservationPrimitive<K> {
    /// Start observing `target`. Observing an observed target is a no-op.
    fn observe(&mut self, target: K);

    /// Stop observing `target`.
    fn unobserve(&mut self, target: &K);

    /// Stop observing every target.
    fn disconnect(&mut self);
}

/// Builds primitives from a callback and configuration.
pub trait PrimitiveFactory<K> {
    /// The primitive this factory produces.
    type Primitive: ObservationPrimitive<K>;

    /// Construct a fresh primitive with no observations.
    fn create(&self, callback: VisibilityCallback<K>, config: &ObserverConfig) -> Self::Primitive;
}

/// Lifecycle manager around an [`ObservationPrimitive`].
///
/// # Invariants
///
/// 1. The primitive always reflects the current callback and config.
/// 2. Rebuilding disconnects the previous primitive before replacing it.
/// 3. A live primitive is disconnected exactly once on drop.
pub struct VisibilityObserver<K, F: PrimitiveFactory<K>> {
    factory: F,
    callback: VisibilityCallback<K>,
    config: ObserverConfig,
    primitive: F::Primitive,
    generation: u64,
    live: bool,
}

impl<K, F: PrimitiveFactory<K>> VisibilityObserver<K, F> {
    /// Build an observer and its first primitive.
    pub fn new(factory: F, callback: VisibilityCallback<K>, config: ObserverConfig) -> Self {
        let config = config.validated();
        let primitive = factory.create(Rc::clone(&callback), &config);
        Self {
            factory,
            callback,
            config,
            primitive,
            generation: 0,
            live: true,
        }
    }

    /// Start observing `target`.
    pub fn observe(&mut self, target: K) {
        self.live = true;
        self.primitive.observe(target);
    }

    /// Stop observing `target`.
    pub fn unobserve(&mut self, target: &K) {
        self.primitive.unobserve(target);
    }

    /// Stop observing every target.
    pub fn disconnect(&mut self) {
        if self.live {
            self.primitive.disconnect();
            self.live = false;
            tracing::debug!(
                message = "observer.disconnect",
                generation = self.generation
            );
        }
    }

    /// Replace the callback. A different `Rc` rebuilds the primitive.
    ///
    /// Returns `true` if the primitive was rebuilt.
    pub fn set_callback(&mut self, callback: VisibilityCallback<K>) -> bool {
        if Rc::ptr_eq(&self.callback, &callback) {
            return false;
        }
        self.callback = callback;
        self.rebuild("callback");
        true
    }

    /// Replace the configuration. A config that differs by value rebuilds
    /// the primitive.
    ///
    /// Returns `true` if the primitive was rebuilt.
    pub fn set_config(&mut self, config: ObserverConfig) -> bool {
        let config = config.validated();
        if config == self.config {
            return false;
        }
        self.config = config;
        self.rebuild("config");
        true
    }

    fn rebuild(&mut self, reason: &'static str) {
        if self.live {
            self.primitive.disconnect();
        }
        self.primitive = self
            .factory
            .create(Rc::clone(&self.callback), &self.config);
        self.generation += 1;
        self.live = true;
        tracing::debug!(
            message = "observer.rebuild",
            generation = self.generation,
            reason
        );
    }

    /// Current configuration (validated).
    #[must_use]
    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Number of times the primitive has been rebuilt.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the primitive has not been disconnected.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// The current primitive.
    #[must_use]
    pub fn primitive(&self) -> &F::Primitive {
        &self.primitive
    }

    /// The current primitive, mutably (for host-driven updates).
    pub fn primitive_mut(&mut self) -> &mut F::Primitive {
        &mut self.primitive
    }
}

impl<K, F: PrimitiveFactory<K>> Drop for VisibilityObserver<K, F> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<K, F: PrimitiveFactory<K>> std::fmt::Debug for VisibilityObserver<K, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityObserver")
            .field("config", &self.config)
            .field("generation", &self.generation)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SpanIntersection
// ---------------------------------------------------------------------------

/// Last reported (intersecting, threshold bucket) pair for a target.
type Reported = (bool, usize);

/// One-dimensional intersection primitive.
///
/// The host drives it: after layout or scroll changes, call
/// [`update`](Self::update) with the viewport span and a bounds lookup.
/// Entries are dispatched in observation order, one per target whose
/// intersecting state or threshold bucket changed. The first evaluation
/// after `observe` always reports.
pub struct SpanIntersection<K> {
    callback: VisibilityCallback<K>,
    margin: f64,
    thresholds: Vec<f64>,
    root: Option<String>,
    targets: AHashMap<K, Option<Reported>>,
    order: Vec<K>,
    stale: usize,
}

impl<K: Eq + Hash + Clone> SpanIntersection<K> {
    /// Create a primitive for `config`.
    pub fn new(callback: VisibilityCallback<K>, config: &ObserverConfig) -> Self {
        let config = config.clone().validated();
        Self {
            callback,
            margin: config.margin,
            thresholds: config.thresholds,
            root: config.root,
            targets: AHashMap::new(),
            order: Vec::new(),
            stale: 0,
        }
    }

    /// Number of observed targets.
    #[must_use]
    pub fn observed_len(&self) -> usize {
        self.targets.len()
    }

    /// Whether `target` is observed.
    #[must_use]
    pub fn is_observing(&self, target: &K) -> bool {
        self.targets.contains_key(target)
    }

    /// The root identifier this primitive measures against.
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    fn compact(&mut self) {
        if self.stale > 0 {
            let targets = &self.targets;
            self.order.retain(|key| targets.contains_key(key));
            self.stale = 0;
        }
    }

    /// Measure every observed target against `viewport` and dispatch
    /// changes.
    ///
    /// Returns the number of entries dispatched.
    pub fn update(&mut self, viewport: Span, bounds: impl Fn(&K) -> Option<Span>) -> usize {
        self.compact();
        let root_bounds = viewport.expand(self.margin);
        let mut entries = Vec::new();

        for key in &self.order {
            let Some(last) = self.targets.get_mut(key) else {
                continue;
            };
            let target_bounds = bounds(key);
            let (is_intersecting, ratio) = match target_bounds {
                None => (false, 0.0),
                Some(b) if b.is_empty() => {
                    let inside = root_bounds.contains(b.start);
                    (inside, if inside { 1.0 } else { 0.0 })
                }
                Some(b) => {
                    let overlap = b.overlap(&root_bounds);
                    (overlap > 0.0, (overlap / b.len()).clamp(0.0, 1.0))
                }
            };
            let bucket = self
                .thresholds
                .iter()
                .filter(|&&t| if t == 0.0 { is_intersecting } else { ratio >= t })
                .count();
            let reported = (is_intersecting, bucket);
            if *last != Some(reported) {
                *last = Some(reported);
                entries.push(VisibilityEntry {
                    target: key.clone(),
                    is_intersecting,
                    ratio,
                    bounds: target_bounds,
                    root_bounds,
                });
            }
        }

        if !entries.is_empty() {
            (self.callback)(&entries);
        }
        entries.len()
    }
}

impl<K: Eq + Hash + Clone> ObservationPrimitive<K> for SpanIntersection<K> {
    fn observe(&mut self, target: K) {
        if self.targets.contains_key(&target) {
            return;
        }
        self.compact();
        self.targets.insert(target.clone(), None);
        self.order.push(target);
    }

    fn unobserve(&mut self, target: &K) {
        if self.targets.remove(target).is_some() {
            self.stale += 1;
        }
    }

    fn disconnect(&mut self) {
        self.targets.clear();
        self.order.clear();
        self.stale = 0;
    }
}

/// Factory for [`SpanIntersection`] primitives.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanIntersectionFactory;

impl<K: Eq + Hash + Clone> PrimitiveFactory<K> for SpanIntersectionFactory {
    type Primitive = SpanIntersection<K>;

    fn create(&self, callback: VisibilityCallback<K>, config: &ObserverConfig) -> Self::Primitive {
        SpanIntersection::new(callback, config)
    }
}
