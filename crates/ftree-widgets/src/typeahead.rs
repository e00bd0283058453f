#![forbid(unsafe_code)]

//! Typeahead navigation.
//!
//! Printable keystrokes accumulate into a query that resets after an idle
//! window. Every keystroke searches for the next row whose label starts with
//! the query, scanning forward from the focused row and wrapping to the top.
//!
//! # Search paths
//!
//! - **Materialized rows** (tree not virtualized): every row exists, so the
//!   engine asks the host for its rows, rotates them to start at the focused
//!   row and takes the first prefix match.
//! - **Shadow index** (tree virtualized): the target may not exist yet.
//!   [`find_subtree_match`] walks the [`ShadowIndex`] depth-first, computing
//!   the match's vertical offset. The engine scrolls the host so the target
//!   lands mid-viewport, then waits for the host to report it materialized
//!   before moving focus.
//!
//! # Timing
//!
//! Time is passed in explicitly. The idle timer is checked on every
//! [`Typeahead::handle_key`] and [`Typeahead::tick`], so a keystroke after
//! a pause always starts a new query even when the host does not tick.
//!
//! ```text
//!         printable key                       idle window elapsed
//!  Idle ─────────────────▶ Accumulating ─────────────────────────▶ Idle
//!                          │    ▲
//!                          └────┘ printable key: append, restart timer,
//!                                 cancel pending wait, search
//! ```
//!
//! # Tracing
//!
//! With the `tracing` feature, emits `typeahead.search`, `typeahead.focus`,
//! `typeahead.reset`, `typeahead.scroll` and `typeahead.abandon` debug
//! events.

use ftree_core::event::KeyEvent;
use ftree_runtime::cancellation::CancellationSource;
use ftree_runtime::materialize::{Materialization, MaterializationWaiter};
use ftree_runtime::timer::IdleTimer;
use unicode_segmentation::UnicodeSegmentation;
use web_time::{Duration, Instant};

use crate::rotate::rotated;
use crate::shadow_index::{ROOT_ID, ShadowIndex};

/// Default idle window after which the query resets.
pub const DEFAULT_IDLE_WINDOW_MS: u64 = 300;
/// Default bound on waiting for a scrolled-to row to materialize.
pub const DEFAULT_MATERIALIZE_TIMEOUT_MS: u64 = 1000;
/// Minimum idle window accepted by [`TypeaheadConfig::validated`].
pub const MIN_IDLE_WINDOW_MS: u64 = 50;
/// Maximum idle window accepted by [`TypeaheadConfig::validated`].
pub const MAX_IDLE_WINDOW_MS: u64 = 2000;

/// Typeahead timing and unit configuration.
///
/// # Environment Variables
///
/// | Variable | Meaning |
/// |----------|---------|
/// | `FTREE_TYPEAHEAD_IDLE_MS` | Idle window in milliseconds |
/// | `FTREE_TYPEAHEAD_WAIT_MS` | Materialization timeout; `0` waits forever |
/// | `FTREE_TYPEAHEAD_UNIT_SCALE` | Cells per row-height unit |
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TypeaheadConfig {
    /// Quiet period after the last keystroke before the query resets.
    /// Default: 300ms.
    pub idle_window: Duration,

    /// How long a scrolled-to row may take to materialize before focus is
    /// abandoned. `None` waits until the next keystroke cancels it.
    /// Default: 1s.
    pub materialize_timeout: Option<Duration>,

    /// Scroll units per row-height unit, applied to match offsets.
    /// Default: 1.0.
    pub unit_scale: f64,
}

impl Default for TypeaheadConfig {
    fn default() -> Self {
        Self {
            idle_window: Duration::from_millis(DEFAULT_IDLE_WINDOW_MS),
            materialize_timeout: Some(Duration::from_millis(DEFAULT_MATERIALIZE_TIMEOUT_MS)),
            unit_scale: 1.0,
        }
    }
}

impl TypeaheadConfig {
    /// Set the idle window.
    #[must_use]
    pub fn with_idle_window(mut self, window: Duration) -> Self {
        self.idle_window = window;
        self
    }

    /// Set the materialization timeout.
    #[must_use]
    pub fn with_materialize_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.materialize_timeout = timeout;
        self
    }

    /// Set the scroll unit scale.
    #[must_use]
    pub fn with_unit_scale(mut self, scale: f64) -> Self {
        self.unit_scale = scale;
        self
    }

    /// Defaults overridden by environment variables, then validated.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("FTREE_TYPEAHEAD_IDLE_MS")
            && let Ok(ms) = val.trim().parse::<u64>()
        {
            config.idle_window = Duration::from_millis(ms);
        }

        if let Some(val) = lookup("FTREE_TYPEAHEAD_WAIT_MS")
            && let Ok(ms) = val.trim().parse::<u64>()
        {
            config.materialize_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        if let Some(val) = lookup("FTREE_TYPEAHEAD_UNIT_SCALE")
            && let Ok(scale) = val.trim().parse::<f64>()
        {
            config.unit_scale = scale;
        }

        config.validated()
    }

    /// Clamp values to safe ranges.
    ///
    /// - `idle_window` clamped to 50-2000ms
    /// - `materialize_timeout` no shorter than the idle window
    /// - `unit_scale` reset to 1.0 unless finite and positive
    #[must_use]
    pub fn validated(mut self) -> Self {
        let idle_ms = u64::try_from(self.idle_window.as_millis())
            .unwrap_or(u64::MAX)
            .clamp(MIN_IDLE_WINDOW_MS, MAX_IDLE_WINDOW_MS);
        self.idle_window = Duration::from_millis(idle_ms);
        self.materialize_timeout = self
            .materialize_timeout
            .map(|timeout| timeout.max(self.idle_window));
        if !self.unit_scale.is_finite() || self.unit_scale <= 0.0 {
            self.unit_scale = 1.0;
        }
        self
    }
}

/// A row found by [`find_subtree_match`].
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Matched row id.
    pub id: String,
    /// Distance from the top of the traversal to the bottom of the matched
    /// row, in row-height units.
    pub offset: f64,
}

enum Walk {
    Found(Match),
    Exhausted { offset: f64, past_active: bool },
}

struct Scan<'a> {
    index: &'a ShadowIndex,
    needle: String,
    active_id: Option<&'a str>,
    row_height: f64,
    fresh: bool,
    first: Option<Match>,
    path: Vec<&'a str>,
}

impl<'a> Scan<'a> {
    fn walk(&mut self, subtree_id: &'a str, mut offset: f64, mut past_active: bool) -> Walk {
        let index = self.index;
        self.path.push(subtree_id);
        for row in index.get(subtree_id) {
            offset += self.row_height;
            let hit = row.text.to_lowercase().starts_with(&self.needle);
            let is_active = self.active_id == Some(row.id.as_str());

            if hit && !past_active && self.first.is_none() && !(self.fresh && is_active) {
                self.first = Some(Match {
                    id: row.id.clone(),
                    offset,
                });
            }
            if hit && past_active {
                return Walk::Found(Match {
                    id: row.id.clone(),
                    offset,
                });
            }
            if is_active {
                past_active = true;
            }
            if let Some(child) = row.sub_tree_id.as_deref() {
                // A malformed index could point back at an ancestor.
                if self.path.contains(&child) {
                    continue;
                }
                match self.walk(child, offset, past_active) {
                    Walk::Found(found) => return Walk::Found(found),
                    Walk::Exhausted {
                        offset: nested,
                        past_active: passed,
                    } => {
                        offset = nested;
                        past_active = passed;
                    }
                }
            }
        }
        self.path.pop();
        Walk::Exhausted {
            offset,
            past_active,
        }
    }
}

/// Find the next row under `subtree_id` whose label starts with `query`.
///
/// Rows are visited depth-first in visual order, each advancing the offset by
/// `row_height`. The first match after `active_id` wins; failing that, the
/// first match before it (wraparound). When `query` is a single grapheme the
/// active row itself is not a wraparound candidate, so a fresh search moves
/// off the focused row. Matching ignores case.
///
/// Returns `None` for an empty query or when nothing matches.
#[must_use]
pub fn find_subtree_match(
    index: &ShadowIndex,
    subtree_id: &str,
    query: &str,
    active_id: Option<&str>,
    row_height: f64,
) -> Option<Match> {
    if query.is_empty() {
        return None;
    }
    let mut scan = Scan {
        index,
        needle: query.to_lowercase(),
        active_id,
        row_height,
        fresh: is_fresh_query(query),
        first: None,
        path: Vec::new(),
    };
    match scan.walk(subtree_id, 0.0, false) {
        Walk::Found(found) => Some(found),
        Walk::Exhausted { .. } => scan.first,
    }
}

fn is_fresh_query(query: &str) -> bool {
    query.graphemes(true).nth(1).is_none() && !query.is_empty()
}

/// A rendered row offered to the materialized search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedRow {
    /// Row id.
    pub id: String,
    /// Comparable label.
    pub name: String,
    /// Whether any ancestor is collapsed.
    pub under_collapsed: bool,
}

/// Scrollable viewport the engine positions before a deferred focus.
pub trait ScrollContainer {
    /// Visible height in scroll units.
    fn viewport_height(&self) -> f64;
    /// Current vertical scroll offset.
    fn scroll_top(&self) -> f64;
    /// Set the vertical scroll offset. Implementations clamp to their
    /// scrollable range.
    fn set_scroll_top(&mut self, top: f64);
}

/// What the typeahead engine needs from the widget hosting it.
pub trait TypeaheadHost {
    /// Id of the focused row.
    fn focused_id(&self) -> Option<&str>;
    /// Move focus to the row `id`.
    fn focus(&mut self, id: &str);
    /// Rendered rows in visual order.
    fn materialized_rows(&self) -> Vec<MaterializedRow>;
    /// Whether the row `id` currently exists.
    fn is_materialized(&self, id: &str) -> bool;
    /// Height of one row, in row-height units.
    fn row_height(&self) -> f64;
    /// Whether rows are virtualized.
    fn is_virtualized(&self) -> bool;
    /// The scroll container, if one is attached.
    fn scroll_container(&mut self) -> Option<&mut dyn ScrollContainer>;
}

/// Whether the engine handled a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The key extended the query; do not let it reach other handlers.
    Consumed,
    /// Not a typeahead key.
    Ignored,
}

impl KeyOutcome {
    /// Whether the key was consumed.
    #[must_use]
    pub const fn is_consumed(self) -> bool {
        matches!(self, Self::Consumed)
    }
}

#[derive(Debug)]
struct PendingFocus {
    wait: Materialization,
    cancel: CancellationSource,
}

/// Keystroke accumulator and search driver.
#[derive(Debug)]
pub struct Typeahead {
    config: TypeaheadConfig,
    query: String,
    idle: IdleTimer,
    waiter: MaterializationWaiter,
    pending: Option<PendingFocus>,
}

impl Default for Typeahead {
    fn default() -> Self {
        Self::new(TypeaheadConfig::default())
    }
}

impl Typeahead {
    /// Create an idle engine. The config is validated first.
    #[must_use]
    pub fn new(config: TypeaheadConfig) -> Self {
        let config = config.validated();
        Self {
            idle: IdleTimer::new(config.idle_window),
            config,
            query: String::new(),
            waiter: MaterializationWaiter::new(),
            pending: None,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TypeaheadConfig {
        &self.config
    }

    /// Replace the configuration. A running idle window keeps its deadline.
    pub fn set_config(&mut self, config: TypeaheadConfig) {
        self.config = config.validated();
        self.idle.set_window(self.config.idle_window);
    }

    /// Accumulated query, empty when idle.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Row a deferred focus is waiting for.
    #[must_use]
    pub fn pending_target(&self) -> Option<String> {
        self.pending.as_ref().map(|pending| pending.wait.target())
    }

    /// Earliest instant at which [`tick`](Self::tick) has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.idle.deadline(), self.waiter.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Feed a key event.
    ///
    /// A printable, unchorded key-down is appended to the query and
    /// triggers a search; the caller must stop propagating it when
    /// [`KeyOutcome::Consumed`] is returned. Any other key is ignored and
    /// leaves the query untouched.
    pub fn handle_key<H: TypeaheadHost + ?Sized>(
        &mut self,
        key: &KeyEvent,
        now: Instant,
        host: &mut H,
        index: &ShadowIndex,
    ) -> KeyOutcome {
        self.expire_idle(now);
        let Some(ch) = key.typeahead_char() else {
            return KeyOutcome::Ignored;
        };
        self.query.push(ch);
        self.idle.restart(now);
        self.cancel_pending();
        self.search(now, host, index);
        KeyOutcome::Consumed
    }

    /// Advance timers: reset an idle query and abandon overdue waits.
    pub fn tick<H: TypeaheadHost + ?Sized>(&mut self, now: Instant, host: &mut H) {
        self.expire_idle(now);
        if self.waiter.expire(now) > 0 {
            self.settle_pending(host);
        }
    }

    /// Materialization hook, called by the host after each render pass.
    pub fn on_render<H: TypeaheadHost + ?Sized>(&mut self, host: &mut H) {
        if self.pending.is_none() {
            return;
        }
        self.waiter.notify(|id| host.is_materialized(id));
        self.settle_pending(host);
    }

    /// Cancel the idle timer and any pending focus, and clear the query.
    pub fn teardown(&mut self) {
        self.idle.cancel();
        self.query.clear();
        self.cancel_pending();
        self.waiter.cancel_all();
    }

    fn expire_idle(&mut self, now: Instant) {
        if self.idle.poll(now) {
            #[cfg(feature = "tracing")]
            tracing::debug!(message = "typeahead.reset", query = %self.query);
            self.query.clear();
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
        }
    }

    fn settle_pending<H: TypeaheadHost + ?Sized>(&mut self, host: &mut H) {
        let Some(pending) = &self.pending else {
            return;
        };
        let Some(outcome) = pending.wait.try_take() else {
            return;
        };
        self.pending = None;
        match outcome {
            Ok(id) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(message = "typeahead.focus", target = %id, deferred = true);
                host.focus(&id);
            }
            #[cfg(feature = "tracing")]
            Err(err) => {
                tracing::debug!(message = "typeahead.abandon", error = %err);
            }
            #[cfg(not(feature = "tracing"))]
            Err(_) => {}
        }
    }

    fn search<H: TypeaheadHost + ?Sized>(&mut self, now: Instant, host: &mut H, index: &ShadowIndex) {
        let virtualized = host.is_virtualized();
        #[cfg(feature = "tracing")]
        tracing::debug!(message = "typeahead.search", query = %self.query, virtualized);
        if virtualized {
            self.search_shadow(now, host, index);
        } else {
            self.search_materialized(host);
        }
    }

    fn search_materialized<H: TypeaheadHost + ?Sized>(&mut self, host: &mut H) {
        let rows: Vec<MaterializedRow> = host
            .materialized_rows()
            .into_iter()
            .filter(|row| !row.under_collapsed)
            .collect();
        let active = host
            .focused_id()
            .and_then(|focused| rows.iter().position(|row| row.id == focused));
        // A fresh search starts past the focused row.
        let skip = usize::from(is_fresh_query(&self.query) && active.is_some());
        let needle = self.query.to_lowercase();
        let target = rotated(&rows, active.unwrap_or(0))
            .skip(skip)
            .find(|row| row.name.to_lowercase().starts_with(&needle))
            .map(|row| row.id.clone());
        if let Some(id) = target {
            #[cfg(feature = "tracing")]
            tracing::debug!(message = "typeahead.focus", target = %id, deferred = false);
            host.focus(&id);
        }
    }

    fn search_shadow<H: TypeaheadHost + ?Sized>(
        &mut self,
        now: Instant,
        host: &mut H,
        index: &ShadowIndex,
    ) {
        let active = host.focused_id().map(str::to_owned);
        let row_height = host.row_height();
        let Some(found) =
            find_subtree_match(index, ROOT_ID, &self.query, active.as_deref(), row_height)
        else {
            return;
        };
        let Some(container) = host.scroll_container() else {
            return;
        };
        let top = found.offset * self.config.unit_scale - container.viewport_height() / 2.0;
        container.set_scroll_top(top);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            message = "typeahead.scroll",
            target = %found.id,
            offset = found.offset,
            scroll_top = top
        );

        let cancel = CancellationSource::new();
        let wait =
            self.waiter
                .wait_for(found.id, now, self.config.materialize_timeout, cancel.token());
        self.pending = Some(PendingFocus { wait, cancel });
        // The target may already exist.
        self.on_render(host);
    }
}

impl Drop for Typeahead {
    fn drop(&mut self) {
        self.teardown();
    }
}
