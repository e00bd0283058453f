#![forbid(unsafe_code)]

//! Wraparound rotation of ordered rows.
//!
//! Typeahead scans "forward from focus, then wrap to the top". Rotating the
//! row sequence so the focused row sits at position 0 turns that into a plain
//! front-to-back scan.
//!
//! ```
//! use ftree_widgets::rotate::rotate_to;
//!
//! assert_eq!(rotate_to(&['a', 'b', 'c', 'd'], 2), vec!['c', 'd', 'a', 'b']);
//! ```

/// Iterate `items` starting at `start` and wrapping around to the front.
///
/// Position `i` of the iteration yields `items[(start + i) % items.len()]`.
/// An out-of-range `start` is reduced modulo the length; an empty slice
/// yields nothing.
pub fn rotated<T>(items: &[T], start: usize) -> impl Iterator<Item = &T> {
    let split = if items.is_empty() {
        0
    } else {
        start % items.len()
    };
    let (head, tail) = items.split_at(split);
    tail.iter().chain(head.iter())
}

/// Owned rotation of `items` so that it begins at `start`.
#[must_use]
pub fn rotate_to<T: Clone>(items: &[T], start: usize) -> Vec<T> {
    rotated(items, start).cloned().collect()
}
