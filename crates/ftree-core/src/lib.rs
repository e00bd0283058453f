#![forbid(unsafe_code)]

//! Core: canonical key events for FrankenTree.
//!
//! `ftree-core` is the input layer. It owns the normalized key types the
//! runtime and widgets consume, plus the small amount of classification
//! logic (which keys count as printable typeahead input) that must behave
//! identically everywhere.

pub mod event;

pub use event::{KeyCode, KeyEvent, KeyEventKind, Modifiers};
