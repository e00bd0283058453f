#![forbid(unsafe_code)]

//! Canonical key event types.
//!
//! Every key the tree widget receives is normalized into a [`KeyEvent`]
//! before it reaches the typeahead engine or navigation handlers. Events
//! derive `Clone`, `PartialEq`, and `Eq` so tests can build and compare them
//! directly.
//!
//! # Design Notes
//!
//! - `KeyEventKind` defaults to `Press` when the backend cannot distinguish
//!   presses from repeats.
//! - `Modifiers` use bitflags for easy combination.
//! - Named keys (arrows, Enter, function keys) have no printed
//!   representation; only [`KeyCode::Char`] prints.

use bitflags::bitflags;

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code that was pressed.
    pub code: KeyCode,

    /// Modifier keys held during the event.
    pub modifiers: Modifiers,

    /// The type of key event (press, repeat, or release).
    pub kind: KeyEventKind,
}

impl KeyEvent {
    /// Create a new key event with default modifiers and Press kind.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
            kind: KeyEventKind::Press,
        }
    }

    /// Create a key event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Create a key event with a specific kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Check if this is a specific character key.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.code, KeyCode::Char(ch) if ch == c)
    }

    /// Check if Ctrl modifier is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Alt modifier is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Check if Shift modifier is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    /// Check if Super/Meta/Cmd modifier is held.
    #[must_use]
    pub const fn super_key(&self) -> bool {
        self.modifiers.contains(Modifiers::SUPER)
    }

    /// The single character this key prints, if any.
    ///
    /// Named keys print nothing. Control characters (`'\n'`, `'\t'`, ...)
    /// delivered as `Char` are not printable either.
    #[must_use]
    pub fn printed_char(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) if !c.is_control() => Some(c),
            _ => None,
        }
    }

    /// The character to append to a typeahead query, if this key is one.
    ///
    /// A key qualifies when it is a key-down (press or repeat), prints
    /// exactly one character, and is not chorded with Ctrl, Alt, or Super.
    /// Shift is allowed so capital letters can be typed.
    #[must_use]
    pub fn typeahead_char(&self) -> Option<char> {
        if self.kind == KeyEventKind::Release {
            return None;
        }
        if self.modifiers.intersects(Modifiers::CHORD) {
            return None;
        }
        self.printed_char()
    }
}

/// Key codes for keyboard events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key.
    Char(char),

    /// Enter/Return key.
    Enter,

    /// Escape key.
    Escape,

    /// Backspace key.
    Backspace,

    /// Tab key.
    Tab,

    /// Shift+Tab (back-tab).
    BackTab,

    /// Delete key.
    Delete,

    /// Home key.
    Home,

    /// End key.
    End,

    /// Page Up key.
    PageUp,

    /// Page Down key.
    PageDown,

    /// Up arrow key.
    Up,

    /// Down arrow key.
    Down,

    /// Left arrow key.
    Left,

    /// Right arrow key.
    Right,

    /// Function key (F1-F24).
    F(u8),
}

/// The type of key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyEventKind {
    /// Key was pressed (default when not distinguishable).
    #[default]
    Press,

    /// Key is being held (repeat event).
    Repeat,

    /// Key was released.
    Release,
}

bitflags! {
    /// Modifier keys that can be held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
        /// Super/Meta/Command key.
        const SUPER = 0b1000;
        /// Modifiers that turn a character key into a chord.
        const CHORD = Self::ALT.bits() | Self::CTRL.bits() | Self::SUPER.bits();
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}
