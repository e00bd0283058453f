#![forbid(unsafe_code)]

//! Tree widget and typeahead navigation for FrankenTree.
//!
//! # Role in FrankenTree
//! `ftree-widgets` holds the tree widget and the search machinery that lets a
//! user type a row's name to jump to it, including rows that are scrolled
//! out of a virtualized viewport.
//!
//! # Modules
//! - [`tree`]: the [`Tree`](tree::Tree) widget and its [`TreeNode`](tree::TreeNode) model.
//! - [`shadow_index`]: per-subtree child descriptors kept independent of
//!   materialization.
//! - [`typeahead`]: query accumulation, the recursive shadow-index match, and
//!   deferred focus.
//! - [`rotate`]: wraparound rotation used by the materialized search path.
//!
//! # Feature flags
//! - `tracing`: debug events for searches, focus moves, and tree toggles.
//! - `state-persistence`: serde derives for [`TypeaheadConfig`](typeahead::TypeaheadConfig)
//!   and the [`ShadowIndex`](shadow_index::ShadowIndex).

pub mod rotate;
pub mod shadow_index;
pub mod tree;
pub mod typeahead;

pub use shadow_index::{ROOT_ID, ShadowIndex, TreeNodeDescriptor};
pub use tree::{RowContent, Tree, TreeNode};
pub use typeahead::{
    KeyOutcome, Match, MaterializedRow, ScrollContainer, Typeahead, TypeaheadConfig,
    TypeaheadHost, find_subtree_match,
};
