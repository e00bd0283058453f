#![forbid(unsafe_code)]

//! Shadow index of the tree's logical structure.
//!
//! Under virtualization most rows do not exist, so typeahead cannot search the
//! rendered rows. The [`ShadowIndex`] keeps, for every expanded subtree, the
//! ordered list of its direct children as [`TreeNodeDescriptor`]s. The host
//! calls [`rebuild_shadow_index`] for a subtree whenever its children, its
//! expansion flag, or the virtualization flag change.
//!
//! Each subtree owns exactly one entry, keyed by its own id (top-level rows
//! live under [`ROOT_ID`]). Collapsed and non-virtualized subtrees keep an
//! empty entry rather than none, so a stale list can never be matched.
//!
//! # Example
//!
//! ```
//! use ftree_widgets::shadow_index::{ROOT_ID, ShadowIndex, ShadowSubtree, rebuild_shadow_index};
//! use ftree_widgets::tree::TreeNode;
//!
//! let rows = vec![
//!     TreeNode::new("a", "Apple"),
//!     TreeNode::new("b", "Banana").child(TreeNode::new("b1", "Berry")),
//! ];
//! let mut index = ShadowIndex::new();
//! rebuild_shadow_index(ShadowSubtree::new(ROOT_ID, &rows, true, true), &mut index);
//!
//! let root = index.get(ROOT_ID);
//! assert_eq!(root[1].text, "Banana");
//! assert_eq!(root[1].sub_tree_id.as_deref(), Some("b"));
//! ```

use std::collections::HashMap;

use crate::tree::{RowContent, TreeNode};

/// Reserved key for the list of top-level rows.
pub const ROOT_ID: &str = "$ftree-root";

/// One child row as known to typeahead search.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TreeNodeDescriptor {
    /// Row id.
    pub id: String,
    /// Flattened label, excluding nested-subtree content.
    pub text: String,
    /// Key of this row's own child list, present iff the row owns a subtree.
    pub sub_tree_id: Option<String>,
}

impl TreeNodeDescriptor {
    /// Describe `node` for the shadow index.
    #[must_use]
    pub fn from_node(node: &TreeNode) -> Self {
        Self {
            id: node.id().to_owned(),
            text: flatten_label(node.content()),
            sub_tree_id: node.has_sub_tree().then(|| node.id().to_owned()),
        }
    }
}

type Entries = HashMap<String, Vec<TreeNodeDescriptor>, ahash::RandomState>;

/// Subtree id to ordered child descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ShadowIndex {
    entries: Entries,
}

impl ShadowIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `subtree_id`.
    pub fn update(&mut self, subtree_id: impl Into<String>, rows: Vec<TreeNodeDescriptor>) {
        self.entries.insert(subtree_id.into(), rows);
    }

    /// Children of `subtree_id`. A subtree never written reads as empty.
    #[must_use]
    pub fn get(&self, subtree_id: &str) -> &[TreeNodeDescriptor] {
        self.entries
            .get(subtree_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Drop the entry of an unmounted subtree.
    pub fn remove(&mut self, subtree_id: &str) -> Option<Vec<TreeNodeDescriptor>> {
        self.entries.remove(subtree_id)
    }

    /// Whether `subtree_id` has an entry, empty or not.
    #[must_use]
    pub fn contains(&self, subtree_id: &str) -> bool {
        self.entries.contains_key(subtree_id)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Inputs for rebuilding one subtree's entry.
#[derive(Debug, Clone, Copy)]
pub struct ShadowSubtree<'a> {
    /// Key the entry is written under.
    pub item_id: &'a str,
    /// Direct children in visual order.
    pub children: &'a [TreeNode],
    /// Whether the tree virtualizes rows.
    pub virtualize: bool,
    /// Whether the owning row is expanded.
    pub is_expanded: bool,
}

impl<'a> ShadowSubtree<'a> {
    /// Describe the subtree keyed by `item_id`.
    #[must_use]
    pub fn new(
        item_id: &'a str,
        children: &'a [TreeNode],
        virtualize: bool,
        is_expanded: bool,
    ) -> Self {
        Self {
            item_id,
            children,
            virtualize,
            is_expanded,
        }
    }
}

/// Recompute the entry for one subtree.
///
/// Writes the children's descriptors when `virtualize && is_expanded`, and an
/// empty list otherwise.
pub fn rebuild_shadow_index(subtree: ShadowSubtree<'_>, index: &mut ShadowIndex) {
    let rows = if subtree.virtualize && subtree.is_expanded {
        subtree
            .children
            .iter()
            .map(TreeNodeDescriptor::from_node)
            .collect()
    } else {
        Vec::new()
    };
    index.update(subtree.item_id, rows);
}

/// Concatenate the visible text of a row.
///
/// Walks `Text` and `Group` content in order. Decorations and the nested
/// subtree contribute nothing, so a parent's label never contains its
/// children's labels.
#[must_use]
pub fn flatten_label(content: &[RowContent]) -> String {
    let mut out = String::new();
    push_label(content, &mut out);
    out
}

fn push_label(content: &[RowContent], out: &mut String) {
    for part in content {
        match part {
            RowContent::Text(text) => out.push_str(text),
            RowContent::Group(inner) => push_label(inner, out),
            RowContent::Decoration(_) | RowContent::SubTree(_) => {}
        }
    }
}

/// Comparable name of a rendered row.
#[must_use]
pub fn accessible_name(node: &TreeNode) -> String {
    flatten_label(node.content())
}
