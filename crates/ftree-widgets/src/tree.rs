#![forbid(unsafe_code)]

//! Tree widget with typeahead navigation.
//!
//! A [`Tree`] owns a forest of [`TreeNode`]s, a scrollable viewport, keyboard
//! focus, and the typeahead engine. Rows are laid out depth-first, skipping
//! the children of collapsed nodes, each `row_height` units tall.
//!
//! When virtualized, only rows near the viewport are materialized. The tree
//! observes every visible row with a [`VisibilityObserver`] whose margin is
//! the overscan, and [`Tree::refresh`] (the render pass) recomputes which
//! rows exist before running the typeahead materialization hook.
//!
//! # Example
//!
//! ```
//! use ftree_core::event::{KeyCode, KeyEvent};
//! use ftree_widgets::tree::{Tree, TreeNode};
//! use web_time::Instant;
//!
//! let mut tree = Tree::new(vec![
//!     TreeNode::new("src", "src")
//!         .child(TreeNode::new("main", "main.rs"))
//!         .child(TreeNode::new("lib", "lib.rs")),
//!     TreeNode::new("toml", "Cargo.toml"),
//! ]);
//! tree.focus("src");
//!
//! tree.handle_key(&KeyEvent::new(KeyCode::Char('c')), Instant::now());
//! assert_eq!(tree.focused(), Some("toml"));
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use ftree_core::event::KeyEvent;
use ftree_runtime::observer::{
    ObserverConfig, Span, SpanIntersectionFactory, VisibilityCallback, VisibilityEntry,
    VisibilityObserver,
};
use web_time::Instant;

use crate::shadow_index::{
    ROOT_ID, ShadowIndex, ShadowSubtree, accessible_name, flatten_label, rebuild_shadow_index,
};
use crate::typeahead::{
    KeyOutcome, MaterializedRow, ScrollContainer, Typeahead, TypeaheadConfig, TypeaheadHost,
};

/// One piece of a row's content.
#[derive(Debug, Clone, PartialEq)]
pub enum RowContent {
    /// Visible label text.
    Text(String),
    /// Visual-only content such as an icon; not part of the label.
    Decoration(String),
    /// Nested content, flattened in order.
    Group(Vec<RowContent>),
    /// The row's children.
    SubTree(Vec<TreeNode>),
}

/// A node in the tree hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    id: String,
    content: Vec<RowContent>,
    expanded: bool,
}

impl TreeNode {
    /// Create an expanded leaf with a text label.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: vec![RowContent::Text(label.into())],
            expanded: true,
        }
    }

    /// Add a child node.
    #[must_use]
    pub fn child(mut self, node: TreeNode) -> Self {
        match self.children_mut() {
            Some(children) => children.push(node),
            None => self.content.push(RowContent::SubTree(vec![node])),
        }
        self
    }

    /// Set children from a vec.
    #[must_use]
    pub fn with_children(mut self, nodes: Vec<TreeNode>) -> Self {
        self.replace_children(nodes);
        self
    }

    /// Set an icon rendered before the label.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.content.insert(0, RowContent::Decoration(icon.into()));
        self
    }

    /// Append content after the label. Children passed as
    /// [`RowContent::SubTree`] join the existing children.
    #[must_use]
    pub fn with_content(mut self, part: RowContent) -> Self {
        match part {
            RowContent::SubTree(nodes) => {
                for node in nodes {
                    self = self.child(node);
                }
            }
            other => self.content.push(other),
        }
        self
    }

    /// Set whether this node is expanded.
    #[must_use]
    pub fn with_expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    /// Row id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw row content.
    #[must_use]
    pub fn content(&self) -> &[RowContent] {
        &self.content
    }

    /// Flattened label text.
    #[must_use]
    pub fn label(&self) -> String {
        flatten_label(&self.content)
    }

    /// Get the children.
    #[must_use]
    pub fn children(&self) -> &[TreeNode] {
        self.content
            .iter()
            .find_map(|part| match part {
                RowContent::SubTree(nodes) => Some(nodes.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn children_mut(&mut self) -> Option<&mut Vec<TreeNode>> {
        self.content.iter_mut().find_map(|part| match part {
            RowContent::SubTree(nodes) => Some(nodes),
            _ => None,
        })
    }

    fn replace_children(&mut self, nodes: Vec<TreeNode>) -> Vec<TreeNode> {
        match self.children_mut() {
            Some(children) => std::mem::replace(children, nodes),
            None => {
                self.content.push(RowContent::SubTree(nodes));
                Vec::new()
            }
        }
    }

    /// Whether this node owns a subtree, even an empty one.
    #[must_use]
    pub fn has_sub_tree(&self) -> bool {
        self.content
            .iter()
            .any(|part| matches!(part, RowContent::SubTree(_)))
    }

    /// Whether this node has at least one child.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children().is_empty()
    }

    /// Whether this node is expanded.
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Toggle the expanded state.
    pub fn toggle_expanded(&mut self) {
        self.expanded = !self.expanded;
    }

    /// Count all visible (expanded) nodes, including this one.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        let mut count = 1;
        if self.expanded {
            for child in self.children() {
                count += child.visible_count();
            }
        }
        count
    }
}

fn find_node<'a>(nodes: &'a [TreeNode], id: &str) -> Option<&'a TreeNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node(node.children(), id) {
            return Some(found);
        }
    }
    None
}

fn find_node_mut<'a>(nodes: &'a mut [TreeNode], id: &str) -> Option<&'a mut TreeNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(children) = node.children_mut()
            && let Some(found) = find_node_mut(children, id)
        {
            return Some(found);
        }
    }
    None
}

/// Every row in depth-first order, flagged when hidden by a collapsed
/// ancestor.
fn walk_rows<'a>(nodes: &'a [TreeNode], hidden: bool, out: &mut Vec<(&'a TreeNode, bool)>) {
    for node in nodes {
        out.push((node, hidden));
        walk_rows(node.children(), hidden || !node.expanded, out);
    }
}

/// Write the entry of `node` and of every subtree below it.
fn index_node(node: &TreeNode, virtualize: bool, index: &mut ShadowIndex) {
    if !node.has_sub_tree() {
        return;
    }
    rebuild_shadow_index(
        ShadowSubtree::new(node.id(), node.children(), virtualize, node.expanded),
        index,
    );
    for child in node.children() {
        index_node(child, virtualize, index);
    }
}

/// Drop the entries of an unmounted node and its descendants.
fn unmount(node: &TreeNode, index: &mut ShadowIndex) {
    index.remove(node.id());
    for child in node.children() {
        unmount(child, index);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Viewport {
    scroll_top: f64,
    height: f64,
    content_height: f64,
}

impl Viewport {
    fn max_scroll(&self) -> f64 {
        (self.content_height - self.height).max(0.0)
    }
}

impl ScrollContainer for Viewport {
    fn viewport_height(&self) -> f64 {
        self.height
    }

    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, top: f64) {
        self.scroll_top = if top.is_nan() {
            0.0
        } else {
            top.clamp(0.0, self.max_scroll())
        };
    }
}

/// Row state the typeahead engine reads and drives.
#[derive(Debug)]
struct TreeRows {
    roots: Vec<TreeNode>,
    row_height: f64,
    unit_scale: f64,
    virtualize: bool,
    viewport: Viewport,
    focused: Option<String>,
    materialized: Rc<RefCell<AHashSet<String>>>,
}

impl TreeRows {
    /// Height of one row in scroll units.
    fn row_extent(&self) -> f64 {
        self.row_height * self.unit_scale
    }

    fn visible_ids(&self) -> Vec<String> {
        let mut rows = Vec::new();
        walk_rows(&self.roots, false, &mut rows);
        rows.into_iter()
            .filter(|(_, hidden)| !hidden)
            .map(|(node, _)| node.id.clone())
            .collect()
    }

    fn is_visible(&self, id: &str) -> bool {
        let mut rows = Vec::new();
        walk_rows(&self.roots, false, &mut rows);
        rows.iter().any(|(node, hidden)| !hidden && node.id == id)
    }

    fn sync_content_height(&mut self) {
        let rows: usize = self.roots.iter().map(TreeNode::visible_count).sum();
        self.viewport.content_height = rows as f64 * self.row_extent();
        let top = self.viewport.scroll_top;
        self.viewport.set_scroll_top(top);
    }
}

impl TypeaheadHost for TreeRows {
    fn focused_id(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    fn focus(&mut self, id: &str) {
        self.focused = Some(id.to_owned());
    }

    fn materialized_rows(&self) -> Vec<MaterializedRow> {
        let mut rows = Vec::new();
        walk_rows(&self.roots, false, &mut rows);
        let materialized = self.materialized.borrow();
        rows.into_iter()
            .filter(|(node, hidden)| !self.virtualize || (!hidden && materialized.contains(&node.id)))
            .map(|(node, hidden)| MaterializedRow {
                id: node.id.clone(),
                name: accessible_name(node),
                under_collapsed: hidden,
            })
            .collect()
    }

    fn is_materialized(&self, id: &str) -> bool {
        if self.virtualize {
            self.materialized.borrow().contains(id)
        } else {
            find_node(&self.roots, id).is_some()
        }
    }

    fn row_height(&self) -> f64 {
        self.row_height
    }

    fn is_virtualized(&self) -> bool {
        self.virtualize
    }

    fn scroll_container(&mut self) -> Option<&mut dyn ScrollContainer> {
        Some(&mut self.viewport)
    }
}

/// Tree widget hosting typeahead navigation.
///
/// Dropping the tree cancels the idle timer and any pending focus, and
/// disconnects the visibility observer.
#[derive(Debug)]
pub struct Tree {
    rows: TreeRows,
    index: ShadowIndex,
    typeahead: Typeahead,
    observer: VisibilityObserver<String, SpanIntersectionFactory>,
    observed: AHashSet<String>,
}

impl Tree {
    /// Create a non-virtualized tree over `roots`.
    ///
    /// Defaults: row height 1, viewport 10 rows tall, no overscan.
    #[must_use]
    pub fn new(roots: Vec<TreeNode>) -> Self {
        let typeahead = Typeahead::default();
        let materialized = Rc::new(RefCell::new(AHashSet::new()));
        let sink = Rc::clone(&materialized);
        let callback: VisibilityCallback<String> =
            Rc::new(move |entries: &[VisibilityEntry<String>]| {
                let mut rows = sink.borrow_mut();
                for entry in entries {
                    if entry.is_intersecting {
                        rows.insert(entry.target.clone());
                    } else {
                        rows.remove(&entry.target);
                    }
                }
            });
        let mut tree = Self {
            rows: TreeRows {
                roots,
                row_height: 1.0,
                unit_scale: typeahead.config().unit_scale,
                virtualize: false,
                viewport: Viewport {
                    scroll_top: 0.0,
                    height: 10.0,
                    content_height: 0.0,
                },
                focused: None,
                materialized,
            },
            index: ShadowIndex::new(),
            typeahead,
            observer: VisibilityObserver::new(
                SpanIntersectionFactory,
                callback,
                ObserverConfig::default(),
            ),
            observed: AHashSet::new(),
        };
        tree.reindex();
        tree
    }

    /// Set the row height in row units.
    #[must_use]
    pub fn with_row_height(mut self, row_height: f64) -> Self {
        if row_height.is_finite() && row_height > 0.0 {
            self.rows.row_height = row_height;
        }
        self.rows.sync_content_height();
        self
    }

    /// Set the viewport height in scroll units.
    #[must_use]
    pub fn with_viewport_height(mut self, height: f64) -> Self {
        self.set_viewport_height(height);
        self
    }

    /// Virtualize rows.
    #[must_use]
    pub fn with_virtualize(mut self, virtualize: bool) -> Self {
        self.set_virtualize(virtualize);
        self
    }

    /// Materialize rows within `overscan` scroll units of the viewport.
    #[must_use]
    pub fn with_overscan(mut self, overscan: f64) -> Self {
        self.set_overscan(overscan);
        self
    }

    /// Set the typeahead configuration.
    #[must_use]
    pub fn with_typeahead_config(mut self, config: TypeaheadConfig) -> Self {
        self.typeahead.set_config(config);
        self.rows.unit_scale = self.typeahead.config().unit_scale;
        self.rows.sync_content_height();
        self
    }

    /// Top-level rows.
    #[must_use]
    pub fn roots(&self) -> &[TreeNode] {
        &self.rows.roots
    }

    /// Look up a node anywhere in the tree.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&TreeNode> {
        find_node(&self.rows.roots, id)
    }

    /// The shadow index kept in sync with the tree.
    #[must_use]
    pub fn shadow_index(&self) -> &ShadowIndex {
        &self.index
    }

    /// The typeahead engine.
    #[must_use]
    pub fn typeahead(&self) -> &Typeahead {
        &self.typeahead
    }

    /// Id of the focused row.
    #[must_use]
    pub fn focused(&self) -> Option<&str> {
        self.rows.focused.as_deref()
    }

    /// Focus a visible row. Returns `false` for an unknown or hidden id.
    pub fn focus(&mut self, id: &str) -> bool {
        if !self.rows.is_visible(id) {
            return false;
        }
        self.rows.focused = Some(id.to_owned());
        true
    }

    /// Whether rows are virtualized.
    #[must_use]
    pub fn is_virtualized(&self) -> bool {
        self.rows.virtualize
    }

    /// Current vertical scroll offset.
    #[must_use]
    pub fn scroll_top(&self) -> f64 {
        self.rows.viewport.scroll_top
    }

    /// Scroll, clamped to the content.
    pub fn set_scroll_top(&mut self, top: f64) {
        self.rows.viewport.set_scroll_top(top);
    }

    /// Viewport height in scroll units.
    #[must_use]
    pub fn viewport_height(&self) -> f64 {
        self.rows.viewport.height
    }

    /// Resize the viewport.
    pub fn set_viewport_height(&mut self, height: f64) {
        if height.is_finite() && height >= 0.0 {
            self.rows.viewport.height = height;
        }
        self.rows.sync_content_height();
    }

    /// Total height of the visible rows in scroll units.
    #[must_use]
    pub fn content_height(&self) -> f64 {
        self.rows.viewport.content_height
    }

    /// Ids of rows not hidden by a collapsed ancestor, in visual order.
    #[must_use]
    pub fn visible_ids(&self) -> Vec<String> {
        self.rows.visible_ids()
    }

    /// Whether the row `id` currently exists.
    #[must_use]
    pub fn is_materialized(&self, id: &str) -> bool {
        self.rows.is_materialized(id)
    }

    /// Materialized row ids in visual order.
    #[must_use]
    pub fn materialized_ids(&self) -> Vec<String> {
        self.rows
            .materialized_rows()
            .into_iter()
            .filter(|row| !row.under_collapsed)
            .map(|row| row.id)
            .collect()
    }

    /// Toggle a node's expansion. Returns `false` for an unknown id.
    pub fn toggle(&mut self, id: &str) -> bool {
        let Some(expanded) = self.node(id).map(|node| !node.expanded) else {
            return false;
        };
        self.set_expanded(id, expanded)
    }

    /// Expand or collapse a node. Returns `false` for an unknown id.
    pub fn set_expanded(&mut self, id: &str, expanded: bool) -> bool {
        let Some(node) = find_node_mut(&mut self.rows.roots, id) else {
            return false;
        };
        node.expanded = expanded;
        // Leaves own no entry.
        if node.has_sub_tree() {
            rebuild_shadow_index(
                ShadowSubtree::new(node.id(), node.children(), self.rows.virtualize, expanded),
                &mut self.index,
            );
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(message = "tree.toggle", id, expanded);
        if let Some(focused) = self.rows.focused.clone()
            && !self.rows.is_visible(&focused)
        {
            self.rows.focused = Some(id.to_owned());
        }
        self.rows.sync_content_height();
        true
    }

    /// Replace the children of `parent_id`, or the top-level rows for
    /// [`ROOT_ID`]. Returns `false` for an unknown id.
    ///
    /// Entries of the replaced subtrees are removed from the shadow index.
    pub fn set_children(&mut self, parent_id: &str, nodes: Vec<TreeNode>) -> bool {
        let old = if parent_id == ROOT_ID {
            std::mem::replace(&mut self.rows.roots, nodes)
        } else {
            let Some(parent) = find_node_mut(&mut self.rows.roots, parent_id) else {
                return false;
            };
            parent.replace_children(nodes)
        };
        for gone in &old {
            unmount(gone, &mut self.index);
        }

        let virtualize = self.rows.virtualize;
        if parent_id == ROOT_ID {
            rebuild_shadow_index(
                ShadowSubtree::new(ROOT_ID, &self.rows.roots, virtualize, true),
                &mut self.index,
            );
            for root in &self.rows.roots {
                index_node(root, virtualize, &mut self.index);
            }
        } else if let Some(parent) = find_node(&self.rows.roots, parent_id) {
            index_node(parent, virtualize, &mut self.index);
        }

        if let Some(focused) = self.rows.focused.clone()
            && find_node(&self.rows.roots, &focused).is_none()
        {
            self.rows.focused = None;
        }
        self.rows.sync_content_height();
        true
    }

    /// Switch virtualization, rebuilding every shadow index entry.
    pub fn set_virtualize(&mut self, virtualize: bool) {
        if self.rows.virtualize == virtualize {
            return;
        }
        self.rows.virtualize = virtualize;
        if !virtualize {
            self.observer.disconnect();
            self.observed.clear();
            self.rows.materialized.borrow_mut().clear();
        }
        self.reindex();
    }

    /// Change the overscan margin. Takes effect on the next refresh.
    pub fn set_overscan(&mut self, overscan: f64) {
        let config = self.observer.config().clone().with_margin(overscan);
        if self.observer.set_config(config) {
            // The new primitive starts with no observations.
            self.observed.clear();
            self.rows.materialized.borrow_mut().clear();
        }
    }

    /// Render pass: recompute materialized rows, then let a pending
    /// typeahead focus land.
    pub fn refresh(&mut self) {
        self.rows.sync_content_height();
        if self.rows.virtualize {
            self.track_visibility();
        }
        self.typeahead.on_render(&mut self.rows);
    }

    /// Feed a key event to typeahead.
    pub fn handle_key(&mut self, key: &KeyEvent, now: Instant) -> KeyOutcome {
        self.typeahead
            .handle_key(key, now, &mut self.rows, &self.index)
    }

    /// Advance typeahead timers.
    pub fn tick(&mut self, now: Instant) {
        self.typeahead.tick(now, &mut self.rows);
    }

    fn reindex(&mut self) {
        let virtualize = self.rows.virtualize;
        rebuild_shadow_index(
            ShadowSubtree::new(ROOT_ID, &self.rows.roots, virtualize, true),
            &mut self.index,
        );
        for root in &self.rows.roots {
            index_node(root, virtualize, &mut self.index);
        }
        self.rows.sync_content_height();
    }

    fn track_visibility(&mut self) {
        let visible = self.rows.visible_ids();
        let positions: AHashMap<&str, usize> = visible
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let gone: Vec<String> = self
            .observed
            .iter()
            .filter(|id| !positions.contains_key(id.as_str()))
            .cloned()
            .collect();
        for id in gone {
            self.observer.unobserve(&id);
            self.observed.remove(&id);
            self.rows.materialized.borrow_mut().remove(&id);
        }
        for id in &visible {
            if self.observed.insert(id.clone()) {
                self.observer.observe(id.clone());
            }
        }

        let extent = self.rows.row_extent();
        let top = self.rows.viewport.scroll_top;
        let viewport = Span::new(top, top + self.rows.viewport.height);
        let _changed = self.observer.primitive_mut().update(viewport, |id| {
            positions
                .get(id.as_str())
                .map(|&i| Span::new(i as f64 * extent, (i + 1) as f64 * extent))
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(
            message = "tree.refresh",
            visible = visible.len(),
            changed = _changed,
            materialized = self.rows.materialized.borrow().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow_index::TreeNodeDescriptor;
    use ftree_core::event::KeyCode;

    fn fruit() -> Vec<TreeNode> {
        vec![
            TreeNode::new("a", "Apple"),
            TreeNode::new("b", "Banana").child(TreeNode::new("b1", "Berry")),
            TreeNode::new("c", "Cherry"),
        ]
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c))
    }

    #[test]
    fn node_builders() {
        let node = TreeNode::new("dir", "src")
            .with_icon(">")
            .child(TreeNode::new("f1", "main.rs"))
            .with_content(RowContent::SubTree(vec![TreeNode::new("f2", "lib.rs")]));
        assert_eq!(node.label(), "src");
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.children()[1].id(), "f2");
        assert!(node.is_expanded());
        assert_eq!(node.visible_count(), 3);
        let collapsed = node.with_expanded(false);
        assert_eq!(collapsed.visible_count(), 1);
    }

    #[test]
    fn with_children_replaces() {
        let node = TreeNode::new("n", "N")
            .child(TreeNode::new("x", "X"))
            .with_children(vec![TreeNode::new("y", "Y")]);
        assert_eq!(node.children().len(), 1);
        assert_eq!(node.children()[0].id(), "y");
        let empty = TreeNode::new("e", "E").with_children(Vec::new());
        assert!(empty.has_sub_tree());
        assert!(!empty.has_children());
    }

    #[test]
    fn non_virtualized_index_is_empty() {
        let tree = Tree::new(fruit());
        assert!(tree.shadow_index().contains(ROOT_ID));
        assert!(tree.shadow_index().get(ROOT_ID).is_empty());
        assert!(tree.shadow_index().get("b").is_empty());
    }

    #[test]
    fn virtualized_index_tracks_structure() {
        let tree = Tree::new(fruit()).with_virtualize(true);
        let root = tree.shadow_index().get(ROOT_ID);
        assert_eq!(root.len(), 3);
        assert_eq!(root[1].sub_tree_id.as_deref(), Some("b"));
        assert_eq!(
            tree.shadow_index().get("b"),
            &[TreeNodeDescriptor {
                id: "b1".into(),
                text: "Berry".into(),
                sub_tree_id: None,
            }]
        );
    }

    #[test]
    fn collapse_clears_entry_and_hides_rows() {
        let mut tree = Tree::new(fruit()).with_virtualize(true);
        tree.focus("b1");
        assert!(tree.toggle("b"));
        assert!(tree.shadow_index().get("b").is_empty());
        assert_eq!(tree.visible_ids(), vec!["a", "b", "c"]);
        // Focus moves off the hidden row.
        assert_eq!(tree.focused(), Some("b"));
        assert!(tree.toggle("b"));
        assert_eq!(tree.shadow_index().get("b").len(), 1);
        assert!(!tree.toggle("missing"));
    }

    #[test]
    fn set_children_unmounts_old_entries() {
        let mut tree = Tree::new(vec![TreeNode::new("p", "Parent").child(
            TreeNode::new("old", "Old").child(TreeNode::new("leaf", "Leaf")),
        )])
        .with_virtualize(true);
        assert!(tree.shadow_index().contains("old"));
        tree.focus("leaf");

        assert!(tree.set_children("p", vec![TreeNode::new("new", "New")]));
        assert!(!tree.shadow_index().contains("old"));
        assert_eq!(tree.shadow_index().get("p")[0].id, "new");
        assert_eq!(tree.focused(), None);
        assert!(!tree.set_children("missing", Vec::new()));
    }

    #[test]
    fn toggling_a_leaf_writes_no_entry() {
        let mut tree = Tree::new(vec![
            TreeNode::new("p", "Parent").child(TreeNode::new("leaf", "Leaf")),
        ])
        .with_virtualize(true);
        assert!(tree.toggle("leaf"));
        assert!(!tree.shadow_index().contains("leaf"));

        assert!(tree.set_children("p", Vec::new()));
        assert!(!tree.shadow_index().contains("leaf"));
        assert!(tree.shadow_index().get("p").is_empty());
    }

    #[test]
    fn set_children_on_root_replaces_forest() {
        let mut tree = Tree::new(fruit()).with_virtualize(true);
        assert!(tree.set_children(ROOT_ID, vec![TreeNode::new("z", "Zed")]));
        assert!(!tree.shadow_index().contains("b"));
        assert_eq!(tree.shadow_index().get(ROOT_ID).len(), 1);
        assert_eq!(tree.content_height(), 1.0);
    }

    #[test]
    fn scroll_is_clamped() {
        let mut tree = Tree::new(fruit()).with_viewport_height(2.0);
        assert_eq!(tree.content_height(), 4.0);
        tree.set_scroll_top(10.0);
        assert_eq!(tree.scroll_top(), 2.0);
        tree.set_scroll_top(-3.0);
        assert_eq!(tree.scroll_top(), 0.0);
    }

    #[test]
    fn non_virtualized_rows_are_all_materialized() {
        let tree = Tree::new(fruit());
        assert!(tree.is_materialized("b1"));
        assert_eq!(tree.materialized_ids(), vec!["a", "b", "b1", "c"]);
    }

    #[test]
    fn virtualized_refresh_materializes_near_viewport() {
        let roots: Vec<TreeNode> = (0..20)
            .map(|i| TreeNode::new(format!("r{i}"), format!("Row {i}")))
            .collect();
        let mut tree = Tree::new(roots)
            .with_virtualize(true)
            .with_viewport_height(4.0)
            .with_overscan(1.0);
        assert!(tree.materialized_ids().is_empty());

        tree.refresh();
        assert_eq!(tree.materialized_ids(), vec!["r0", "r1", "r2", "r3", "r4"]);

        tree.set_scroll_top(10.0);
        tree.refresh();
        assert_eq!(
            tree.materialized_ids(),
            vec!["r9", "r10", "r11", "r12", "r13", "r14"]
        );
        assert!(!tree.is_materialized("r0"));
    }

    #[test]
    fn overscan_change_rebuilds_observation() {
        let roots: Vec<TreeNode> = (0..10)
            .map(|i| TreeNode::new(format!("r{i}"), format!("Row {i}")))
            .collect();
        let mut tree = Tree::new(roots)
            .with_virtualize(true)
            .with_viewport_height(2.0);
        tree.refresh();
        assert_eq!(tree.materialized_ids(), vec!["r0", "r1"]);
        tree.set_overscan(2.0);
        assert!(tree.materialized_ids().is_empty());
        tree.refresh();
        assert_eq!(tree.materialized_ids(), vec!["r0", "r1", "r2", "r3"]);
    }

    #[test]
    fn leaving_virtualization_materializes_everything() {
        let mut tree = Tree::new(fruit()).with_virtualize(true);
        assert!(!tree.is_materialized("c"));
        tree.set_virtualize(false);
        assert!(tree.is_materialized("c"));
        assert!(tree.shadow_index().get(ROOT_ID).is_empty());
    }

    #[test]
    fn typeahead_skips_collapsed_rows() {
        let mut tree = Tree::new(vec![
            TreeNode::new("a", "Alpha")
                .with_expanded(false)
                .child(TreeNode::new("a1", "Bravo inner")),
            TreeNode::new("b", "Bravo"),
        ]);
        tree.focus("a");
        assert!(tree.handle_key(&key('b'), Instant::now()).is_consumed());
        assert_eq!(tree.focused(), Some("b"));
    }

    #[test]
    fn focus_rejects_hidden_rows() {
        let mut tree = Tree::new(fruit());
        tree.toggle("b");
        assert!(!tree.focus("b1"));
        assert!(!tree.focus("nope"));
        assert!(tree.focus("c"));
    }
}
