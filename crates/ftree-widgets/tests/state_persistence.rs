#![forbid(unsafe_code)]
#![cfg(feature = "state-persistence")]

//! Serde round trips for persisted typeahead state.
//!
//! Run:
//!   cargo test -p ftree-widgets --features state-persistence --test state_persistence

use ftree_widgets::shadow_index::{ROOT_ID, ShadowIndex, TreeNodeDescriptor};
use ftree_widgets::tree::{Tree, TreeNode};
use ftree_widgets::typeahead::{TypeaheadConfig, find_subtree_match};
use web_time::Duration;

#[test]
fn config_survives_json() {
    let config = TypeaheadConfig::default()
        .with_idle_window(Duration::from_millis(450))
        .with_materialize_timeout(None)
        .with_unit_scale(2.5);

    let json = serde_json::to_string(&config).expect("serialize config");
    let restored: TypeaheadConfig = serde_json::from_str(&json).expect("deserialize config");
    assert_eq!(restored, config);
}

#[test]
fn restored_index_answers_the_same_queries() {
    let tree = Tree::new(vec![
        TreeNode::new("docs", "docs"),
        TreeNode::new("src", "src")
            .child(TreeNode::new("main", "main.rs"))
            .child(TreeNode::new("lib", "lib.rs")),
    ])
    .with_virtualize(true);

    let json = serde_json::to_string(tree.shadow_index()).expect("serialize index");
    let restored: ShadowIndex = serde_json::from_str(&json).expect("deserialize index");
    assert_eq!(&restored, tree.shadow_index());

    let found = find_subtree_match(&restored, ROOT_ID, "ma", Some("docs"), 1.0)
        .expect("main.rs is indexed");
    assert_eq!(found.id, "main");
    assert_eq!(found.offset, 3.0);
}

#[test]
fn descriptor_field_names_are_stable() {
    let descriptor = TreeNodeDescriptor {
        id: "src".to_owned(),
        text: "src".to_owned(),
        sub_tree_id: Some("src".to_owned()),
    };
    let value = serde_json::to_value(&descriptor).expect("serialize descriptor");
    assert_eq!(value["id"], "src");
    assert_eq!(value["sub_tree_id"], "src");
}
