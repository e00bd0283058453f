#![forbid(unsafe_code)]
#![cfg(feature = "tracing")]

//! Debug events emitted by the tree widget and typeahead.
//!
//! Run:
//!   cargo test -p ftree-widgets --features tracing --test tracing_events

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use ftree_core::event::{KeyCode, KeyEvent};
use ftree_widgets::tree::{Tree, TreeNode};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use web_time::{Duration, Instant};

type Fields = BTreeMap<String, String>;

#[derive(Default)]
struct FieldVisitor(Fields);

impl tracing::field::Visit for FieldVisitor {
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_owned(), value.to_string());
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_owned(), value.to_owned());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(
            field.name().to_owned(),
            format!("{value:?}").trim_matches('"').to_owned(),
        );
    }
}

struct EventCapture {
    events: Arc<Mutex<Vec<Fields>>>,
}

impl<S> Layer<S> for EventCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().expect("event lock").push(visitor.0);
    }
}

fn capture(run: impl FnOnce()) -> Vec<Fields> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture {
        events: Arc::clone(&events),
    });
    {
        let _guard = tracing::subscriber::set_default(subscriber);
        tracing::callsite::rebuild_interest_cache();
        run();
    }
    tracing::callsite::rebuild_interest_cache();
    events.lock().expect("event lock").clone()
}

fn named<'a>(events: &'a [Fields], message: &str) -> Vec<&'a Fields> {
    events
        .iter()
        .filter(|fields| fields.get("message").map(String::as_str) == Some(message))
        .collect()
}

fn field<'a>(fields: &'a Fields, name: &str) -> Option<&'a str> {
    fields.get(name).map(String::as_str)
}

fn rows(n: usize) -> Vec<TreeNode> {
    (0..n)
        .map(|i| {
            let label = if i == 30 {
                "Target".to_owned()
            } else {
                format!("Row {i}")
            };
            TreeNode::new(format!("r{i}"), label)
        })
        .collect()
}

#[test]
fn immediate_focus_is_not_deferred() {
    let events = capture(|| {
        let mut tree = Tree::new(rows(5));
        tree.focus("r0");
        tree.handle_key(&KeyEvent::new(KeyCode::Char('r')), Instant::now());
    });

    let searches = named(&events, "typeahead.search");
    assert_eq!(searches.len(), 1);
    assert_eq!(field(searches[0], "query"), Some("r"));
    assert_eq!(field(searches[0], "virtualized"), Some("false"));

    let focus = named(&events, "typeahead.focus");
    assert_eq!(focus.len(), 1);
    assert_eq!(field(focus[0], "target"), Some("r1"));
    assert_eq!(field(focus[0], "deferred"), Some("false"));
}

#[test]
fn deferred_focus_follows_scroll() {
    let events = capture(|| {
        let mut tree = Tree::new(rows(60))
            .with_virtualize(true)
            .with_viewport_height(8.0);
        tree.refresh();
        tree.focus("r0");
        tree.handle_key(&KeyEvent::new(KeyCode::Char('t')), Instant::now());
        tree.refresh();
    });

    let scroll = named(&events, "typeahead.scroll");
    assert_eq!(scroll.len(), 1);
    assert_eq!(field(scroll[0], "target"), Some("r30"));

    let focus = named(&events, "typeahead.focus");
    assert_eq!(focus.len(), 1);
    assert_eq!(field(focus[0], "deferred"), Some("true"));
    assert!(!named(&events, "tree.refresh").is_empty());
}

#[test]
fn idle_reset_and_abandon_are_logged() {
    let events = capture(|| {
        let mut tree = Tree::new(rows(60))
            .with_virtualize(true)
            .with_viewport_height(8.0);
        tree.refresh();
        tree.focus("r0");
        let t0 = Instant::now();
        tree.handle_key(&KeyEvent::new(KeyCode::Char('t')), t0);
        tree.tick(t0 + Duration::from_secs(2));
    });

    let resets = named(&events, "typeahead.reset");
    assert_eq!(resets.len(), 1);
    assert_eq!(field(resets[0], "query"), Some("t"));
    assert_eq!(named(&events, "typeahead.abandon").len(), 1);
}

#[test]
fn toggle_reports_new_state() {
    let events = capture(|| {
        let mut tree = Tree::new(vec![
            TreeNode::new("dir", "dir").child(TreeNode::new("file", "file")),
        ]);
        tree.toggle("dir");
    });

    let toggles = named(&events, "tree.toggle");
    assert_eq!(toggles.len(), 1);
    assert_eq!(field(toggles[0], "id"), Some("dir"));
    assert_eq!(field(toggles[0], "expanded"), Some("false"));
}
