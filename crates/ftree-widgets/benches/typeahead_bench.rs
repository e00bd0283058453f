//! Benchmarks for typeahead search over large trees.
//!
//! Run with: cargo bench -p ftree-widgets --bench typeahead_bench
//!
//! Workloads:
//! - **Flat**: one level of N rows, match near the end.
//! - **Nested**: N directories of 10 files each, match in the last directory.
//! - **Keystroke**: full `Tree::handle_key` on a virtualized tree, including
//!   the scroll and the pending-focus wait.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ftree_core::event::{KeyCode, KeyEvent};
use ftree_widgets::shadow_index::ROOT_ID;
use ftree_widgets::tree::{Tree, TreeNode};
use ftree_widgets::typeahead::find_subtree_match;
use std::hint::black_box;
use web_time::{Duration, Instant};

// ── Tree Generators ─────────────────────────────────────────────────────

fn flat_rows(n: usize) -> Vec<TreeNode> {
    (0..n)
        .map(|i| {
            let label = if i == n - 1 {
                "zeta".to_owned()
            } else {
                format!("row {i}")
            };
            TreeNode::new(format!("r{i}"), label)
        })
        .collect()
}

fn nested_rows(dirs: usize) -> Vec<TreeNode> {
    (0..dirs)
        .map(|d| {
            let files = (0..10).map(|f| {
                let label = if d == dirs - 1 && f == 9 {
                    "zeta.rs".to_owned()
                } else {
                    format!("file_{f}.rs")
                };
                TreeNode::new(format!("d{d}/f{f}"), label)
            });
            TreeNode::new(format!("d{d}"), format!("dir {d}")).with_children(files.collect())
        })
        .collect()
}

// ── Benchmark Functions ─────────────────────────────────────────────────

fn bench_shadow_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("typeahead/shadow_match");

    for &n in &[1_000, 10_000, 100_000] {
        let tree = Tree::new(flat_rows(n)).with_virtualize(true);
        group.bench_with_input(BenchmarkId::new("flat", n), &tree, |b, tree| {
            b.iter(|| {
                black_box(find_subtree_match(
                    tree.shadow_index(),
                    ROOT_ID,
                    black_box("ze"),
                    Some("r0"),
                    1.0,
                ))
            });
        });
    }

    for &dirs in &[100, 1_000, 10_000] {
        let tree = Tree::new(nested_rows(dirs)).with_virtualize(true);
        group.bench_with_input(BenchmarkId::new("nested", dirs), &tree, |b, tree| {
            b.iter(|| {
                black_box(find_subtree_match(
                    tree.shadow_index(),
                    ROOT_ID,
                    black_box("zeta"),
                    Some("d0"),
                    1.0,
                ))
            });
        });
    }
    group.finish();
}

fn bench_keystroke(c: &mut Criterion) {
    let mut group = c.benchmark_group("typeahead/keystroke");
    let key = KeyEvent::new(KeyCode::Char('z'));

    for &n in &[1_000, 10_000] {
        group.bench_function(BenchmarkId::new("virtualized", n), |b| {
            let mut tree = Tree::new(flat_rows(n))
                .with_virtualize(true)
                .with_viewport_height(40.0);
            tree.refresh();
            tree.focus("r0");
            let mut now = Instant::now();
            b.iter(|| {
                // Past the idle window so every press starts a fresh query.
                now += Duration::from_secs(1);
                black_box(tree.handle_key(&key, now));
                tree.refresh();
            });
        });
    }
    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("typeahead/rebuild");

    for &dirs in &[100, 1_000] {
        group.bench_function(BenchmarkId::new("toggle", dirs), |b| {
            let mut tree = Tree::new(nested_rows(dirs)).with_virtualize(true);
            b.iter(|| {
                black_box(tree.toggle("d0"));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_shadow_match, bench_keystroke, bench_rebuild);
criterion_main!(benches);
