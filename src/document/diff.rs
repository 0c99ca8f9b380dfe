//! Structural diff between documents

use settings_path::PathAddress;
use std::collections::BTreeSet;

use super::{child_path, collect_leaves, ConfigDocument, Node};

/// Set of leaf paths whose values differ between `a` and `b`.
///
/// Provenance flags are ignored. When list lengths differ, every leaf of
/// the elements present on only one side is reported.
pub fn diff(a: &ConfigDocument, b: &ConfigDocument) -> BTreeSet<PathAddress> {
    let mut out = BTreeSet::new();
    diff_nodes(a.root(), b.root(), None, &mut out);
    out
}

fn diff_nodes(a: &Node, b: &Node, path: Option<&PathAddress>, out: &mut BTreeSet<PathAddress>) {
    match (a, b) {
        (Node::Leaf { value: left, .. }, Node::Leaf { value: right, .. }) => {
            if left != right {
                if let Some(path) = path {
                    out.insert(path.clone());
                }
            }
        }
        (Node::Group(left), Node::Group(right)) => {
            for (name, left_child) in left {
                let child = child_path(path, name);
                match right.get(name) {
                    Some(right_child) => diff_nodes(left_child, right_child, Some(&child), out),
                    None => collect_leaves(left_child, &child, out),
                }
            }
            for (name, right_child) in right {
                if !left.contains_key(name) {
                    collect_leaves(right_child, &child_path(path, name), out);
                }
            }
        }
        (Node::List { items: left, .. }, Node::List { items: right, .. }) => {
            let Some(parent) = path else { return };
            for i in 0..left.len().max(right.len()) {
                let item_path = parent.index(i);
                match (left.get(i), right.get(i)) {
                    (Some(l), Some(r)) => diff_nodes(l, r, Some(&item_path), out),
                    (Some(only), None) | (None, Some(only)) => {
                        collect_leaves(only, &item_path, out)
                    }
                    (None, None) => {}
                }
            }
        }
        _ => {
            if let Some(path) = path {
                collect_leaves(a, path, out);
                collect_leaves(b, path, out);
            }
        }
    }
}
