//! Effective view: the active profile layered over the default profile
//!
//! Layering rules:
//! - Leaves: the profile's value if it set the leaf explicitly, else the
//!   default profile's value.
//! - Lists: length comes from the profile if it grew the list, else from
//!   the default. Elements present on both sides layer leaf by leaf;
//!   elements only the profile has originate entirely from the profile.
//! - The default profile never overrides itself.

use settings_path::PathAddress;
use std::collections::BTreeSet;

use crate::document::{child_path, collect_leaves, ConfigDocument, Node, Value};
use crate::error::Result;
use crate::profile::ProfileStore;

/// Resolved document for the active profile plus override provenance
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveView {
    profile_id: String,
    document: ConfigDocument,
    overrides: BTreeSet<PathAddress>,
}

impl EffectiveView {
    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// Leaf paths whose effective value comes from the active profile.
    pub fn overrides(&self) -> &BTreeSet<PathAddress> {
        &self.overrides
    }

    pub fn is_override(&self, path: &PathAddress) -> bool {
        self.overrides.contains(path)
    }
}

/// Computes effective views from a profile store
pub struct OverrideResolver;

impl OverrideResolver {
    /// Effective view of the active profile.
    pub fn resolve(store: &ProfileStore) -> Result<EffectiveView> {
        Self::resolve_for(store, store.active_id())
    }

    /// Effective view of any profile, as if it were active.
    pub fn resolve_for(store: &ProfileStore, profile_id: &str) -> Result<EffectiveView> {
        let base = &store.default_profile()?.document;
        let active = store.get(profile_id)?;

        let mut overrides = BTreeSet::new();
        let document = if active.is_default() {
            base.without_provenance()
        } else {
            let root = layer(base.root(), active.document.root(), None, &mut overrides);
            ConfigDocument::from_root(store.schema().clone(), root)
        };

        Ok(EffectiveView {
            profile_id: active.id.clone(),
            document,
            overrides,
        })
    }

    /// Effective value at `path` and whether it is an override.
    pub fn effective_value(store: &ProfileStore, path: &PathAddress) -> Result<(Value, bool)> {
        let view = Self::resolve(store)?;
        let value = view.document.get(path)?.clone();
        Ok((value, view.is_override(path)))
    }
}

fn inherit(node: &Node) -> Node {
    let mut copy = node.clone();
    copy.clear_provenance();
    copy
}

fn layer(
    base: &Node,
    overlay: &Node,
    path: Option<&PathAddress>,
    overrides: &mut BTreeSet<PathAddress>,
) -> Node {
    match (base, overlay) {
        (Node::Leaf { value, .. }, Node::Leaf { value: own, explicit }) => {
            let value = match path {
                Some(path) if *explicit => {
                    overrides.insert(path.clone());
                    own.clone()
                }
                _ => value.clone(),
            };
            Node::Leaf {
                value,
                explicit: false,
            }
        }
        (Node::Group(base_fields), Node::Group(own_fields)) => Node::Group(
            base_fields
                .iter()
                .map(|(name, base_child)| {
                    let at = child_path(path, name);
                    let child = match own_fields.get(name) {
                        Some(own_child) => layer(base_child, own_child, Some(&at), overrides),
                        None => inherit(base_child),
                    };
                    (name.clone(), child)
                })
                .collect(),
        ),
        (
            Node::List {
                items: base_items, ..
            },
            Node::List {
                items: own_items,
                explicit,
            },
        ) => {
            let Some(parent) = path else {
                return inherit(base);
            };
            let len = if *explicit {
                own_items.len().max(base_items.len())
            } else {
                base_items.len()
            };
            let items = (0..len)
                .filter_map(|i| {
                    let at = parent.index(i);
                    match (base_items.get(i), own_items.get(i)) {
                        (Some(b), Some(o)) => Some(layer(b, o, Some(&at), overrides)),
                        (Some(b), None) => Some(inherit(b)),
                        (None, Some(o)) => {
                            collect_leaves(o, &at, overrides);
                            Some(inherit(o))
                        }
                        (None, None) => None,
                    }
                })
                .collect();
            Node::List {
                items,
                explicit: false,
            }
        }
        _ => inherit(base),
    }
}
