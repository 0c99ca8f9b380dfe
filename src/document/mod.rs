//! Configuration documents
//!
//! A document is a tree shaped by its [`Schema`]. Every leaf holds a typed
//! value plus an "explicitly set" flag; list nodes carry a structural flag
//! set when the list grows. Profiles use the flags to decide which paths
//! they override.
//!
//! The public mutation API is copy-on-write: [`ConfigDocument::set`]
//! returns a new document and leaves the receiver untouched.

mod diff;
mod json;
mod value;

pub use diff::diff;
pub use value::Value;

use settings_path::{PathAddress, Step};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{Result, SettingsError};
use crate::schema::{Schema, SchemaNode};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Leaf { value: Value, explicit: bool },
    Group(BTreeMap<String, Node>),
    List { items: Vec<Node>, explicit: bool },
}

impl Node {
    /// Fresh node holding schema defaults, nothing explicitly set.
    pub(crate) fn from_schema(schema: &SchemaNode) -> Node {
        match schema {
            SchemaNode::Leaf { default, .. } => Node::Leaf {
                value: default.clone(),
                explicit: false,
            },
            SchemaNode::Group(group) => Node::Group(
                group
                    .fields()
                    .map(|(name, child)| (name.clone(), Node::from_schema(child)))
                    .collect(),
            ),
            SchemaNode::List {
                element,
                default_len,
            } => Node::List {
                items: (0..*default_len).map(|_| Node::from_schema(element)).collect(),
                explicit: false,
            },
        }
    }

    pub(crate) fn clear_provenance(&mut self) {
        match self {
            Node::Leaf { explicit, .. } => *explicit = false,
            Node::Group(fields) => fields.values_mut().for_each(Node::clear_provenance),
            Node::List { items, explicit } => {
                *explicit = false;
                items.iter_mut().for_each(Node::clear_provenance);
            }
        }
    }
}

/// Path of a direct child: `prefix.name`, or just `name` at the root.
pub(crate) fn child_path(prefix: Option<&PathAddress>, name: &str) -> PathAddress {
    match prefix {
        Some(parent) => parent.child(name),
        None => PathAddress::field(name),
    }
}

/// Visit every non-root node in depth-first order.
fn walk<'a>(
    node: &'a Node,
    path: Option<&PathAddress>,
    visit: &mut impl FnMut(&PathAddress, &'a Node),
) {
    match node {
        Node::Leaf { .. } => {}
        Node::Group(fields) => {
            for (name, child) in fields {
                let at = child_path(path, name);
                visit(&at, child);
                walk(child, Some(&at), visit);
            }
        }
        Node::List { items, .. } => {
            // Lists never sit at the root, so `path` is set here.
            if let Some(parent) = path {
                for (i, item) in items.iter().enumerate() {
                    let item_path = parent.index(i);
                    visit(&item_path, item);
                    walk(item, Some(&item_path), visit);
                }
            }
        }
    }
}

/// Insert the path of every leaf at or below `node` into `out`.
pub(crate) fn collect_leaves(node: &Node, path: &PathAddress, out: &mut BTreeSet<PathAddress>) {
    if matches!(node, Node::Leaf { .. }) {
        out.insert(path.clone());
        return;
    }
    walk(node, Some(path), &mut |p, n| {
        if matches!(n, Node::Leaf { .. }) {
            out.insert(p.clone());
        }
    });
}

/// Settings tree bound to a schema
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    schema: Arc<Schema>,
    root: Node,
}

impl PartialEq for ConfigDocument {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl ConfigDocument {
    /// Document holding every schema default.
    pub fn new(schema: Arc<Schema>) -> Self {
        let root = Node::from_schema(schema.root());
        Self { schema, root }
    }

    pub(crate) fn from_root(schema: Arc<Schema>, root: Node) -> Self {
        Self { schema, root }
    }

    pub(crate) fn root(&self) -> &Node {
        &self.root
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn node(&self, path: &PathAddress) -> Result<&Node> {
        let mut node = &self.root;
        for step in path.steps() {
            node = match (node, step) {
                (Node::Group(fields), Step::Field(name)) => fields
                    .get(name)
                    .ok_or_else(|| SettingsError::unknown(path))?,
                (Node::List { items, .. }, Step::Index(i)) => {
                    items.get(*i).ok_or_else(|| SettingsError::Range {
                        path: path.to_string(),
                        index: *i,
                        len: items.len(),
                    })?
                }
                _ => return Err(SettingsError::unknown(path)),
            };
        }
        Ok(node)
    }

    fn node_mut(&mut self, path: &PathAddress) -> Result<&mut Node> {
        let mut node = &mut self.root;
        for step in path.steps() {
            node = match (node, step) {
                (Node::Group(fields), Step::Field(name)) => fields
                    .get_mut(name)
                    .ok_or_else(|| SettingsError::unknown(path))?,
                (Node::List { items, .. }, Step::Index(i)) => {
                    let len = items.len();
                    items.get_mut(*i).ok_or_else(|| SettingsError::Range {
                        path: path.to_string(),
                        index: *i,
                        len,
                    })?
                }
                _ => return Err(SettingsError::unknown(path)),
            };
        }
        Ok(node)
    }

    /// Value of the leaf at `path`.
    pub fn get(&self, path: &PathAddress) -> Result<&Value> {
        self.schema.leaf_kind(path)?;
        match self.node(path)? {
            Node::Leaf { value, .. } => Ok(value),
            _ => Err(SettingsError::unknown(path)),
        }
    }

    /// Whether the leaf (or list) at `path` was explicitly set.
    pub fn is_explicit(&self, path: &PathAddress) -> Result<bool> {
        self.schema.node(path)?;
        match self.node(path)? {
            Node::Leaf { explicit, .. } | Node::List { explicit, .. } => Ok(*explicit),
            Node::Group(_) => Err(SettingsError::unknown(path)),
        }
    }

    pub fn list_len(&self, path: &PathAddress) -> Result<usize> {
        match self.node(path)? {
            Node::List { items, .. } => Ok(items.len()),
            _ => Err(SettingsError::unknown(path)),
        }
    }

    /// New document with the leaf at `path` replaced and marked explicit.
    ///
    /// An index equal to the list length appends a default element first.
    pub fn set(&self, path: &PathAddress, value: impl Into<Value>) -> Result<Self> {
        let mut next = self.clone();
        next.assign(path, value.into())?;
        Ok(next)
    }

    /// In-place form of [`set`](Self::set) for private working buffers.
    ///
    /// Leaves the document untouched on error.
    pub(crate) fn assign(&mut self, path: &PathAddress, value: Value) -> Result<()> {
        let expected = self.schema.leaf_kind(path)?;
        if value.kind() != expected {
            return Err(SettingsError::TypeMismatch {
                path: path.to_string(),
                expected,
                actual: value.kind().to_string(),
            });
        }
        // JSON has no encoding for NaN or infinity.
        if matches!(value, Value::Number(n) if !n.is_finite()) {
            return Err(SettingsError::TypeMismatch {
                path: path.to_string(),
                expected,
                actual: "non-finite number".to_string(),
            });
        }
        assign_at(&mut self.root, self.schema.root(), path.steps(), path, value)
    }

    /// Copy the leaf at `path` from `source`, growing lists from `source`
    /// where this document is shorter, and mark it explicit.
    pub(crate) fn adopt(&mut self, source: &ConfigDocument, path: &PathAddress) -> Result<()> {
        self.schema.leaf_kind(path)?;
        adopt_at(&mut self.root, &source.root, path.steps(), path)
    }

    /// Drop list ownership wherever this document's list is no longer than
    /// the one in `base`.
    pub(crate) fn settle_lists(&mut self, base: &ConfigDocument) {
        settle_lists(&mut self.root, &base.root);
    }

    /// Mark the leaf or list at `path` explicit without changing its value.
    pub(crate) fn mark_explicit(&mut self, path: &PathAddress) -> Result<()> {
        self.schema.node(path)?;
        match self.node_mut(path)? {
            Node::Leaf { explicit, .. } | Node::List { explicit, .. } => {
                *explicit = true;
                Ok(())
            }
            Node::Group(_) => Err(SettingsError::unknown(path)),
        }
    }

    /// Clear the explicit flag at `path`; returns whether it was set.
    pub(crate) fn clear_explicit(&mut self, path: &PathAddress) -> Result<bool> {
        self.schema.node(path)?;
        match self.node_mut(path)? {
            Node::Leaf { explicit, .. } | Node::List { explicit, .. } => {
                Ok(std::mem::replace(explicit, false))
            }
            Node::Group(_) => Err(SettingsError::unknown(path)),
        }
    }

    /// Same values with every explicit flag cleared.
    pub fn without_provenance(&self) -> Self {
        let mut next = self.clone();
        next.root.clear_provenance();
        next
    }

    /// Paths of every leaf, in document order.
    pub fn leaf_paths(&self) -> Vec<PathAddress> {
        let mut out = Vec::new();
        walk(&self.root, None, &mut |path, node| {
            if matches!(node, Node::Leaf { .. }) {
                out.push(path.clone());
            }
        });
        out
    }

    /// Paths of every explicitly set leaf and structurally set list.
    pub fn explicit_paths(&self) -> Vec<PathAddress> {
        let mut out = Vec::new();
        walk(&self.root, None, &mut |path, node| match node {
            Node::Leaf { explicit: true, .. } | Node::List { explicit: true, .. } => {
                out.push(path.clone())
            }
            _ => {}
        });
        out
    }

    /// Leaf paths whose values differ from `other`.
    pub fn diff(&self, other: &ConfigDocument) -> BTreeSet<PathAddress> {
        diff(self, other)
    }
}

fn assign_at(
    node: &mut Node,
    schema: &SchemaNode,
    steps: &[Step],
    path: &PathAddress,
    value: Value,
) -> Result<()> {
    match (node, steps.split_first()) {
        (Node::Leaf { value: slot, explicit }, None) => {
            *slot = value;
            *explicit = true;
            Ok(())
        }
        (Node::Group(fields), Some((Step::Field(name), rest))) => {
            let child_schema = match schema {
                SchemaNode::Group(group) => group.field(name),
                _ => None,
            }
            .ok_or_else(|| SettingsError::unknown(path))?;
            let child = fields
                .get_mut(name)
                .ok_or_else(|| SettingsError::unknown(path))?;
            assign_at(child, child_schema, rest, path, value)
        }
        (Node::List { items, explicit }, Some((Step::Index(i), rest))) => {
            let SchemaNode::List { element, .. } = schema else {
                return Err(SettingsError::unknown(path));
            };
            let len = items.len();
            if *i < len {
                assign_at(&mut items[*i], element, rest, path, value)
            } else if *i == len {
                // Append: only attach the new element once the assignment
                // inside it has succeeded.
                let mut fresh = Node::from_schema(element);
                assign_at(&mut fresh, element, rest, path, value)?;
                items.push(fresh);
                *explicit = true;
                Ok(())
            } else {
                Err(SettingsError::Range {
                    path: path.to_string(),
                    index: *i,
                    len,
                })
            }
        }
        _ => Err(SettingsError::unknown(path)),
    }
}

fn adopt_at(node: &mut Node, source: &Node, steps: &[Step], path: &PathAddress) -> Result<()> {
    match (node, source, steps.split_first()) {
        (Node::Leaf { value, explicit }, Node::Leaf { value: incoming, .. }, None) => {
            *value = incoming.clone();
            *explicit = true;
            Ok(())
        }
        (Node::Group(fields), Node::Group(source_fields), Some((Step::Field(name), rest))) => {
            match (fields.get_mut(name), source_fields.get(name)) {
                (Some(child), Some(source_child)) => adopt_at(child, source_child, rest, path),
                _ => Err(SettingsError::unknown(path)),
            }
        }
        (
            Node::List { items, explicit },
            Node::List {
                items: source_items,
                ..
            },
            Some((Step::Index(i), rest)),
        ) => {
            let Some(source_item) = source_items.get(*i) else {
                return Err(SettingsError::Range {
                    path: path.to_string(),
                    index: *i,
                    len: source_items.len(),
                });
            };
            while items.len() <= *i {
                let mut grown = source_items[items.len()].clone();
                grown.clear_provenance();
                items.push(grown);
                *explicit = true;
            }
            adopt_at(&mut items[*i], source_item, rest, path)
        }
        _ => Err(SettingsError::unknown(path)),
    }
}

fn settle_lists(node: &mut Node, base: &Node) {
    match (node, base) {
        (Node::Group(fields), Node::Group(base_fields)) => {
            for (name, child) in fields.iter_mut() {
                if let Some(base_child) = base_fields.get(name) {
                    settle_lists(child, base_child);
                }
            }
        }
        (Node::List { items, explicit }, Node::List { items: base_items, .. }) => {
            if items.len() <= base_items.len() {
                *explicit = false;
            }
            for (item, base_item) in items.iter_mut().zip(base_items) {
                settle_lists(item, base_item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GroupSchema, LeafKind};

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(
            "doc-test",
            1,
            GroupSchema::new()
                .group(
                    "runtime",
                    GroupSchema::new().leaf("apiPort", 8080).leaf("host", "localhost"),
                )
                .list(
                    "accounts",
                    GroupSchema::new()
                        .leaf("host", "imap.example.com")
                        .leaf("port", 993),
                    1,
                ),
        ))
    }

    fn path(text: &str) -> PathAddress {
        PathAddress::parse(text).unwrap()
    }

    #[test]
    fn test_defaults() {
        let doc = ConfigDocument::new(schema());
        assert_eq!(doc.get(&path("runtime.apiPort")).unwrap(), &Value::from(8080));
        assert_eq!(
            doc.get(&path("accounts[0].host")).unwrap(),
            &Value::from("imap.example.com")
        );
        assert_eq!(doc.list_len(&path("accounts")).unwrap(), 1);
        assert!(doc.explicit_paths().is_empty());
    }

    #[test]
    fn test_get_unknown_path() {
        let doc = ConfigDocument::new(schema());
        assert!(matches!(
            doc.get(&path("runtime.nope")),
            Err(SettingsError::UnknownPath(_))
        ));
        assert!(matches!(
            doc.get(&path("runtime")),
            Err(SettingsError::UnknownPath(_))
        ));
    }

    #[test]
    fn test_get_out_of_range() {
        let doc = ConfigDocument::new(schema());
        assert!(matches!(
            doc.get(&path("accounts[3].host")),
            Err(SettingsError::Range { index: 3, len: 1, .. })
        ));
    }

    #[test]
    fn test_set_is_copy_on_write() {
        let doc = ConfigDocument::new(schema());
        let next = doc.set(&path("runtime.apiPort"), 9090).unwrap();

        assert_eq!(doc.get(&path("runtime.apiPort")).unwrap(), &Value::from(8080));
        assert_eq!(next.get(&path("runtime.apiPort")).unwrap(), &Value::from(9090));
        assert!(next.is_explicit(&path("runtime.apiPort")).unwrap());
        assert!(!doc.is_explicit(&path("runtime.apiPort")).unwrap());
    }

    #[test]
    fn test_set_type_mismatch() {
        let doc = ConfigDocument::new(schema());
        let err = doc.set(&path("runtime.apiPort"), "eighty").unwrap_err();
        assert_eq!(
            err,
            SettingsError::TypeMismatch {
                path: "runtime.apiPort".to_string(),
                expected: LeafKind::Number,
                actual: "string".to_string(),
            }
        );
    }

    #[test]
    fn test_set_rejects_non_finite_numbers() {
        let doc = ConfigDocument::new(schema());
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = doc.set(&path("runtime.apiPort"), bad).unwrap_err();
            assert_eq!(
                err,
                SettingsError::TypeMismatch {
                    path: "runtime.apiPort".to_string(),
                    expected: LeafKind::Number,
                    actual: "non-finite number".to_string(),
                }
            );
        }
        assert!(doc.set(&path("runtime.apiPort"), 0.5).is_ok());
    }

    #[test]
    fn test_set_append_and_range() {
        let doc = ConfigDocument::new(schema());

        let appended = doc.set(&path("accounts[1].host"), "mail.corp").unwrap();
        assert_eq!(appended.list_len(&path("accounts")).unwrap(), 2);
        assert_eq!(appended.get(&path("accounts[1].port")).unwrap(), &Value::from(993));
        assert!(appended.is_explicit(&path("accounts")).unwrap());
        assert!(!appended.is_explicit(&path("accounts[1].port")).unwrap());

        let err = doc.set(&path("accounts[2].host"), "x").unwrap_err();
        assert!(matches!(err, SettingsError::Range { index: 2, len: 1, .. }));
    }

    #[test]
    fn test_failed_assign_leaves_document_untouched() {
        let mut doc = ConfigDocument::new(schema());
        let before = doc.clone();

        assert!(doc.assign(&path("accounts[5].host"), Value::from("x")).is_err());
        assert!(doc.assign(&path("runtime.apiPort"), Value::from(true)).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_leaf_and_explicit_paths() {
        let doc = ConfigDocument::new(schema())
            .set(&path("runtime.host"), "0.0.0.0")
            .unwrap();

        let leaves: Vec<String> = doc.leaf_paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            leaves,
            vec![
                "accounts[0].host",
                "accounts[0].port",
                "runtime.apiPort",
                "runtime.host"
            ]
        );
        assert_eq!(doc.explicit_paths(), vec![path("runtime.host")]);
    }

    #[test]
    fn test_adopt_grows_lists() {
        let source = ConfigDocument::new(schema())
            .set(&path("accounts[1].host"), "mail.corp")
            .unwrap();
        let mut target = ConfigDocument::new(schema());

        target.adopt(&source, &path("accounts[1].host")).unwrap();
        assert_eq!(target.list_len(&path("accounts")).unwrap(), 2);
        assert_eq!(
            target.get(&path("accounts[1].host")).unwrap(),
            &Value::from("mail.corp")
        );
        assert!(target.is_explicit(&path("accounts[1].host")).unwrap());
        assert!(!target.is_explicit(&path("accounts[1].port")).unwrap());
        assert!(target.is_explicit(&path("accounts")).unwrap());
    }

    #[test]
    fn test_settle_lists_drops_ownership_within_base_length() {
        let base = ConfigDocument::new(schema())
            .set(&path("accounts[1].host"), "mail.corp")
            .unwrap();
        let mut grown = ConfigDocument::new(schema());
        grown.adopt(&base, &path("accounts[1].port")).unwrap();
        assert!(grown.is_explicit(&path("accounts")).unwrap());

        grown.settle_lists(&base);
        assert!(!grown.is_explicit(&path("accounts")).unwrap());
        assert!(grown.is_explicit(&path("accounts[1].port")).unwrap());

        let mut longer = base.set(&path("accounts[2].host"), "mail.lab").unwrap();
        longer.settle_lists(&base);
        assert!(longer.is_explicit(&path("accounts")).unwrap());
    }

    #[test]
    fn test_clear_explicit_and_without_provenance() {
        let mut doc = ConfigDocument::new(schema())
            .set(&path("runtime.host"), "0.0.0.0")
            .unwrap()
            .set(&path("runtime.apiPort"), 1)
            .unwrap();

        assert!(doc.clear_explicit(&path("runtime.host")).unwrap());
        assert!(!doc.clear_explicit(&path("runtime.host")).unwrap());
        assert_eq!(doc.explicit_paths(), vec![path("runtime.apiPort")]);

        let plain = doc.without_provenance();
        assert!(plain.explicit_paths().is_empty());
        assert_eq!(plain.get(&path("runtime.apiPort")).unwrap(), &Value::from(1));
    }
}
