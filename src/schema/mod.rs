//! Settings schema
//!
//! The schema fixes the shape shared by every document: field names,
//! nesting, list element shapes and leaf kinds, each leaf with a default.
//! It also declares the restart-required set and cross-field rules.

mod dashboard;
mod rules;

pub use dashboard::dashboard;
pub use rules::{Constraint, Rule};

use serde::{Deserialize, Serialize};
use settings_path::{PathAddress, Step};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::document::{ConfigDocument, Value};
use crate::error::{Result, SettingsError};

/// Kind tag of a leaf value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafKind {
    String,
    Number,
    Boolean,
    StringArray,
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeafKind::String => "string",
            LeafKind::Number => "number",
            LeafKind::Boolean => "boolean",
            LeafKind::StringArray => "string_array",
        };
        f.write_str(name)
    }
}

/// One node of the schema tree
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Leaf { kind: LeafKind, default: Value },
    Group(GroupSchema),
    /// Ordered sequence of elements that all share `element`'s shape.
    List {
        element: Box<SchemaNode>,
        default_len: usize,
    },
}

impl SchemaNode {
    /// Leaf whose kind is taken from its default value.
    pub fn leaf(default: impl Into<Value>) -> Self {
        let default = default.into();
        SchemaNode::Leaf {
            kind: default.kind(),
            default,
        }
    }

    pub fn list(element: impl Into<SchemaNode>, default_len: usize) -> Self {
        SchemaNode::List {
            element: Box::new(element.into()),
            default_len,
        }
    }
}

/// Named fields of a group node, built fluently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSchema {
    fields: BTreeMap<String, SchemaNode>,
}

impl GroupSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf(self, name: &str, default: impl Into<Value>) -> Self {
        self.node(name, SchemaNode::leaf(default))
    }

    pub fn group(self, name: &str, group: GroupSchema) -> Self {
        self.node(name, SchemaNode::Group(group))
    }

    pub fn list(self, name: &str, element: impl Into<SchemaNode>, default_len: usize) -> Self {
        self.node(name, SchemaNode::list(element, default_len))
    }

    /// Insert a node, replacing any previous definition of `name`.
    pub fn node(mut self, name: &str, node: SchemaNode) -> Self {
        self.fields.insert(name.to_string(), node);
        self
    }

    pub fn field(&self, name: &str) -> Option<&SchemaNode> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &SchemaNode)> {
        self.fields.iter()
    }
}

impl From<GroupSchema> for SchemaNode {
    fn from(group: GroupSchema) -> Self {
        SchemaNode::Group(group)
    }
}

/// Static schema definition
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    id: String,
    version: u32,
    root: SchemaNode,
    restart_required: BTreeSet<String>,
    rules: Vec<Rule>,
}

impl Schema {
    pub fn new(id: impl Into<String>, version: u32, root: GroupSchema) -> Self {
        Self {
            id: id.into(),
            version,
            root: SchemaNode::Group(root),
            restart_required: BTreeSet::new(),
            rules: Vec::new(),
        }
    }

    /// Declare that committing `key` (a schema key such as
    /// `system.runtime.apiPort`) requires a restart.
    pub fn restart_on(mut self, key: &str) -> Self {
        self.restart_required.insert(key.to_string());
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn root(&self) -> &SchemaNode {
        &self.root
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Resolve a path to its schema node, ignoring index bounds.
    pub fn node(&self, path: &PathAddress) -> Result<&SchemaNode> {
        let mut node = &self.root;
        for step in path.steps() {
            let next = match (node, step) {
                (SchemaNode::Group(group), Step::Field(name)) => group.field(name),
                (SchemaNode::List { element, .. }, Step::Index(_)) => Some(element.as_ref()),
                _ => None,
            };
            node = next.ok_or_else(|| SettingsError::unknown(path))?;
        }
        Ok(node)
    }

    /// Kind of the leaf addressed by `path`; groups and lists are not leaves.
    pub fn leaf_kind(&self, path: &PathAddress) -> Result<LeafKind> {
        match self.node(path)? {
            SchemaNode::Leaf { kind, .. } => Ok(*kind),
            _ => Err(SettingsError::unknown(path)),
        }
    }

    pub fn requires_restart(&self, path: &PathAddress) -> bool {
        self.restart_required.contains(&path.schema_key())
    }

    /// Schema keys whose commit raises the restart flag.
    pub fn restart_keys(&self) -> &BTreeSet<String> {
        &self.restart_required
    }

    /// Check every rule triggered by `touched` against `candidate`.
    ///
    /// Returns the first violation in path order.
    pub fn validate<'a>(
        &self,
        candidate: &ConfigDocument,
        touched: impl IntoIterator<Item = &'a PathAddress>,
    ) -> Result<()> {
        for path in touched {
            for rule in self.rules.iter().filter(|r| r.triggered_by(path)) {
                rule.check(candidate, path)?;
            }
        }
        Ok(())
    }

    /// Every leaf as `(schema key, kind)`, sorted by key.
    pub fn describe(&self) -> Vec<(String, LeafKind)> {
        let mut out = Vec::new();
        describe_node(&self.root, String::new(), &mut out);
        out
    }
}

fn describe_node(node: &SchemaNode, key: String, out: &mut Vec<(String, LeafKind)>) {
    match node {
        SchemaNode::Leaf { kind, .. } => out.push((key, *kind)),
        SchemaNode::Group(group) => {
            for (name, child) in group.fields() {
                let child_key = if key.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", key, name)
                };
                describe_node(child, child_key, out);
            }
        }
        SchemaNode::List { element, .. } => describe_node(element, format!("{}[]", key), out),
    }
}
