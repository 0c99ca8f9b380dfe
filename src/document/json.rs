//! JSON conversion for documents
//!
//! Values only; provenance is carried separately by the snapshot format.

use serde_json::Value as Json;
use settings_path::PathAddress;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{child_path, ConfigDocument, Node, Value};
use crate::error::{Result, SettingsError};
use crate::schema::{Schema, SchemaNode};

impl ConfigDocument {
    /// Nested JSON object of leaf values.
    pub fn to_json(&self) -> Json {
        node_to_json(self.root())
    }

    /// Build a document from nested JSON.
    ///
    /// Fields missing from `json` take schema defaults. Unknown fields fail
    /// with `UnknownPath` and wrongly-typed leaves with `TypeMismatch`.
    pub fn from_json(schema: Arc<Schema>, json: &Json) -> Result<Self> {
        let root = node_from_json(schema.root(), json, None)?;
        Ok(ConfigDocument::from_root(schema, root))
    }
}

fn node_to_json(node: &Node) -> Json {
    match node {
        Node::Leaf { value, .. } => value.to_json(),
        Node::Group(fields) => Json::Object(
            fields
                .iter()
                .map(|(name, child)| (name.clone(), node_to_json(child)))
                .collect(),
        ),
        Node::List { items, .. } => Json::Array(items.iter().map(node_to_json).collect()),
    }
}

fn node_from_json(schema: &SchemaNode, json: &Json, path: Option<&PathAddress>) -> Result<Node> {
    let describe = || path.map(|p| p.to_string()).unwrap_or_else(|| "<root>".to_string());

    match schema {
        SchemaNode::Leaf { kind, .. } => {
            let value = Value::from_json(*kind, json).ok_or_else(|| SettingsError::TypeMismatch {
                path: describe(),
                expected: *kind,
                actual: json_kind(json).to_string(),
            })?;
            Ok(Node::Leaf {
                value,
                explicit: false,
            })
        }
        SchemaNode::Group(group) => {
            let Json::Object(map) = json else {
                return Err(SettingsError::validation(describe(), "expected an object"));
            };

            if let Some(unknown) = map.keys().find(|name| group.field(name).is_none()) {
                return Err(SettingsError::UnknownPath(
                    child_path(path, unknown).to_string(),
                ));
            }

            let mut fields = BTreeMap::new();
            for (name, child_schema) in group.fields() {
                let child = match map.get(name) {
                    Some(child_json) => {
                        node_from_json(child_schema, child_json, Some(&child_path(path, name)))?
                    }
                    None => Node::from_schema(child_schema),
                };
                fields.insert(name.clone(), child);
            }
            Ok(Node::Group(fields))
        }
        SchemaNode::List { element, .. } => {
            let (Json::Array(items), Some(parent)) = (json, path) else {
                return Err(SettingsError::validation(describe(), "expected an array"));
            };
            let items = items
                .iter()
                .enumerate()
                .map(|(i, item)| node_from_json(element, item, Some(&parent.index(i))))
                .collect::<Result<Vec<_>>>()?;
            Ok(Node::List {
                items,
                explicit: false,
            })
        }
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
