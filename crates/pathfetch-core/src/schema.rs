//! # Schema Model
//!
//! The schema is a tree of [`SchemaNode`]s describing the shape of the data
//! graph. It is defined once and shared by the client and the server.
//!
//! ## JSON notation
//!
//! Schemas are usually written as JSON:
//!
//! - a single-element array is a collection of items shaped like that element
//! - `{"$ref": "users"}` is a reference into the `users` collection
//! - any other object is an object with named fields
//! - everything else (strings, numbers, arrays of primitives) is a primitive,
//!   and the value doubles as the placeholder shown for unfetched data
//!
//! ```rust
//! use pathfetch_core::{NodeKind, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::from_json(&json!({
//!     "topics": [{ "name": "Example topic", "openingEntry": { "$ref": "entries" } }],
//!     "entries": [{ "text": "Hello" }],
//! }))
//! .unwrap();
//!
//! assert_eq!(schema.type_of_path("topics.5.openingEntry").unwrap(), NodeKind::Reference);
//! assert_eq!(schema.type_of_path("topics.5.openingEntry.text").unwrap(), NodeKind::Primitive);
//! ```

use crate::error::SchemaError;
use crate::path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key marking a reference in the JSON notation.
pub const REF_MARKER: &str = "$ref";

/// The four kinds of schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Collection,
    Reference,
    Object,
    Primitive,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Collection => "collection",
            NodeKind::Reference => "reference",
            NodeKind::Object => "object",
            NodeKind::Primitive => "primitive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// Every member is shaped like the template item.
    Collection(Box<SchemaNode>),
    /// Foreign key into the named collection.
    Reference(String),
    Object(IndexMap<String, SchemaNode>),
    /// Leaf value. The payload is the placeholder for unfetched data.
    Primitive(Value),
}

impl SchemaNode {
    pub fn collection(item: SchemaNode) -> Self {
        SchemaNode::Collection(Box::new(item))
    }

    pub fn reference(target: impl Into<String>) -> Self {
        SchemaNode::Reference(target.into())
    }

    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        SchemaNode::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn primitive(placeholder: impl Into<Value>) -> Self {
        SchemaNode::Primitive(placeholder.into())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            SchemaNode::Collection(_) => NodeKind::Collection,
            SchemaNode::Reference(_) => NodeKind::Reference,
            SchemaNode::Object(_) => NodeKind::Object,
            SchemaNode::Primitive(_) => NodeKind::Primitive,
        }
    }

    /// Parses the JSON notation described in the module docs.
    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::Array(items) if items.len() == 1 => {
                let item = SchemaNode::from_json(&items[0])?;
                if item.kind() == NodeKind::Primitive {
                    Ok(SchemaNode::Primitive(value.clone()))
                } else {
                    Ok(SchemaNode::collection(item))
                }
            }
            Value::Array(items) => {
                if items.iter().any(|item| item.is_object() || item.is_array()) {
                    return Err(SchemaError::InvalidDefinition(format!(
                        "a collection is declared with exactly one template item, got {}",
                        items.len()
                    )));
                }
                Ok(SchemaNode::Primitive(value.clone()))
            }
            Value::Object(map) => {
                if let (1, Some(Value::String(target))) = (map.len(), map.get(REF_MARKER)) {
                    return Ok(SchemaNode::reference(target.clone()));
                }
                let fields = map
                    .iter()
                    .map(|(name, field)| Ok((name.clone(), SchemaNode::from_json(field)?)))
                    .collect::<Result<IndexMap<_, _>, SchemaError>>()?;
                Ok(SchemaNode::Object(fields))
            }
            other => Ok(SchemaNode::Primitive(other.clone())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SchemaNode::Collection(item) => Value::Array(vec![item.to_json()]),
            SchemaNode::Reference(target) => {
                let mut marker = Map::new();
                marker.insert(REF_MARKER.to_owned(), Value::String(target.clone()));
                Value::Object(marker)
            }
            SchemaNode::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, field)| (name.clone(), field.to_json()))
                    .collect(),
            ),
            SchemaNode::Primitive(placeholder) => placeholder.clone(),
        }
    }
}

/// A validated schema: an object at the root, and every reference pointing at
/// a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Schema {
    root: SchemaNode,
}

impl Schema {
    pub fn new(root: SchemaNode) -> Result<Self, SchemaError> {
        if root.kind() != NodeKind::Object {
            return Err(SchemaError::InvalidDefinition(format!(
                "the root must be an object, got a {}",
                root.kind()
            )));
        }
        let schema = Self { root };
        schema.check_references(&schema.root)?;
        Ok(schema)
    }

    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        Self::new(SchemaNode::from_json(value)?)
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Template item of the collection at `target` (usually a top-level name).
    pub fn collection_item(&self, target: &str) -> Result<&SchemaNode, SchemaError> {
        let mut node = &self.root;
        for segment in path::segments(target) {
            node = match node {
                SchemaNode::Object(fields) => fields
                    .get(segment)
                    .ok_or_else(|| SchemaError::UnknownCollection(target.to_owned()))?,
                _ => return Err(SchemaError::UnknownCollection(target.to_owned())),
            };
        }
        match node {
            SchemaNode::Collection(item) => Ok(item),
            _ => Err(SchemaError::UnknownCollection(target.to_owned())),
        }
    }

    /// Steps one level down from `node`.
    ///
    /// Collections ignore `key` and yield their template, references continue
    /// from the template of the referenced collection. `Ok(None)` means the
    /// object has no such field.
    pub fn descend<'s>(
        &'s self,
        node: &'s SchemaNode,
        key: &str,
    ) -> Result<Option<&'s SchemaNode>, SchemaError> {
        match node {
            SchemaNode::Collection(item) => Ok(Some(item)),
            SchemaNode::Reference(target) => {
                let template = self.collection_item(target)?;
                self.descend(template, key)
            }
            SchemaNode::Object(fields) => Ok(fields.get(key)),
            SchemaNode::Primitive(_) => Err(SchemaError::DescendIntoPrimitive(key.to_owned())),
        }
    }

    /// The node a path leads to. The empty path is the root.
    pub fn node_at(&self, path: &str) -> Result<&SchemaNode, SchemaError> {
        if path.is_empty() {
            return Ok(&self.root);
        }
        path::segments(path)
            .into_iter()
            .try_fold(&self.root, |node, key| {
                self.descend(node, key)?
                    .ok_or_else(|| SchemaError::InvalidPath(path.to_owned()))
            })
    }

    pub fn type_of_path(&self, path: &str) -> Result<NodeKind, SchemaError> {
        self.node_at(path).map(SchemaNode::kind)
    }

    fn check_references(&self, node: &SchemaNode) -> Result<(), SchemaError> {
        match node {
            SchemaNode::Collection(item) => self.check_references(item),
            SchemaNode::Reference(target) => self.collection_item(target).map(|_| ()),
            SchemaNode::Object(fields) => fields
                .values()
                .try_for_each(|field| self.check_references(field)),
            SchemaNode::Primitive(_) => Ok(()),
        }
    }
}

impl TryFrom<Value> for Schema {
    type Error = SchemaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Schema::from_json(&value)
    }
}

impl From<Schema> for Value {
    fn from(schema: Schema) -> Self {
        schema.root.to_json()
    }
}
