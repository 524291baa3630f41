//! # Access Tracker
//!
//! A read-only view over a partial store, shaped like the schema. Reading
//! through a view never fails for lack of data: missing values fall back to
//! the schema's placeholders and the path that was missing is reported to the
//! `on_miss` sink. The [`FetchLoop`](crate::FetchLoop) collects those paths,
//! fetches them, and runs the reader again.
//!
//! | Field kind | Data present | Data missing |
//! |------------|--------------|--------------|
//! | primitive | stored value | placeholder, miss |
//! | object | nested view | nested view over placeholders, miss |
//! | reference | view of the referenced entity, or absent for `null` | view over the target's placeholders, miss |
//! | collection | [`CollectionView`] | `keys()` reports `path.*` and yields `"*"` |
//!
//! Views borrow the store, so they cannot outlive the pass they belong to.
//!
//! ```rust
//! use pathfetch_core::{tracker, Schema};
//! use serde_json::json;
//! use std::cell::RefCell;
//!
//! let schema = Schema::from_json(&json!({ "users": [{ "name": "Nobody" }] })).unwrap();
//! let store = json!({ "users": { "7": { "name": "Ann" } } });
//! let misses = RefCell::new(Vec::new());
//! let sink = |path: &str| misses.borrow_mut().push(path.to_owned());
//!
//! let view = tracker::create(&schema, &store, &sink);
//! let users = view.collection("users").unwrap();
//! assert_eq!(users.item("7").unwrap().text("name").unwrap(), "Ann");
//! assert_eq!(users.item("8").unwrap().text("name").unwrap(), "Nobody");
//! assert_eq!(*misses.borrow(), vec!["users.8", "users.8.name"]);
//! ```

use crate::error::SchemaError;
use crate::path::{self, WILDCARD};
use crate::schema::{NodeKind, Schema, SchemaNode};
use crate::store::{id_key, KNOWN_KEYS};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// Receives every path that was read while missing.
pub type MissSink<'a> = &'a dyn Fn(&str);

/// Builds the root view.
pub fn create<'a>(schema: &'a Schema, store: &'a Value, on_miss: MissSink<'a>) -> ObjectView<'a> {
    let tracker = Tracker {
        schema,
        root: store,
        on_miss,
    };
    let fields = match schema.root() {
        SchemaNode::Object(fields) => fields,
        _ => unreachable!("schema roots are validated to be objects"),
    };
    ObjectView {
        tracker,
        fields,
        store: Some(store),
        path: String::new(),
    }
}

#[derive(Clone, Copy)]
struct Tracker<'a> {
    schema: &'a Schema,
    root: &'a Value,
    on_miss: MissSink<'a>,
}

impl<'a> Tracker<'a> {
    fn miss(&self, path: &str) {
        (self.on_miss)(path);
    }

    /// Materializes `node` over `stored`, reporting `path` when nothing is stored.
    fn node(&self, node: &'a SchemaNode, stored: Option<&'a Value>, path: String) -> Node<'a> {
        match node {
            SchemaNode::Primitive(placeholder) => match stored {
                Some(value) => Node::Primitive(value.clone()),
                None => {
                    self.miss(&path);
                    Node::Primitive(placeholder.clone())
                }
            },
            SchemaNode::Object(fields) => match stored {
                Some(Value::Null) => Node::Absent,
                None => {
                    self.miss(&path);
                    Node::Object(self.object(fields, None, path))
                }
                Some(value) => Node::Object(self.object(fields, Some(value), path)),
            },
            SchemaNode::Reference(target) => match stored {
                Some(Value::Null) => Node::Absent,
                None => {
                    self.miss(&path);
                    self.detached(target, path)
                }
                Some(value) => match id_key(value) {
                    Some(id) => self.entity(target, &id),
                    // Not an id, so the reference is still unknown
                    None => {
                        self.miss(&path);
                        self.detached(target, path)
                    }
                },
            },
            SchemaNode::Collection(item) => Node::Collection(CollectionView {
                tracker: *self,
                item,
                store: stored,
                path,
            }),
        }
    }

    fn object(
        &self,
        fields: &'a IndexMap<String, SchemaNode>,
        stored: Option<&'a Value>,
        path: String,
    ) -> ObjectView<'a> {
        ObjectView {
            tracker: *self,
            fields,
            store: stored,
            path,
        }
    }

    /// The entity `id` of the collection `target`, at path `target.id`.
    fn entity(&self, target: &'a str, id: &str) -> Node<'a> {
        let Ok(item) = self.schema.collection_item(target) else {
            return Node::Absent;
        };
        let stored = self
            .root
            .pointer(&json_pointer(target))
            .and_then(|collection| collection.get(id));
        self.node(item, stored, path::child(target, id))
    }

    /// A view over the target's placeholders that keeps reporting under `path`.
    fn detached(&self, target: &'a str, path: String) -> Node<'a> {
        match self.schema.collection_item(target) {
            Ok(SchemaNode::Object(fields)) => Node::Object(self.object(fields, None, path)),
            Ok(item) => self.node(item, None, path),
            Err(_) => Node::Absent,
        }
    }
}

fn json_pointer(dotted: &str) -> String {
    path::segments(dotted)
        .into_iter()
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}

/// A value read through a view.
#[derive(Debug, Clone)]
pub enum Node<'a> {
    Primitive(Value),
    Object(ObjectView<'a>),
    Collection(CollectionView<'a>),
    /// Confirmed absent: the store holds `null`.
    Absent,
}

impl<'a> Node<'a> {
    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            Node::Primitive(_) => Some(NodeKind::Primitive),
            Node::Object(_) => Some(NodeKind::Object),
            Node::Collection(_) => Some(NodeKind::Collection),
            Node::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Node::Absent)
    }

    pub fn as_primitive(&self) -> Option<&Value> {
        match self {
            Node::Primitive(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectView<'a>> {
        match self {
            Node::Object(view) => Some(view),
            _ => None,
        }
    }

    pub fn into_collection(self) -> Option<CollectionView<'a>> {
        match self {
            Node::Collection(view) => Some(view),
            _ => None,
        }
    }
}

/// View of an object, an entity, or the root.
#[derive(Clone)]
pub struct ObjectView<'a> {
    tracker: Tracker<'a>,
    fields: &'a IndexMap<String, SchemaNode>,
    store: Option<&'a Value>,
    path: String,
}

impl<'a> ObjectView<'a> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `false` while this object is built from placeholders only.
    pub fn is_fetched(&self) -> bool {
        self.store.is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Reads any declared field.
    pub fn get(&self, name: &str) -> Result<Node<'a>, SchemaError> {
        let node = self
            .fields
            .get(name)
            .ok_or_else(|| SchemaError::UnknownField {
                path: self.path.clone(),
                field: name.to_owned(),
            })?;
        let stored = self.store.and_then(|store| store.get(name));
        Ok(self.tracker.node(node, stored, path::child(&self.path, name)))
    }

    pub fn primitive(&self, name: &str) -> Result<Value, SchemaError> {
        match self.typed(name, NodeKind::Primitive)? {
            Node::Primitive(value) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    /// A primitive as text: strings as they are, anything else serialized.
    pub fn text(&self, name: &str) -> Result<String, SchemaError> {
        Ok(match self.primitive(name)? {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    /// A nested object. `None` when the store holds `null`.
    pub fn object(&self, name: &str) -> Result<Option<ObjectView<'a>>, SchemaError> {
        Ok(self.typed(name, NodeKind::Object)?.into_object())
    }

    /// The entity behind a reference. `None` when the reference is `null`.
    pub fn reference(&self, name: &str) -> Result<Option<ObjectView<'a>>, SchemaError> {
        Ok(self.typed(name, NodeKind::Reference)?.into_object())
    }

    pub fn collection(&self, name: &str) -> Result<CollectionView<'a>, SchemaError> {
        match self.typed(name, NodeKind::Collection)? {
            Node::Collection(view) => Ok(view),
            _ => unreachable!("collection fields always yield collection views"),
        }
    }

    fn typed(&self, name: &str, expected: NodeKind) -> Result<Node<'a>, SchemaError> {
        let declared = self
            .fields
            .get(name)
            .map(SchemaNode::kind)
            .ok_or_else(|| SchemaError::UnknownField {
                path: self.path.clone(),
                field: name.to_owned(),
            })?;
        if declared != expected {
            return Err(SchemaError::KindMismatch {
                path: path::child(&self.path, name),
                expected,
                found: declared,
            });
        }
        self.get(name)
    }
}

impl fmt::Debug for ObjectView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectView")
            .field("path", &self.path)
            .field("fetched", &self.is_fetched())
            .finish()
    }
}

/// View of a collection.
#[derive(Clone)]
pub struct CollectionView<'a> {
    tracker: Tracker<'a>,
    item: &'a SchemaNode,
    store: Option<&'a Value>,
    path: String,
}

impl<'a> CollectionView<'a> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The known member ids, or `["*"]` (reporting `path.*`) when the full
    /// set has not been fetched.
    pub fn keys(&self) -> Vec<String> {
        let known = match self.store {
            Some(Value::Object(members)) => members.get(KNOWN_KEYS),
            Some(list @ Value::Array(_)) => Some(list),
            _ => None,
        };
        match known {
            Some(Value::Array(ids)) => ids.iter().filter_map(id_key).collect(),
            _ => {
                self.tracker.miss(&path::child(&self.path, WILDCARD));
                vec![WILDCARD.to_owned()]
            }
        }
    }

    /// The member `id`. Members of reference collections are the referenced
    /// entities themselves, except for the `"*"` placeholder member.
    pub fn get(&self, id: &str) -> Node<'a> {
        let item_path = path::child(&self.path, id);
        match self.item {
            SchemaNode::Reference(target) if id == WILDCARD => {
                self.tracker.miss(&item_path);
                self.tracker.detached(target, item_path)
            }
            SchemaNode::Reference(target) => self.tracker.entity(target, id),
            item => {
                let stored = self.store.and_then(|members| members.get(id));
                self.tracker.node(item, stored, item_path)
            }
        }
    }

    pub fn get_all(&self) -> Vec<Node<'a>> {
        self.keys().iter().map(|id| self.get(id)).collect()
    }

    /// Object view of a member. `None` when it is confirmed absent.
    pub fn item(&self, id: &str) -> Option<ObjectView<'a>> {
        self.get(id).into_object()
    }

    /// Object views of every present member.
    pub fn items(&self) -> Vec<ObjectView<'a>> {
        self.get_all()
            .into_iter()
            .filter_map(Node::into_object)
            .collect()
    }
}

impl fmt::Debug for CollectionView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionView")
            .field("path", &self.path)
            .field("member", &self.item.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn schema() -> Schema {
        Schema::from_json(&json!({
            "topics": [{
                "name": "Example topic",
                "entries": [{ "$ref": "entries" }],
                "openingEntry": { "$ref": "entries" },
            }],
            "entries": [{ "text": "Lorem", "author": { "$ref": "users" } }],
            "users": [{ "name": "Nobody", "avatar": { "url": "blank.png" } }],
            "config": { "imagesUrl": "http://example.com" },
        }))
        .unwrap()
    }

    /// Runs `read` against `store` and returns the reported paths.
    fn misses(store: Value, read: impl Fn(&ObjectView<'_>)) -> Vec<String> {
        let schema = schema();
        let reported = RefCell::new(Vec::new());
        let sink = |path: &str| reported.borrow_mut().push(path.to_owned());
        let view = create(&schema, &store, &sink);
        read(&view);
        drop(view);
        reported.into_inner()
    }

    #[test]
    fn empty_store_reports_each_level() {
        let reported = misses(json!({}), |view| {
            let topic = view.collection("topics").unwrap().item("199").unwrap();
            assert_eq!(topic.text("name").unwrap(), "Example topic");
        });
        assert_eq!(reported, vec!["topics.199", "topics.199.name"]);
    }

    #[test]
    fn stored_data_is_returned_without_misses() {
        let store = json!({
            "topics": { "1": { "name": "Rust", "openingEntry": 5 } },
            "entries": { "5": { "text": "Hi", "author": 9 } },
            "users": { "9": { "name": "Ann", "avatar": { "url": "ann.png" } } },
        });
        let reported = misses(store, |view| {
            let topic = view.collection("topics").unwrap().item("1").unwrap();
            let entry = topic.reference("openingEntry").unwrap().unwrap();
            assert_eq!(entry.path(), "entries.5");
            let author = entry.reference("author").unwrap().unwrap();
            assert_eq!(author.text("name").unwrap(), "Ann");
            let avatar = author.object("avatar").unwrap().unwrap();
            assert_eq!(avatar.text("url").unwrap(), "ann.png");
        });
        assert!(reported.is_empty());
    }

    #[test]
    fn null_reference_is_a_final_answer() {
        let store = json!({ "entries": { "5": { "text": "Hi", "author": null } } });
        let reported = misses(store, |view| {
            let entry = view.collection("entries").unwrap().item("5").unwrap();
            assert!(entry.reference("author").unwrap().is_none());
        });
        assert!(reported.is_empty());
    }

    #[test]
    fn missing_reference_keeps_reporting_under_its_path() {
        let store = json!({ "entries": { "5": { "text": "Hi" } } });
        let reported = misses(store, |view| {
            let entry = view.collection("entries").unwrap().item("5").unwrap();
            let author = entry.reference("author").unwrap().unwrap();
            assert_eq!(author.text("name").unwrap(), "Nobody");
        });
        assert_eq!(reported, vec!["entries.5.author", "entries.5.author.name"]);
    }

    #[test]
    fn reference_stored_without_an_id_is_reported() {
        let store = json!({ "entries": { "5": { "text": "Hi", "author": { "name": "x" } } } });
        let reported = misses(store, |view| {
            let entry = view.collection("entries").unwrap().item("5").unwrap();
            let author = entry.reference("author").unwrap().unwrap();
            assert!(!author.is_fetched());
            assert_eq!(author.text("name").unwrap(), "Nobody");
        });
        assert_eq!(reported, vec!["entries.5.author", "entries.5.author.name"]);
    }

    #[test]
    fn stored_reference_to_unfetched_entity_reports_the_entity() {
        let store = json!({ "entries": { "5": { "author": 42 } } });
        let reported = misses(store, |view| {
            let entry = view.collection("entries").unwrap().item("5").unwrap();
            let author = entry.reference("author").unwrap().unwrap();
            author.text("name").unwrap();
        });
        assert_eq!(reported, vec!["users.42", "users.42.name"]);
    }

    #[test]
    fn unknown_keys_report_the_wildcard() {
        let reported = misses(json!({}), |view| {
            let keys = view.collection("topics").unwrap().keys();
            assert_eq!(keys, vec!["*"]);
        });
        assert_eq!(reported, vec!["topics.*"]);
    }

    #[test]
    fn known_keys_are_returned_in_stored_order() {
        let store = json!({
            "entries": {
                "__keys": ["12", "15", "17"],
                "12": { "text": "a", "author": null },
                "15": { "text": "b", "author": null },
            },
        });
        let reported = misses(store, |view| {
            let entries = view.collection("entries").unwrap();
            assert_eq!(entries.keys(), vec!["12", "15", "17"]);
            for entry in entries.items() {
                entry.text("text").unwrap();
                entry.reference("author").unwrap();
            }
        });
        assert_eq!(reported, vec!["entries.17", "entries.17.text", "entries.17.author"]);
    }

    #[test]
    fn members_of_reference_collections_are_the_referenced_entities() {
        let reported = misses(json!({}), |view| {
            let topic = view.collection("topics").unwrap().item("199").unwrap();
            topic.collection("entries").unwrap().get("567");
        });
        assert_eq!(reported, vec!["topics.199", "entries.567"]);
    }

    #[test]
    fn wildcard_members_report_under_the_collection() {
        let store = json!({ "topics": { "199": { "name": "Rust" } } });
        let reported = misses(store, |view| {
            let topic = view.collection("topics").unwrap().item("199").unwrap();
            for entry in topic.collection("entries").unwrap().items() {
                entry.reference("author").unwrap();
            }
        });
        assert_eq!(
            reported,
            vec![
                "topics.199.entries.*",
                "topics.199.entries.*",
                "topics.199.entries.*.author",
            ]
        );
    }

    #[test]
    fn missing_objects_report_each_level() {
        let reported = misses(json!({}), |view| {
            let config = view.object("config").unwrap().unwrap();
            config.text("imagesUrl").unwrap();
        });
        assert_eq!(reported, vec!["config", "config.imagesUrl"]);
    }

    #[test]
    fn rejects_undeclared_fields_and_wrong_kinds() {
        misses(json!({}), |view| {
            assert!(matches!(
                view.get("nope"),
                Err(SchemaError::UnknownField { .. })
            ));
            assert!(matches!(
                view.primitive("topics"),
                Err(SchemaError::KindMismatch { .. })
            ));
        });
    }

    #[test]
    fn reading_never_mutates_the_store() {
        let store = json!({ "users": { "1": { "name": "Ann" } } });
        let before = store.clone();
        let schema = schema();
        let sink = |_: &str| {};
        let view = create(&schema, &store, &sink);
        view.collection("users").unwrap().item("2").unwrap().text("name").unwrap();
        assert_eq!(store, before);
    }
}
