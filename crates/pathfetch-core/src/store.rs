//! # Store
//!
//! The store is the partial, grow-only copy of the data graph. It mirrors the
//! schema's shape but only holds what has been fetched:
//!
//! ```text
//! {
//!   "topics": {
//!     "123": { "name": "Rust", "openingEntry": 1234,
//!              "entries": { "__keys": ["12", "14"] } }
//!   },
//!   "entries": { "1234": { "text": "hello", "author": 777 } }
//! }
//! ```
//!
//! Collection levels map string ids to members. The reserved [`KNOWN_KEYS`]
//! entry records that the full member-id set of that collection is known.
//! Merges are recursive and add to what is stored. `null` is the exception:
//! it is a confirmed absence, so it replaces whatever was stored and nothing
//! is ever written beneath it.

use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Reserved entry listing every member id of a collection.
pub const KNOWN_KEYS: &str = "__keys";

/// Store shared between concurrent fetches of one session or request.
pub type SharedStore = Arc<Mutex<Store>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    root: Value,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wraps an existing fragment. Anything but an object starts empty.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Self { root: value },
            _ => Self::new(),
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.root);
        }
        path.split('.')
            .try_fold(&self.root, |node, key| node.as_object()?.get(key))
    }

    /// Merges a store fragment into the store.
    pub fn merge(&mut self, fragment: Value) {
        deep_merge(&mut self.root, fragment);
    }

    /// Merges `value` at the location named by `keys`, creating empty maps on
    /// the way. Nothing is written beneath a stored `null`.
    pub fn merge_at<S: AsRef<str>>(&mut self, keys: &[S], value: Value) {
        let Some((last, parents)) = keys.split_last() else {
            deep_merge(&mut self.root, value);
            return;
        };
        let mut node = &mut self.root;
        for key in parents {
            let child = object_mut(node)
                .entry(key.as_ref().to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if child.is_null() {
                return;
            }
            node = child;
        }
        let map = object_mut(node);
        match map.get_mut(last.as_ref()) {
            Some(slot) => deep_merge(slot, value),
            None => {
                map.insert(last.as_ref().to_owned(), value);
            }
        }
    }

    /// Records the complete member-id set of the collection at `keys`.
    pub fn set_known_keys<S: AsRef<str>>(&mut self, keys: &[S], ids: &[String]) {
        let mut entry = Map::new();
        entry.insert(
            KNOWN_KEYS.to_owned(),
            Value::Array(ids.iter().cloned().map(Value::String).collect()),
        );
        self.merge_at(keys, Value::Object(entry));
    }
}

/// Locks a shared store, recovering the data if another task panicked while
/// holding the lock.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("replaced by an object above"),
    }
}

/// Recursive merge. Objects merge key by key and anything else, `null`
/// included, replaces the stored value. An object never lands on a stored
/// `null`.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Null, Value::Object(_)) => {}
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// String form of an id found in a result: strings and numbers directly,
/// objects through their `id` field.
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        Value::Object(fields) => fields.get("id").and_then(id_key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merging_twice_equals_merging_once() {
        let fragment = json!({
            "topics": { "1": { "name": "a", "entries": { "__keys": ["3"] } } },
            "users": { "7": null },
        });
        let mut once = Store::new();
        once.merge(fragment.clone());
        let mut twice = once.clone();
        twice.merge(fragment);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_is_additive() {
        let mut store = Store::from_value(json!({ "users": { "1": { "name": "Bob" } } }));
        store.merge(json!({ "users": { "1": { "avatar": { "url": "x" } }, "2": {} } }));
        assert_eq!(
            store.as_value(),
            &json!({ "users": { "1": { "name": "Bob", "avatar": { "url": "x" } }, "2": {} } })
        );
    }

    #[test]
    fn null_replaces_a_partial_entity() {
        let mut store = Store::from_value(json!({ "users": { "9": { "friend": null } } }));
        store.merge(json!({ "users": { "9": null } }));
        assert_eq!(store.get("users.9"), Some(&Value::Null));
    }

    #[test]
    fn nothing_is_written_beneath_null() {
        let mut store = Store::new();
        store.merge_at(&["topics", "4"], Value::Null);
        store.merge_at(&["topics", "4", "creator"], json!(7));
        store.set_known_keys(&["topics", "4", "entries"], &[]);
        assert_eq!(store.as_value(), &json!({ "topics": { "4": null } }));
    }

    #[test]
    fn fragments_never_fill_in_a_stored_null() {
        let mut store = Store::from_value(json!({ "users": { "9": null } }));
        store.merge(json!({ "users": { "9": { "friend": null }, "8": { "name": "Bob" } } }));
        assert_eq!(store.get("users.9"), Some(&Value::Null));
        assert_eq!(store.get("users.8.name"), Some(&json!("Bob")));
    }

    #[test]
    fn null_is_stored_when_nothing_was_known() {
        let mut store = Store::new();
        store.merge_at(&["entries", "1", "author"], Value::Null);
        assert_eq!(store.get("entries.1.author"), Some(&Value::Null));
    }

    #[test]
    fn known_keys_live_on_the_collection_node() {
        let mut store = Store::new();
        store.set_known_keys(&["topics", "1", "entries"], &["12".into(), "14".into()]);
        assert_eq!(
            store.get("topics.1.entries.__keys"),
            Some(&json!(["12", "14"]))
        );
    }

    #[test]
    fn ids_are_read_from_scalars_and_objects() {
        assert_eq!(id_key(&json!(12)), Some("12".into()));
        assert_eq!(id_key(&json!("ab")), Some("ab".into()));
        assert_eq!(id_key(&json!({ "id": 5, "name": "x" })), Some("5".into()));
        assert_eq!(id_key(&Value::Null), None);
    }
}
