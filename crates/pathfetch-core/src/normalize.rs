//! # Path Normalization
//!
//! Turns the raw list of paths a tracker pass reported into the list worth
//! sending to a data source.

use crate::error::SchemaError;
use crate::path;
use crate::schema::{NodeKind, Schema};

/// Normalizes touched paths, keeping first-seen order.
///
/// - primitive paths are replaced by their containing object
/// - duplicates collapse
/// - collection paths are dropped
///
/// Fetching an object only fetches its own primitive fields, so a path that
/// extends an object or reference path across a field boundary is never
/// covered by it and both are kept. The only prefixes that are implied by a
/// longer path are collections (`topics` by `topics.5`), and a collection
/// path on its own is not addressable.
///
/// ```rust
/// use pathfetch_core::{filter_refs, Schema};
/// use serde_json::json;
///
/// let schema = Schema::from_json(&json!({
///     "users": [{ "name": "", "avatar": { "url": "" } }],
/// }))
/// .unwrap();
/// let paths = ["users", "users.1.name", "users.1", "users.1.avatar.url"];
/// assert_eq!(
///     filter_refs(&schema, paths).unwrap(),
///     vec!["users.1", "users.1.avatar"]
/// );
/// ```
pub fn filter_refs<I, S>(schema: &Schema, paths: I) -> Result<Vec<String>, SchemaError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut refs: Vec<String> = Vec::new();
    for raw in paths {
        let raw = raw.as_ref();
        let fetchable = match schema.type_of_path(raw)? {
            NodeKind::Primitive => path::parent(raw),
            NodeKind::Collection => continue,
            NodeKind::Object | NodeKind::Reference => raw,
        };
        if fetchable.is_empty() || refs.iter().any(|seen| seen == fetchable) {
            continue;
        }
        refs.push(fetchable.to_owned());
    }
    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_json(&json!({
            "topics": [{
                "name": "",
                "entries": [{ "$ref": "entries" }],
                "openingEntry": { "$ref": "entries" },
            }],
            "entries": [{ "text": "", "author": { "$ref": "users" } }],
            "users": [{ "name": "", "tags": ["a", "b"] }],
            "title": "",
        }))
        .unwrap()
    }

    #[test]
    fn primitive_paths_collapse_into_their_object() {
        let refs = filter_refs(
            &schema(),
            ["topics.1.name", "users.7.name", "users.7.tags", "topics.1"],
        )
        .unwrap();
        assert_eq!(refs, vec!["topics.1", "users.7"]);
    }

    #[test]
    fn objects_and_their_sub_paths_are_both_kept() {
        let refs = filter_refs(
            &schema(),
            [
                "topics.1",
                "topics.1.entries.*",
                "topics.1.openingEntry",
                "topics.1.openingEntry.author.name",
            ],
        )
        .unwrap();
        assert_eq!(
            refs,
            vec![
                "topics.1",
                "topics.1.entries.*",
                "topics.1.openingEntry",
                "topics.1.openingEntry.author",
            ]
        );
    }

    #[test]
    fn collection_paths_are_never_sent() {
        let refs = filter_refs(&schema(), ["topics", "topics.1.entries", "topics.*"]).unwrap();
        assert_eq!(refs, vec!["topics.*"]);
    }

    #[test]
    fn top_level_primitives_are_dropped() {
        assert!(filter_refs(&schema(), ["title"]).unwrap().is_empty());
    }

    #[test]
    fn invalid_paths_are_errors() {
        assert!(matches!(
            filter_refs(&schema(), ["topics.1.nope"]),
            Err(SchemaError::InvalidPath(_))
        ));
    }
}
