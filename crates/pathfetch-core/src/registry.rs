//! # Resource Registry
//!
//! Every addressable piece of the schema becomes a [`Resource`], keyed by a
//! path template where each collection crossing is a `{}` slot:
//!
//! | Template | Kind | Arguments |
//! |----------|------|-----------|
//! | `topics` | collection | `criteria` |
//! | `topics.{}` | object | `topicsIds` |
//! | `topics.{}.entries` | collection | `topicsIds`, `criteria` |
//! | `topics.{}.openingEntry` | reference | `topicsIds` |
//!
//! References end the traversal: the object behind a reference is fetched
//! through its own collection's resource.
//!
//! The registry also checks handlers ([`ResourceRegistry::validate_handlers`])
//! and handler results ([`validate_result`]) against these shapes.

use crate::error::{RegistrationError, ShapeMismatchError};
use crate::handler::{Handlers, ResourceArgs};
use crate::schema::{NodeKind, Schema, SchemaNode};
use crate::store::id_key;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Placeholder for a collection item in a resource template.
pub const SLOT: &str = "{}";

/// One level of a resource's return shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnShape {
    List,
    Object,
    Integer,
}

impl fmt::Display for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnShape::List => "list",
            ReturnShape::Object => "object",
            ReturnShape::Integer => "integer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub template: String,
    pub kind: NodeKind,
    /// Enclosing collections, outermost first. One id list argument each.
    pub in_collections: Vec<String>,
    /// Human-readable argument descriptions.
    pub args: Vec<String>,
    pub return_type: Vec<ReturnShape>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_of: Option<NodeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_to: Option<String>,
    /// Declared primitive fields of an object resource.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub primitive_fields: Vec<String>,
}

impl Resource {
    fn new(template: &[String], kind: NodeKind, in_collections: &[String]) -> Self {
        let mut args: Vec<String> = in_collections
            .iter()
            .map(|name| format!("{name}Ids (a list of ids)"))
            .collect();
        let mut return_type = vec![ReturnShape::List; in_collections.len()];
        match kind {
            NodeKind::Collection => {
                args.push("criteria (object)".to_owned());
                return_type.extend([ReturnShape::List, ReturnShape::Integer]);
            }
            NodeKind::Reference => return_type.push(ReturnShape::Integer),
            _ => return_type.push(ReturnShape::Object),
        }
        Self {
            template: template.join("."),
            kind,
            in_collections: in_collections.to_vec(),
            args,
            return_type,
            collection_of: None,
            reference_to: None,
            primitive_fields: Vec::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Describes what a handler for this resource must look like.
    pub fn expected_signature(&self) -> String {
        let mut types = vec!["Future".to_owned()];
        types.extend(self.return_type.iter().map(ToString::to_string));
        let arguments = if self.args.is_empty() {
            "no arguments".to_owned()
        } else {
            format!("arguments: {}", self.args.join(", "))
        };
        format!(
            "It should accept {arguments} and return a {}",
            format_nested_type(&types)
        )
    }
}

/// Renders `["Future", "list", "object"]` as `Future of lists of objects`.
pub fn format_nested_type<S: AsRef<str>>(types: &[S]) -> String {
    let Some((innermost, outer)) = types.split_last() else {
        return String::new();
    };
    outer
        .iter()
        .rev()
        .fold(innermost.as_ref().to_owned(), |inner, wrapper| {
            format!("{} of {}", wrapper.as_ref(), pluralize(&inner))
        })
}

/// Pluralizes the first word: `list of objects` becomes `lists of objects`.
fn pluralize(phrase: &str) -> String {
    match phrase.find(' ') {
        Some(index) => format!("{}s{}", &phrase[..index], &phrase[index..]),
        None => format!("{phrase}s"),
    }
}

/// All resources of a schema, in schema declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceRegistry {
    resources: IndexMap<String, Resource>,
}

impl ResourceRegistry {
    pub fn derive(schema: &Schema) -> Self {
        let mut registry = Self::default();
        if let SchemaNode::Object(fields) = schema.root() {
            for (name, field) in fields {
                registry.visit(field, vec![name.clone()], Vec::new());
            }
        }
        registry
    }

    fn visit(&mut self, node: &SchemaNode, template: Vec<String>, in_collections: Vec<String>) {
        match node {
            SchemaNode::Primitive(_) => {}
            SchemaNode::Reference(target) => {
                let mut resource = Resource::new(&template, NodeKind::Reference, &in_collections);
                resource.reference_to = Some(target.clone());
                self.insert(resource);
            }
            SchemaNode::Object(fields) => {
                let mut resource = Resource::new(&template, NodeKind::Object, &in_collections);
                resource.primitive_fields = fields
                    .iter()
                    .filter(|(_, field)| field.kind() == NodeKind::Primitive)
                    .map(|(name, _)| name.clone())
                    .collect();
                self.insert(resource);
                for (name, field) in fields {
                    let mut child = template.clone();
                    child.push(name.clone());
                    self.visit(field, child, in_collections.clone());
                }
            }
            SchemaNode::Collection(item) => {
                let mut resource =
                    Resource::new(&template, NodeKind::Collection, &in_collections);
                resource.collection_of = Some(item.kind());
                self.insert(resource);
                if item.kind() != NodeKind::Reference {
                    let name = template
                        .iter()
                        .rev()
                        .find(|segment| *segment != SLOT)
                        .cloned()
                        .unwrap_or_default();
                    let mut enclosing = in_collections;
                    enclosing.push(name);
                    let mut member = template;
                    member.push(SLOT.to_owned());
                    self.visit(item, member, enclosing);
                }
            }
        }
    }

    fn insert(&mut self, resource: Resource) {
        self.resources.insert(resource.template.clone(), resource);
    }

    pub fn get(&self, template: &str) -> Option<&Resource> {
        self.resources.get(template)
    }

    pub fn contains(&self, template: &str) -> bool {
        self.resources.contains_key(template)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Lists missing, unexpected and wrongly-shaped handlers.
    pub fn validate_handlers(&self, handlers: &Handlers) -> Vec<RegistrationError> {
        let mut problems: Vec<RegistrationError> = self
            .iter()
            .filter_map(|resource| match handlers.get(&resource.template) {
                None => Some(RegistrationError::Missing {
                    resource: resource.template.clone(),
                    expected: resource.expected_signature(),
                }),
                Some(handler) if handler.arity() != resource.arity() => {
                    Some(RegistrationError::Arity {
                        resource: resource.template.clone(),
                        expected: resource.expected_signature(),
                        found: handler.arity(),
                    })
                }
                Some(_) => None,
            })
            .collect();
        problems.extend(
            handlers
                .iter()
                .filter(|(name, _)| !self.contains(name))
                .map(|(name, _)| RegistrationError::Unexpected {
                    resource: name.to_owned(),
                }),
        );
        problems
    }
}

/// Checks a handler result against the resource's declared shape.
///
/// `null` is accepted at every level and means "nothing for this id".
pub fn validate_result(
    resource: &Resource,
    args: &ResourceArgs,
    result: &Value,
) -> Vec<ShapeMismatchError> {
    let mut problems = Vec::new();
    check_level(resource, &args.ids, 0, result, None, &mut problems);
    problems
}

fn check_level(
    resource: &Resource,
    ids: &[Vec<String>],
    depth: usize,
    value: &Value,
    requested_id: Option<&str>,
    problems: &mut Vec<ShapeMismatchError>,
) {
    let Some(level_ids) = ids.get(depth) else {
        check_leaf(resource, value, requested_id, problems);
        return;
    };
    match value {
        Value::Null => {}
        Value::Array(items) => {
            if items.len() != level_ids.len() {
                problems.push(ShapeMismatchError::new(
                    &resource.template,
                    format!(
                        "expected {} results at nesting level {depth}, got {}",
                        level_ids.len(),
                        items.len()
                    ),
                ));
            }
            for (item, id) in items.iter().zip(level_ids) {
                check_level(resource, ids, depth + 1, item, Some(id), problems);
            }
        }
        other => {
            let expected: Vec<String> = resource
                .return_type
                .get(depth..)
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect();
            problems.push(ShapeMismatchError::new(
                &resource.template,
                format!("{} expected, got: {other}", format_nested_type(&expected)),
            ));
        }
    }
}

fn check_leaf(
    resource: &Resource,
    value: &Value,
    requested_id: Option<&str>,
    problems: &mut Vec<ShapeMismatchError>,
) {
    let mut problem = |message: String| {
        problems.push(ShapeMismatchError::new(&resource.template, message));
    };
    match (resource.kind, value) {
        (_, Value::Null) => {}
        (NodeKind::Reference, Value::String(_) | Value::Number(_)) => {}
        (NodeKind::Reference, other) => problem(format!("reference (id) expected, got: {other}")),
        (NodeKind::Collection, Value::Array(_)) => {}
        (NodeKind::Collection, other) => problem(format!("list (array) expected, got: {other}")),
        (NodeKind::Object, Value::Object(fields)) => {
            for name in &resource.primitive_fields {
                if name != "id" && !fields.contains_key(name) {
                    problem(format!("missing field {name:?}"));
                }
            }
            for name in fields.keys() {
                if name != "id" && !resource.primitive_fields.contains(name) {
                    problem(format!("unexpected field {name:?}"));
                }
            }
            if let (Some(id), Some(requested)) = (fields.get("id"), requested_id) {
                if id_key(id).as_deref() != Some(requested) {
                    problem(format!("id {id} does not match requested id {requested:?}"));
                }
            }
        }
        (NodeKind::Object, other) => problem(format!("object expected, got: {other}")),
        (NodeKind::Primitive, _) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_json(&json!({
            "topics": [{
                "id": 1,
                "name": "Example topic",
                "entries": [{ "$ref": "entries" }],
                "openingEntry": { "$ref": "entries" },
            }],
            "entries": [{ "id": 1, "text": "Hello", "author": { "$ref": "users" } }],
            "users": [{ "id": 1, "name": "Bob", "avatar": { "url": "a.png" } }],
        }))
        .unwrap()
    }

    fn noop(arity: usize) -> impl crate::handler::ResourceHandler {
        handler_fn(arity, |_| async { Ok(Value::Null) })
    }

    #[test]
    fn derives_every_addressable_resource() {
        let registry = ResourceRegistry::derive(&schema());
        let templates: Vec<&str> = registry.iter().map(|r| r.template.as_str()).collect();
        assert_eq!(
            templates,
            vec![
                "topics",
                "topics.{}",
                "topics.{}.entries",
                "topics.{}.openingEntry",
                "entries",
                "entries.{}",
                "entries.{}.author",
                "users",
                "users.{}",
                "users.{}.avatar",
            ]
        );
    }

    #[test]
    fn annotates_arguments_and_return_shapes() {
        let registry = ResourceRegistry::derive(&schema());

        let entries = registry.get("topics.{}.entries").unwrap();
        assert_eq!(entries.in_collections, vec!["topics"]);
        assert_eq!(
            entries.args,
            vec!["topicsIds (a list of ids)", "criteria (object)"]
        );
        assert_eq!(entries.collection_of, Some(NodeKind::Reference));
        assert_eq!(
            entries.expected_signature(),
            "It should accept arguments: topicsIds (a list of ids), criteria (object) \
             and return a Future of lists of lists of integers"
        );

        let author = registry.get("entries.{}.author").unwrap();
        assert_eq!(author.reference_to.as_deref(), Some("users"));
        assert_eq!(author.arity(), 1);

        let user = registry.get("users.{}").unwrap();
        assert_eq!(user.primitive_fields, vec!["id", "name"]);
        assert_eq!(user.return_type, vec![ReturnShape::List, ReturnShape::Object]);
    }

    #[test]
    fn formats_nested_types() {
        assert_eq!(format_nested_type(&["object"]), "object");
        assert_eq!(
            format_nested_type(&["Future", "list", "object"]),
            "Future of lists of objects"
        );
    }

    #[test]
    fn reports_missing_wrong_and_unexpected_handlers() {
        let registry = ResourceRegistry::derive(&schema());
        let handlers = Handlers::new()
            .register("users.{}", noop(1))
            .register("entries.{}.author", noop(2))
            .register("comments.{}", noop(1));

        let problems = registry.validate_handlers(&handlers);
        let missing = problems
            .iter()
            .filter(|p| matches!(p, RegistrationError::Missing { .. }))
            .count();
        assert_eq!(missing, registry.len() - 2);
        assert!(problems.contains(&RegistrationError::Arity {
            resource: "entries.{}.author".into(),
            expected: registry.get("entries.{}.author").unwrap().expected_signature(),
            found: 2,
        }));
        assert_eq!(
            problems.last().unwrap().to_string(),
            "Unexpected handler for: comments.{}"
        );
    }

    #[test]
    fn accepts_well_formed_results() {
        let registry = ResourceRegistry::derive(&schema());
        let user = registry.get("users.{}").unwrap();
        let args = ResourceArgs::single(["7", "8"]);
        let result = json!([{ "id": 7, "name": "Ann" }, null]);
        assert!(validate_result(user, &args, &result).is_empty());

        let entries = registry.get("topics.{}.entries").unwrap();
        let args = ResourceArgs::single(["1"]).with_criteria(Default::default());
        assert!(validate_result(entries, &args, &json!([[12, 14]])).is_empty());
    }

    #[test]
    fn reports_malformed_results() {
        let registry = ResourceRegistry::derive(&schema());
        let user = registry.get("users.{}").unwrap();
        let args = ResourceArgs::single(["7"]);

        let wrong_count = validate_result(user, &args, &json!([]));
        assert_eq!(wrong_count.len(), 1);

        let wrong_fields = validate_result(user, &args, &json!([{ "id": 8, "avatar": {} }]));
        let problems: Vec<String> = wrong_fields.into_iter().map(|p| p.problem).collect();
        assert_eq!(
            problems,
            vec![
                "missing field \"name\"",
                "unexpected field \"avatar\"",
                "id 8 does not match requested id \"7\"",
            ]
        );

        let reference = registry.get("topics.{}.openingEntry").unwrap();
        assert_eq!(
            validate_result(reference, &args, &json!([{ "id": 1 }])).len(),
            1
        );
        assert_eq!(validate_result(reference, &args, &json!(5)).len(), 1);
    }
}
