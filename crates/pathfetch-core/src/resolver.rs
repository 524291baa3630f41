//! # Resolver
//!
//! [`fetch_ref`] turns one path into the chain of resource calls that answers
//! it and writes every result into a [`SharedStore`].
//!
//! The path is walked left to right while tracking the resource template so
//! far, one id list per collection crossed, and the store locations those ids
//! fan out to. Three things end a walk:
//!
//! - a wildcard after a collection: discover the member ids, record them as
//!   the collection's known keys, and continue with the ids in place of `*`
//! - a reference: fetch the foreign ids for every location at once, store
//!   them, and continue in the referenced collection (nulls end the chain)
//! - an object at the end of the path: fetch it for every location
//!
//! "Continue" does not recurse. Each walk returns the paths still to resolve,
//! and [`fetch_ref`] resolves them round by round, concurrently, so that the
//! calls of one round meet in the same batch.

use crate::error::{FetchError, SchemaError, ShapeMismatchError};
use crate::handler::ResourceArgs;
use crate::path::{self, WILDCARD};
use crate::registry::SLOT;
use crate::schema::{NodeKind, Schema, SchemaNode};
use crate::store::{id_key, lock, SharedStore};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// The single point of contact with resource handlers.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn get_resource(&self, resource: &str, args: ResourceArgs) -> Result<Value, FetchError>;
}

#[async_trait]
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for Arc<T> {
    async fn get_resource(&self, resource: &str, args: ResourceArgs) -> Result<Value, FetchError> {
        (**self).get_resource(resource, args).await
    }
}

/// Resolves `path` into `store`.
///
/// Collection paths (append `.*` or an id list) and primitive paths (request
/// the containing object) are rejected before any call is made.
#[instrument(skip(schema, fetcher, store))]
pub async fn fetch_ref<F>(
    schema: &Schema,
    path: &str,
    fetcher: &F,
    store: &SharedStore,
) -> Result<(), FetchError>
where
    F: ResourceFetcher + ?Sized,
{
    match schema.type_of_path(path)? {
        NodeKind::Collection => {
            return Err(FetchError::AmbiguousCollection {
                path: path.to_owned(),
            })
        }
        NodeKind::Primitive => {
            return Err(FetchError::PrimitivePath {
                path: path.to_owned(),
                parent: path::parent(path).to_owned(),
            })
        }
        NodeKind::Object | NodeKind::Reference => {}
    }

    let resolver = Resolver {
        schema,
        fetcher,
        store,
    };
    let mut pending = vec![path.to_owned()];
    let mut round = 0;
    while !pending.is_empty() {
        round += 1;
        debug!(round, paths = ?pending, "Resolving");
        let steps = join_all(pending.iter().map(|p| resolver.step(p))).await;
        let mut next: Vec<String> = Vec::new();
        for step in steps {
            for p in step? {
                if !next.contains(&p) {
                    next.push(p);
                }
            }
        }
        pending = next;
    }
    Ok(())
}

struct Resolver<'a, F: ?Sized> {
    schema: &'a Schema,
    fetcher: &'a F,
    store: &'a SharedStore,
}

impl<F: ResourceFetcher + ?Sized> Resolver<'_, F> {
    /// Walks one path and returns the paths it continues into.
    async fn step(&self, path: &str) -> Result<Vec<String>, FetchError> {
        let segments = path::segments(path);
        let mut node = self.schema.root();
        let mut resource: Vec<String> = Vec::new();
        let mut ids: Vec<Vec<String>> = Vec::new();
        let mut locations: Vec<Vec<String>> = vec![Vec::new()];

        for (index, &key) in segments.iter().enumerate() {
            let parent = node;
            node = self
                .schema
                .descend(parent, key)?
                .ok_or_else(|| SchemaError::InvalidPath(path.to_owned()))?;
            let rest = &segments[index + 1..];
            let in_collection = parent.kind() == NodeKind::Collection;

            if in_collection && key == WILDCARD {
                return self.discover(node, &resource, ids, &locations, rest).await;
            }
            if let (true, SchemaNode::Reference(target)) = (in_collection, node) {
                // Members of a reference collection are keyed by the referenced ids.
                let next = continue_path(target, key, rest);
                debug!(%path, %next, "Following collection member");
                return Ok(vec![next]);
            }

            let keys = if in_collection {
                resource.push(SLOT.to_owned());
                let list = path::split_ids(key);
                ids.push(list.clone());
                list
            } else {
                resource.push(key.to_owned());
                vec![key.to_owned()]
            };

            match node {
                SchemaNode::Reference(target) => {
                    return self.follow(target, &resource, ids, &locations, &keys, rest).await;
                }
                SchemaNode::Object(_) if rest.is_empty() => {
                    self.fetch_objects(&resource, ids, &locations, &keys, in_collection)
                        .await?;
                    return Ok(Vec::new());
                }
                _ if rest.is_empty() => {
                    return Err(FetchError::UnexpectedTerminal {
                        path: path.to_owned(),
                        kind: node.kind(),
                    });
                }
                _ => locations = cross(&locations, &keys),
            }
        }
        Ok(Vec::new())
    }

    /// Calls a resource and flattens its nested result, one slot per
    /// combination of requested ids. `None` marks a slot whose parent entity
    /// came back `null`.
    async fn call(
        &self,
        resource: &[String],
        args: ResourceArgs,
        own_ids: bool,
    ) -> Result<Vec<Option<Value>>, FetchError> {
        let template = path::join(resource);
        let lens = args.lens();
        debug!(resource = %template, %args, "Requesting resource");
        let result = self.fetcher.get_resource(&template, args).await?;
        Ok(flatten(&template, &result, &lens, own_ids)?)
    }

    async fn discover(
        &self,
        member: &SchemaNode,
        resource: &[String],
        ids: Vec<Vec<String>>,
        locations: &[Vec<String>],
        rest: &[&str],
    ) -> Result<Vec<String>, FetchError> {
        let args = ResourceArgs::ids(ids).with_criteria(Map::new());
        let values = self.call(resource, args, false).await?;
        expect_count(resource, values.len(), locations.len())?;

        let discovered = values
            .iter()
            .map(|value| value.as_ref().map(|v| member_ids(resource, v)).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        {
            let mut store = lock(self.store);
            for (location, keys) in locations.iter().zip(&discovered) {
                if let Some(keys) = keys {
                    store.set_known_keys(location, keys);
                }
            }
        }
        let discovered: Vec<Vec<String>> = discovered
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();

        if let SchemaNode::Reference(target) = member {
            let mut union: Vec<String> = Vec::new();
            for id in discovered.into_iter().flatten() {
                if !union.contains(&id) {
                    union.push(id);
                }
            }
            if union.is_empty() {
                return Ok(Vec::new());
            }
            return Ok(vec![continue_path(target, &path::join_ids(&union), rest)]);
        }

        Ok(locations
            .iter()
            .zip(&discovered)
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(location, keys)| {
                continue_path(&path::join(location), &path::join_ids(keys), rest)
            })
            .collect())
    }

    async fn follow(
        &self,
        target: &str,
        resource: &[String],
        ids: Vec<Vec<String>>,
        locations: &[Vec<String>],
        keys: &[String],
        rest: &[&str],
    ) -> Result<Vec<String>, FetchError> {
        let values = self.call(resource, ResourceArgs::ids(ids), false).await?;
        let slots = cross(locations, keys);
        expect_count(resource, values.len(), slots.len())?;

        let mut referenced: Vec<String> = Vec::new();
        {
            let mut store = lock(self.store);
            for (slot, value) in slots.iter().zip(values) {
                let Some(value) = value else { continue };
                if let Some(id) = id_key(&value) {
                    if !referenced.contains(&id) {
                        referenced.push(id);
                    }
                }
                store.merge_at(slot, value);
            }
        }

        if referenced.is_empty() {
            debug!(resource = %path::join(resource), "Every reference is null");
            return Ok(Vec::new());
        }
        Ok(vec![continue_path(target, &path::join_ids(&referenced), rest)])
    }

    async fn fetch_objects(
        &self,
        resource: &[String],
        ids: Vec<Vec<String>>,
        locations: &[Vec<String>],
        keys: &[String],
        check_ids: bool,
    ) -> Result<(), FetchError> {
        let values = self.call(resource, ResourceArgs::ids(ids), check_ids).await?;
        let slots = cross(locations, keys);
        expect_count(resource, values.len(), slots.len())?;

        if check_ids {
            for (slot, value) in slots.iter().zip(&values) {
                let Some(value) = value else { continue };
                let requested = slot.last().map(String::as_str);
                if let Some(id) = value.get("id") {
                    if id_key(id).as_deref() != requested {
                        return Err(ShapeMismatchError::new(
                            path::join(resource),
                            format!("got id {id} for requested id {:?}", requested.unwrap_or_default()),
                        )
                        .into());
                    }
                }
            }
        }

        let mut store = lock(self.store);
        for (slot, value) in slots.iter().zip(values) {
            if let Some(value) = value {
                store.merge_at(slot, value);
            }
        }
        Ok(())
    }
}

/// Every location extended by every key.
fn cross(locations: &[Vec<String>], keys: &[String]) -> Vec<Vec<String>> {
    locations
        .iter()
        .flat_map(|location| {
            keys.iter().map(move |key| {
                let mut slot = location.clone();
                slot.push(key.clone());
                slot
            })
        })
        .collect()
}

fn continue_path(head: &str, key: &str, rest: &[&str]) -> String {
    let mut parts = vec![head, key];
    parts.extend_from_slice(rest);
    parts.join(".")
}

fn expect_count(resource: &[String], found: usize, expected: usize) -> Result<(), ShapeMismatchError> {
    if found == expected {
        Ok(())
    } else {
        Err(ShapeMismatchError::new(
            path::join(resource),
            format!("expected {expected} results, got {found}"),
        ))
    }
}

/// Flattens `lens.len()` levels of nesting.
///
/// A `null` in place of a list means none of the entities at that level
/// exist, so every slot below it is `None`. When `own_ids` is set the last
/// level lists the slots' own ids, and a `null` there is stored as the
/// confirmed absence of each of them.
fn flatten(
    resource: &str,
    value: &Value,
    lens: &[usize],
    own_ids: bool,
) -> Result<Vec<Option<Value>>, ShapeMismatchError> {
    let Some((&len, inner)) = lens.split_first() else {
        return Ok(vec![Some(value.clone())]);
    };
    match value {
        Value::Null if own_ids && inner.is_empty() => Ok(vec![Some(Value::Null); len]),
        Value::Null => Ok(vec![None; len * inner.iter().product::<usize>()]),
        Value::Array(items) if items.len() == len => {
            let mut flat = Vec::new();
            for item in items {
                flat.extend(flatten(resource, item, inner, own_ids)?);
            }
            Ok(flat)
        }
        other => Err(ShapeMismatchError::new(
            resource,
            format!("expected a list of {len} results, got: {other}"),
        )),
    }
}

/// Member ids listed by a collection resource.
fn member_ids(resource: &[String], value: &Value) -> Result<Vec<String>, ShapeMismatchError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.iter().filter_map(id_key).collect()),
        other => Err(ShapeMismatchError::new(
            path::join(resource),
            format!("list of ids expected, got: {other}"),
        )),
    }
}
