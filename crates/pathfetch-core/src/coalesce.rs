//! # Argument Coalescing
//!
//! Decides how the queued calls of one resource turn into handler calls.
//!
//! When the resource takes a single id list (`users.{}`, `entries.{}.author`)
//! every queued id list is merged into one deduplicated list and the handler
//! runs once. Each caller then gets its own slice back by looking its ids up
//! in the merged answer.
//!
//! Anything else (criteria, several id lists) runs call by call. Identical
//! argument sets share one call and callers are matched back by equality.

use crate::error::ShapeMismatchError;
use crate::handler::ResourceArgs;
use crate::registry::Resource;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum BatchPlan {
    /// One call with the union of all requested ids.
    Merged { ids: Vec<String> },
    /// One call per distinct argument set.
    Separate { calls: Vec<ResourceArgs> },
}

/// Plans the handler calls for `requests` queued against `resource`.
pub fn batch_args(requests: &[ResourceArgs], resource: &Resource) -> BatchPlan {
    let mergeable = resource.in_collections.len() == 1
        && resource.arity() == 1
        && requests
            .iter()
            .all(|args| args.ids.len() == 1 && args.criteria.is_none());

    if mergeable {
        let mut ids: Vec<String> = Vec::new();
        for id in requests.iter().flat_map(|args| &args.ids[0]) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        return BatchPlan::Merged { ids };
    }

    let mut calls: Vec<ResourceArgs> = Vec::new();
    for args in requests {
        if !calls.contains(args) {
            calls.push(args.clone());
        }
    }
    BatchPlan::Separate { calls }
}

impl BatchPlan {
    pub fn is_merged(&self) -> bool {
        matches!(self, BatchPlan::Merged { .. })
    }

    /// Argument sets to hand to the handler, in order.
    pub fn calls(&self) -> Vec<ResourceArgs> {
        match self {
            BatchPlan::Merged { ids } => vec![ResourceArgs::ids(vec![ids.clone()])],
            BatchPlan::Separate { calls } => calls.clone(),
        }
    }

    /// Index of the call whose result answers `args`.
    pub fn call_index(&self, args: &ResourceArgs) -> Option<usize> {
        match self {
            BatchPlan::Merged { .. } => Some(0),
            BatchPlan::Separate { calls } => calls.iter().position(|call| call == args),
        }
    }

    /// Rebuilds one caller's result from the result of its call.
    pub fn extract(
        &self,
        resource: &str,
        call_result: &Value,
        args: &ResourceArgs,
    ) -> Result<Value, ShapeMismatchError> {
        let BatchPlan::Merged { ids } = self else {
            return Ok(call_result.clone());
        };
        let requested = args.ids.first().map(Vec::as_slice).unwrap_or_default();
        let items = match call_result {
            Value::Null => return Ok(Value::Array(vec![Value::Null; requested.len()])),
            Value::Array(items) if items.len() == ids.len() => items,
            other => {
                return Err(ShapeMismatchError::new(
                    resource,
                    format!("expected a list of {} results, got: {other}", ids.len()),
                ))
            }
        };
        let positions: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), index))
            .collect();
        requested
            .iter()
            .map(|id| {
                positions
                    .get(id.as_str())
                    .map(|&index| items[index].clone())
                    .ok_or_else(|| {
                        ShapeMismatchError::new(resource, format!("id {id:?} was not requested"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}
