//! # Resource Handlers
//!
//! A handler answers one resource template (`users.{}`, `topics.{}.entries`,
//! ...). It receives one id list per collection crossed by the template, plus
//! a trailing criteria object for collection-level resources, and returns a
//! value nested one list level per id list.
//!
//! ```rust
//! use pathfetch_core::{handler_fn, Handlers, ResourceArgs};
//! use serde_json::{json, Value};
//!
//! let handlers = Handlers::new().register(
//!     "users.{}",
//!     handler_fn(1, |args: ResourceArgs| async move {
//!         let users = args.ids[0]
//!             .iter()
//!             .map(|id| json!({ "id": id, "name": format!("User {id}") }))
//!             .collect();
//!         Ok(Value::Array(users))
//!     }),
//! );
//! assert!(handlers.get("users.{}").is_some());
//! ```

use crate::error::HandlerError;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Arguments of one resource call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceArgs {
    /// One id list per collection crossed, outermost first.
    pub ids: Vec<Vec<String>>,
    /// Present only for collection-level resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Map<String, Value>>,
}

impl ResourceArgs {
    pub fn ids(ids: Vec<Vec<String>>) -> Self {
        Self {
            ids,
            criteria: None,
        }
    }

    /// A single id list, the common case for member resources.
    pub fn single<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ids(vec![ids.into_iter().map(Into::into).collect()])
    }

    pub fn with_criteria(mut self, criteria: Map<String, Value>) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn arity(&self) -> usize {
        self.ids.len() + usize::from(self.criteria.is_some())
    }

    /// Lengths of the id lists, used to check result nesting.
    pub fn lens(&self) -> Vec<usize> {
        self.ids.iter().map(Vec::len).collect()
    }
}

impl fmt::Display for ResourceArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .ids
            .iter()
            .map(|list| format!("[{}]", list.join(",")))
            .collect();
        if let Some(criteria) = &self.criteria {
            parts.push(Value::Object(criteria.clone()).to_string());
        }
        write!(f, "({})", parts.join(", "))
    }
}

/// A function serving one resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Number of arguments the handler accepts.
    fn arity(&self) -> usize;

    async fn fetch(&self, args: ResourceArgs) -> Result<Value, HandlerError>;
}

/// Handler backed by an async closure. Built with [`handler_fn`].
pub struct FnHandler<F> {
    arity: usize,
    f: F,
}

pub fn handler_fn<F, Fut>(arity: usize, f: F) -> FnHandler<F>
where
    F: Fn(ResourceArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    FnHandler { arity, f }
}

#[async_trait]
impl<F, Fut> ResourceHandler for FnHandler<F>
where
    F: Fn(ResourceArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    fn arity(&self) -> usize {
        self.arity
    }

    async fn fetch(&self, args: ResourceArgs) -> Result<Value, HandlerError> {
        (self.f)(args).await
    }
}

/// Handlers keyed by resource template, in registration order.
#[derive(Clone, Default)]
pub struct Handlers {
    handlers: IndexMap<String, Arc<dyn ResourceHandler>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        resource: impl Into<String>,
        handler: impl ResourceHandler + 'static,
    ) -> Self {
        self.handlers.insert(resource.into(), Arc::new(handler));
        self
    }

    pub fn insert(&mut self, resource: impl Into<String>, handler: Arc<dyn ResourceHandler>) {
        self.handlers.insert(resource.into(), handler);
    }

    pub fn get(&self, resource: &str) -> Option<&Arc<dyn ResourceHandler>> {
        self.handlers.get(resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn ResourceHandler>)> {
        self.handlers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arity_counts_criteria() {
        let args = ResourceArgs::single(["1"]);
        assert_eq!(args.arity(), 1);
        assert_eq!(args.with_criteria(Map::new()).arity(), 2);
    }

    #[test]
    fn display_lists_ids_and_criteria() {
        let args = ResourceArgs::ids(vec![vec!["1".into(), "2".into()], vec!["9".into()]])
            .with_criteria(Map::new());
        assert_eq!(args.to_string(), "([1,2], [9], {})");
    }

    #[tokio::test]
    async fn closures_serve_as_handlers() {
        let handler = handler_fn(1, |args: ResourceArgs| async move {
            Ok(json!(args.ids[0].len()))
        });
        assert_eq!(handler.arity(), 1);
        let result = handler.fetch(ResourceArgs::single(["a", "b"])).await.unwrap();
        assert_eq!(result, json!(2));
    }
}
