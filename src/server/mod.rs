//! # Server
//!
//! The server owns the handlers. It validates them against the schema, wraps
//! each one in a per-resource batcher, and resolves client paths through
//! [`fetch_ref`] into a fresh store per request.
//!
//! ```rust
//! use pathfetch::Server;
//! use pathfetch_core::{handler_fn, HandlerError, Handlers, ResourceArgs, Schema};
//! use serde_json::{json, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let schema = Schema::from_json(&json!({ "users": [{ "name": "" }] })).unwrap();
//!     let handlers = Handlers::new()
//!         .register(
//!             "users",
//!             handler_fn(1, |_| async { Ok::<_, HandlerError>(json!(["1"])) }),
//!         )
//!         .register(
//!             "users.{}",
//!             handler_fn(1, |args: ResourceArgs| async move {
//!                 let users = args.ids[0].iter().map(|id| json!({ "name": id })).collect();
//!                 Ok::<_, HandlerError>(Value::Array(users))
//!             }),
//!         );
//!     let server = Server::new(schema, handlers);
//!     assert!(server.problems().is_empty());
//!
//!     let store = server.handle_query("/?refs=users.7").await.unwrap();
//!     assert_eq!(store, json!({ "users": { "7": { "name": "7" } } }));
//! }
//! ```

mod batching;

use crate::config::ServerConfig;
use crate::transport::decode_refs;
use async_trait::async_trait;
use batching::{resource_batcher, ResourceBatcher};
use futures::future::join_all;
use pathfetch_core::store::lock;
use pathfetch_core::{
    fetch_ref, DataSource, FetchError, Handlers, RegistrationError, ResourceArgs,
    ResourceFetcher, ResourceRegistry, Schema, SharedStore, Store,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct Server {
    schema: Arc<Schema>,
    registry: ResourceRegistry,
    batchers: HashMap<String, ResourceBatcher>,
    config: ServerConfig,
    problems: Vec<RegistrationError>,
}

impl Server {
    pub fn new(schema: impl Into<Arc<Schema>>, handlers: Handlers) -> Self {
        Self::with_config(schema, handlers, ServerConfig::default())
    }

    /// Builds the server. Registration problems are logged and kept in
    /// [`problems`](Self::problems); they never fail construction.
    pub fn with_config(
        schema: impl Into<Arc<Schema>>,
        handlers: Handlers,
        config: ServerConfig,
    ) -> Self {
        let schema = schema.into();
        let registry = ResourceRegistry::derive(&schema);
        let problems = registry.validate_handlers(&handlers);
        for problem in &problems {
            warn!(%problem, "Handler registration problem");
        }

        let batchers: HashMap<String, ResourceBatcher> = registry
            .iter()
            .filter_map(|resource| {
                let handler = handlers.get(&resource.template)?.clone();
                let batcher = resource_batcher(resource.clone(), handler, &config);
                Some((resource.template.clone(), batcher))
            })
            .collect();
        info!(
            resources = registry.len(),
            handlers = batchers.len(),
            problems = problems.len(),
            "Server ready"
        );

        Self {
            schema,
            registry,
            batchers,
            config,
            problems,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Problems found while validating the handlers.
    pub fn problems(&self) -> &[RegistrationError] {
        &self.problems
    }

    /// Calls one resource through its batcher.
    #[instrument(skip(self, args), fields(args = %args))]
    pub async fn fetch_resource(
        &self,
        resource: &str,
        args: ResourceArgs,
    ) -> Result<Value, FetchError> {
        let batcher = self
            .batchers
            .get(resource)
            .ok_or_else(|| FetchError::MissingHandler(resource.to_owned()))?;
        if let Some(declared) = self.registry.get(resource) {
            if declared.arity() != args.arity() {
                return Err(FetchError::ArgumentMismatch {
                    resource: resource.to_owned(),
                    expected: declared.arity(),
                    found: args.arity(),
                });
            }
        }
        Ok(batcher.get(args).await?)
    }

    /// Resolves one path into a fresh store and returns it.
    #[instrument(skip(self))]
    pub async fn fetch(&self, path: &str) -> Result<Value, FetchError> {
        self.fetch_paths(&[path]).await
    }

    /// Resolves `paths` concurrently into one fresh store and returns it.
    pub async fn fetch_paths<S: AsRef<str>>(&self, paths: &[S]) -> Result<Value, FetchError> {
        let store: SharedStore = Store::new().shared();
        let results = join_all(
            paths
                .iter()
                .map(|path| fetch_ref(&self.schema, path.as_ref(), self, &store)),
        )
        .await;
        results.into_iter().collect::<Result<Vec<()>, _>>()?;
        let snapshot = lock(&store).as_value().clone();
        Ok(snapshot)
    }

    /// Answers a `/?refs=...` query with the resolved store fragment.
    pub async fn handle_query(&self, query: &str) -> Result<Value, FetchError> {
        let paths = decode_refs(query)?;
        self.fetch_paths(&paths).await
    }
}

#[async_trait]
impl ResourceFetcher for Server {
    async fn get_resource(&self, resource: &str, args: ResourceArgs) -> Result<Value, FetchError> {
        self.fetch_resource(resource, args).await
    }
}

#[async_trait]
impl DataSource for Server {
    async fn fetch_paths(&self, paths: &[String]) -> Result<Value, FetchError> {
        Server::fetch_paths(self, paths).await
    }
}
