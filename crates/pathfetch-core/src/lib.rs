//! # Pathfetch Core
//!
//! This crate is the engine behind graph-shaped data fetching: the client
//! *reads* a schema-shaped view of a partial store, every read of missing data
//! is recorded as a dotted path (`topics.123.openingEntry.author`), and the
//! server expands those paths into batched calls of resource handlers.
//!
//! ## Why paths?
//!
//! - **Declarative**: UI code just reads the data it renders. There is no
//!   separate query to keep in sync with the rendering code.
//! - **Batched**: all paths of one pass resolve together, so ten entries with
//!   ten authors cost one `entries.{}.author` call and one `users.{}` call, not
//!   twenty round trips.
//! - **Schema-checked**: every path, handler and result is checked against one
//!   shared schema.
//!
//! ## Architecture Overview
//!
//! 1. **Model** ([`Schema`], [`ResourceRegistry`]): the shape of the graph and
//!    the resources derived from it
//! 2. **Server side** ([`fetch_ref`], [`Batcher`], [`batch_args`]): paths into
//!    coalesced handler calls into a store
//! 3. **Client side** ([`tracker`], [`filter_refs`], [`FetchLoop`]): reads into
//!    missing paths into fetches, until nothing is missing
//!
//! ```text
//!   callback ──reads──► ObjectView ──misses──► filter_refs ──► DataSource
//!      ▲                                                          │
//!      └──────────────── Store ◄── fetch_ref ◄── Batcher ◄── handlers
//! ```
//!
//! ## Schema
//!
//! ```rust
//! use pathfetch_core::{ResourceRegistry, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::from_json(&json!({
//!     "topics": [{ "name": "Example topic", "openingEntry": { "$ref": "entries" } }],
//!     "entries": [{ "text": "Lorem ipsum" }],
//! }))
//! .unwrap();
//!
//! let registry = ResourceRegistry::derive(&schema);
//! let templates: Vec<_> = registry.iter().map(|r| r.template.as_str()).collect();
//! assert_eq!(
//!     templates,
//!     ["topics", "topics.{}", "topics.{}.openingEntry", "entries", "entries.{}"]
//! );
//! ```
//!
//! ## Concurrency Model
//!
//! - All suspension happens in handler futures and data sources.
//! - Requests issued in one scheduling turn meet in one batch.
//! - The store is shared behind a mutex that is never held across an `.await`.
//!
//! ## Testing
//!
//! The [`mock`] module provides [`MockResources`](mock::MockResources) and
//! [`MockDataSource`](mock::MockDataSource) for testing resolution and fetch
//! loops without a server.

pub mod batcher;
pub mod coalesce;
pub mod error;
pub mod fetch_loop;
pub mod handler;
pub mod message;
pub mod mock;
pub mod normalize;
pub mod path;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod tracker;

// Re-export core types for convenience
pub use batcher::{BatchFuture, Batcher};
pub use coalesce::{batch_args, BatchPlan};
pub use error::{
    BatchError, BoxError, FetchError, HandlerError, IoError, RegistrationError, SchemaError,
    ShapeMismatchError,
};
pub use fetch_loop::{DataSource, FetchLoop, FnDataSource};
pub use handler::{handler_fn, FnHandler, Handlers, ResourceArgs, ResourceHandler};
pub use normalize::filter_refs;
pub use registry::{format_nested_type, validate_result, Resource, ResourceRegistry, ReturnShape};
pub use resolver::{fetch_ref, ResourceFetcher};
pub use schema::{NodeKind, Schema, SchemaNode};
pub use store::{SharedStore, Store, KNOWN_KEYS};
pub use tracker::{CollectionView, Node, ObjectView};
