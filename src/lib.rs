#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Pathfetch
//!
//! > **Read the data you render. Fetch what you read.**
//!
//! This crate is the runtime surface of a graph-shaped data-fetching engine.
//! Client code reads a schema-shaped view of its local store; every read of
//! data that is not there yet becomes a path, and the server answers a batch
//! of paths with one store fragment, coalescing handler calls per resource.
//!
//! ## 🏗️ Design Philosophy
//!
//! - **One schema**: client views, server resources and result validation
//!   all derive from the same [`Schema`](pathfetch_core::Schema).
//! - **No query language**: the set of paths a render touched *is* the query.
//! - **Batching by default**: every call issued in one scheduling turn against
//!   the same resource turns into a single handler call.
//!
//! ## 🚀 Core Concepts
//!
//! ### The fetch loop
//! [`Client::io`] runs a callback against the store. Reads of missing data
//! return schema placeholders and are recorded. The recorded paths are
//! normalized and fetched, and the callback runs again, until a pass records
//! nothing. The callback must therefore be free of side effects.
//!
//! ### Resources
//! Every collection, object and reference in the schema is a resource with a
//! template such as `topics.{}.entries`. The [`Server`] expects one handler per
//! resource, taking one id list per `{}` and returning one list level per id
//! list. Missing or mis-shaped handlers are logged, not fatal.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Error Handling
//! Each layer has its own `thiserror` enum (`SchemaError`, `FetchError`,
//! `IoError`, ...), converted with `#[from]` as errors cross layers.
//!
//! ### 2. Concurrency Model
//! Everything runs on Tokio. Paths of one request resolve concurrently and
//! meet in per-resource [`Batcher`](pathfetch_core::Batcher)s. A failed batch
//! fails every caller in it; a failed postprocess step only fails its own
//! caller.
//!
//! ### 3. Observability
//! We use `tracing` everywhere with structured fields. Every physical handler
//! call is logged at `info`. See the [`lifecycle::tracing`] module for details.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`pathfetch_core`])
//! Schema, registry, batcher, resolver, tracker and fetch loop.
//!
//! ### 2. The Server ([`server`])
//! Handler validation, per-resource batching, and path resolution into a
//! per-request store.
//!
//! ### 3. The Client ([`client`])
//! A session store and the `io` loop, against any
//! [`DataSource`](pathfetch_core::DataSource): a local server or a remote one
//! through the [`transport`] module.
//!
//! ### 4. Settings ([`config`], [`lifecycle`])
//! Serde configuration structs and tracing setup.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the forum demo with handler calls logged
//! RUST_LOG=info cargo run -p pathfetch-forum
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test --workspace
//! ```

pub mod client;
pub mod config;
pub mod lifecycle;
pub mod server;
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use server::Server;
pub use transport::{decode_refs, encode_refs, QueryDataSource, REFS_PREFIX};
