//! # Observability & Tracing
//!
//! [`setup_tracing`] initializes structured logging with the `tracing` crate,
//! in a compact format without module prefixes (`with_target(false)`).
//! Verbosity is controlled by `RUST_LOG`.
//!
//! ## What Gets Traced
//!
//! - **Registration**: one `warn` per missing, unexpected or wrongly-shaped handler
//! - **Handler calls**: one `info` per physical call, with the resource and its arguments
//! - **Invalid results**: one `error` per shape problem found in a handler result
//! - **Resolution**: `debug` for every resolution round, batch flush and fetch pass
//!
//! ## Usage Examples
//!
//! ```bash
//! # Handler calls only
//! RUST_LOG=info cargo run -p pathfetch-forum
//!
//! # Every round of every path, and every fetch-loop pass
//! RUST_LOG=debug cargo run -p pathfetch-forum
//!
//! # Only the engine
//! RUST_LOG=pathfetch_core=debug cargo run -p pathfetch-forum
//! ```
//!
//! ## Trace Example
//!
//! Rendering topic 1 of the forum sample with `RUST_LOG=info`:
//!
//! ```text
//! INFO Server ready resources=12 handlers=12 problems=0
//! INFO Forum system started resources=12 problems=0
//! INFO Fetching from resource resource="topics.{}" args=([1])
//! INFO Fetching from resource resource="topics.{}.entries" args=([1], {})
//! INFO Fetching from resource resource="entries.{}" args=([10,11,12])
//! INFO Fetching from resource resource="entries.{}.author" args=([10,11,12])
//! INFO Fetching from resource resource="users.{}" args=([7,8])
//! INFO Fetching from resource resource="users.{}.avatar" args=([7,8])
//! ```
//!
//! Three entries with two distinct authors cost one `entries.{}.author` call
//! and one `users.{}` call.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
