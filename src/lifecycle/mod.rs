//! Runtime setup shared by binaries and tests.
//!
//! - [`setup_tracing`] initializes the tracing/logging infrastructure
//!
//! Wiring a concrete [`Server`](crate::Server) to a [`Client`](crate::Client)
//! is application code; see the forum sample's `ForumSystem`.

pub mod tracing;

pub use tracing::*;
