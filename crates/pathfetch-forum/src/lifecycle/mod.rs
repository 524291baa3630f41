//! # Forum Wiring
//!
//! Builds the pieces of the forum in dependency order:
//!
//! 1. **Schema** - parsed once, shared by server and client through an `Arc`
//! 2. **Database** - the seeded in-memory tables
//! 3. **Server** - handlers from the database, validated against the schema
//! 4. **Client** - a session store reading from the server in-process
//!
//! A networked client would replace step 4 with a
//! [`QueryDataSource`](pathfetch::QueryDataSource) posting `?refs=` queries to
//! a remote server's [`handle_query`](pathfetch::Server::handle_query).

pub mod forum_system;

pub use forum_system::*;
