//! # Forum Model
//!
//! The forum schema, shared by the server (which derives its resources from
//! it) and the client (which reads through it), plus the rows the in-memory
//! database keeps.
//!
//! ```text
//! topics[]    name, entries -> entries[], openingEntry -> entries,
//!             participants -> users[], creator -> users
//! entries[]   text, author -> users
//! users[]     name, avatar { url }
//! ```

mod entry;
mod topic;
mod user;

pub use entry::Entry;
pub use topic::Topic;
pub use user::{Avatar, User};

use pathfetch_core::{Schema, SchemaError};
use serde_json::json;

/// Builds the forum schema. Field values are the placeholders shown while
/// data is loading.
pub fn forum_schema() -> Result<Schema, SchemaError> {
    Schema::from_json(&json!({
        "topics": [{
            "id": 0,
            "name": "Loading topic...",
            "entries": [{ "$ref": "entries" }],
            "openingEntry": { "$ref": "entries" },
            "participants": [{ "$ref": "users" }],
            "creator": { "$ref": "users" },
        }],
        "entries": [{
            "id": 0,
            "text": "Loading...",
            "author": { "$ref": "users" },
        }],
        "users": [{
            "id": 0,
            "name": "Nobody",
            "avatar": { "url": "/img/blank.png" },
        }],
    }))
}
