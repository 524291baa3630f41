//! # In-Memory Forum Database
//!
//! Three tables and one handler per forum resource. Handlers answer whole id
//! lists at once, the way a real backend would answer `WHERE id IN (...)`,
//! and return `null` for ids they do not know.

use crate::model::{Entry, Topic, User};
use pathfetch_core::{handler_fn, HandlerError, Handlers, ResourceArgs, ResourceHandler};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ForumDb {
    topics: Vec<Topic>,
    entries: Vec<Entry>,
    users: Vec<User>,
}

impl ForumDb {
    pub fn new(topics: Vec<Topic>, entries: Vec<Entry>, users: Vec<User>) -> Self {
        Self {
            topics,
            entries,
            users,
        }
    }

    /// A small forum with two topics, one of them with an anonymous entry.
    pub fn seeded() -> Self {
        Self::new(
            vec![
                Topic::new(1, "Borrowing across awaits", 7, vec![10, 11, 12])
                    .with_participants(vec![7, 8]),
                Topic::new(2, "Favourite crates", 8, vec![20]).with_participants(vec![8]),
            ],
            vec![
                Entry::new(10, "Why does my guard live across this await?", Some(7)),
                Entry::new(11, "Move the lock into a block that ends before it.", Some(8)),
                Entry::new(12, "That fixed it, thanks!", None),
                Entry::new(20, "serde, tokio and tracing.", Some(8)),
            ],
            vec![
                User::new(7, "Ann", "/img/ann.png"),
                User::new(8, "Bob", "/img/bob.png"),
            ],
        )
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|topic| matches_id(topic.id, id))
    }

    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| matches_id(entry.id, id))
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|user| matches_id(user.id, id))
    }

    /// One handler per resource of [`forum_schema`](crate::model::forum_schema).
    pub fn handlers(self: &Arc<Self>) -> Handlers {
        Handlers::new()
            .register("topics", all_ids(self, |db| ids_of(&db.topics, |t| t.id)))
            .register(
                "topics.{}",
                per_id(self, |db, id| {
                    db.topic(id)
                        .map_or(Value::Null, |t| json!({ "id": t.id, "name": t.name }))
                }),
            )
            .register(
                "topics.{}.entries",
                ids_per_id(self, |db, id| db.topic(id).map(|t| t.entries.clone())),
            )
            .register(
                "topics.{}.openingEntry",
                per_id(self, |db, id| json!(db.topic(id).and_then(|t| t.opening_entry))),
            )
            .register(
                "topics.{}.participants",
                ids_per_id(self, |db, id| db.topic(id).map(|t| t.participants.clone())),
            )
            .register(
                "topics.{}.creator",
                per_id(self, |db, id| json!(db.topic(id).and_then(|t| t.creator))),
            )
            .register("entries", all_ids(self, |db| ids_of(&db.entries, |e| e.id)))
            .register(
                "entries.{}",
                per_id(self, |db, id| {
                    db.entry(id)
                        .map_or(Value::Null, |e| json!({ "id": e.id, "text": e.text }))
                }),
            )
            .register(
                "entries.{}.author",
                per_id(self, |db, id| json!(db.entry(id).and_then(|e| e.author))),
            )
            .register("users", all_ids(self, |db| ids_of(&db.users, |u| u.id)))
            .register(
                "users.{}",
                per_id(self, |db, id| {
                    db.user(id)
                        .map_or(Value::Null, |u| json!({ "id": u.id, "name": u.name }))
                }),
            )
            .register(
                "users.{}.avatar",
                per_id(self, |db, id| {
                    db.user(id)
                        .map_or(Value::Null, |u| json!({ "url": u.avatar.url }))
                }),
            )
    }
}

fn matches_id(id: u64, requested: &str) -> bool {
    requested.parse::<u64>().is_ok_and(|requested| requested == id)
}

fn ids_of<T>(rows: &[T], id: impl Fn(&T) -> u64) -> Vec<u64> {
    rows.iter().map(id).collect()
}

/// Top-level collection handler. Honors an optional `limit` criterion.
fn all_ids(
    db: &Arc<ForumDb>,
    table_ids: fn(&ForumDb) -> Vec<u64>,
) -> impl ResourceHandler + 'static {
    let db = Arc::clone(db);
    handler_fn(1, move |args: ResourceArgs| {
        let mut ids = table_ids(&db);
        let limit = args
            .criteria
            .as_ref()
            .and_then(|criteria| criteria.get("limit"))
            .and_then(Value::as_u64);
        if let Some(limit) = limit {
            ids.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        async move { Ok::<_, HandlerError>(json!(ids)) }
    })
}

/// One value per requested id.
fn per_id(
    db: &Arc<ForumDb>,
    lookup: fn(&ForumDb, &str) -> Value,
) -> impl ResourceHandler + 'static {
    let db = Arc::clone(db);
    handler_fn(1, move |args: ResourceArgs| {
        let rows: Vec<Value> = requested(&args)
            .iter()
            .map(|id| lookup(&db, id))
            .collect();
        async move { Ok::<_, HandlerError>(Value::Array(rows)) }
    })
}

/// One id list per requested id, for collections nested in an entity.
fn ids_per_id(
    db: &Arc<ForumDb>,
    lookup: fn(&ForumDb, &str) -> Option<Vec<u64>>,
) -> impl ResourceHandler + 'static {
    let db = Arc::clone(db);
    handler_fn(2, move |args: ResourceArgs| {
        let rows: Vec<Value> = requested(&args)
            .iter()
            .map(|id| lookup(&db, id).map_or(Value::Null, |ids| json!(ids)))
            .collect();
        async move { Ok::<_, HandlerError>(Value::Array(rows)) }
    })
}

fn requested(args: &ResourceArgs) -> &[String] {
    args.ids.first().map(Vec::as_slice).unwrap_or_default()
}
