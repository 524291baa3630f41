use crate::db::ForumDb;
use crate::model::forum_schema;
use pathfetch::{Client, ClientConfig, Server, ServerConfig};
use pathfetch_core::SchemaError;
use std::sync::Arc;
use tracing::info;

/// A forum server and one client session talking to it directly.
pub struct ForumSystem {
    pub db: Arc<ForumDb>,
    pub server: Arc<Server>,
    pub client: Client<Arc<Server>>,
}

impl ForumSystem {
    /// Seeded database, default settings.
    pub fn new() -> Result<Self, SchemaError> {
        Self::with_db(ForumDb::seeded(), ServerConfig::default(), ClientConfig::default())
    }

    pub fn with_db(
        db: ForumDb,
        server_config: ServerConfig,
        client_config: ClientConfig,
    ) -> Result<Self, SchemaError> {
        let schema = Arc::new(forum_schema()?);
        let db = Arc::new(db);
        let server = Arc::new(Server::with_config(
            Arc::clone(&schema),
            db.handlers(),
            server_config,
        ));
        let client = Client::with_config(schema, Arc::clone(&server), client_config);
        info!(
            resources = server.registry().len(),
            problems = server.problems().len(),
            "Forum system started"
        );
        Ok(Self { db, server, client })
    }

    /// A fresh client session against the same server.
    pub fn new_session(&self) -> Client<Arc<Server>> {
        Client::new(Arc::clone(self.server.schema()), Arc::clone(&self.server))
    }
}
