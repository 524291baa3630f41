//! # Client
//!
//! A client session: one schema, one data source, one store that keeps
//! growing across [`Client::io`] calls.
//!
//! ```rust
//! use pathfetch::Client;
//! use pathfetch_core::mock::MockDataSource;
//! use pathfetch_core::Schema;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let schema = Arc::new(Schema::from_json(&json!({ "users": [{ "name": "" }] })).unwrap());
//!     let source = MockDataSource::new();
//!     source
//!         .expect_fetch(["users.7"])
//!         .return_ok(json!({ "users": { "7": { "name": "Ann" } } }));
//!     let client = Client::new(schema, source);
//!
//!     let greeting = client
//!         .io(|root| {
//!             let user = root.collection("users")?.item("7").ok_or("no such user")?;
//!             Ok(format!("Hello, {}", user.text("name")?))
//!         })
//!         .await
//!         .unwrap();
//!     assert_eq!(greeting, "Hello, Ann");
//! }
//! ```

use crate::config::ClientConfig;
use pathfetch_core::store::lock;
use pathfetch_core::{
    tracker, BoxError, DataSource, FetchLoop, IoError, ObjectView, Schema, SharedStore, Store,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct Client<D> {
    schema: Arc<Schema>,
    source: D,
    store: SharedStore,
    config: ClientConfig,
}

impl<D: DataSource> Client<D> {
    pub fn new(schema: impl Into<Arc<Schema>>, source: D) -> Self {
        Self::with_config(schema, source, ClientConfig::default())
    }

    pub fn with_config(schema: impl Into<Arc<Schema>>, source: D, config: ClientConfig) -> Self {
        Self {
            schema: schema.into(),
            source,
            store: Store::new().shared(),
            config,
        }
    }

    /// Starts the session from previously fetched data.
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = store.shared();
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// A copy of everything fetched so far.
    pub fn snapshot(&self) -> Value {
        lock(&self.store).as_value().clone()
    }

    pub fn is_mocking(&self) -> bool {
        self.config.mocking
    }

    pub fn set_mocking(&mut self, mocking: bool) {
        self.config.mocking = mocking;
    }

    /// Runs `callback` against the store, fetching whatever it reads that is
    /// missing, until it reads nothing missing. Returns the final outcome.
    ///
    /// In mocking mode the callback runs once against placeholders and the
    /// data source is never called.
    #[instrument(skip_all)]
    pub async fn io<T, C>(&self, callback: C) -> Result<T, IoError>
    where
        C: FnMut(&ObjectView<'_>) -> Result<T, BoxError>,
    {
        if self.config.mocking {
            return self.run_once(callback);
        }
        FetchLoop::new(&self.schema, &self.source, &self.store)
            .run(callback)
            .await
    }

    fn run_once<T, C>(&self, mut callback: C) -> Result<T, IoError>
    where
        C: FnMut(&ObjectView<'_>) -> Result<T, BoxError>,
    {
        let store = lock(&self.store);
        let sink = |path: &str| debug!(path, "Mocked read of missing data");
        let view = tracker::create(&self.schema, store.as_value(), &sink);
        callback(&view).map_err(IoError::Callback)
    }
}
