//! # Fetch Loop
//!
//! Runs a reader against the store until it stops touching missing data.
//!
//! ```text
//!          ┌──────────── merge fragment ◄──────────┐
//!          ▼                                        │
//!   RUN callback ── misses? ── no ──► DONE          │
//!                     │                             │
//!                    yes ──► normalize ──► FETCHING ┘
//! ```
//!
//! The callback may run many times and its intermediate results are thrown
//! away, so it must not have side effects.

use crate::error::{BoxError, FetchError, IoError};
use crate::normalize::filter_refs;
use crate::schema::Schema;
use crate::store::{lock, SharedStore};
use crate::tracker::{self, ObjectView};
use async_trait::async_trait;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Fills a list of normalized paths and returns the matching store fragment.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_paths(&self, paths: &[String]) -> Result<Value, FetchError>;
}

#[async_trait]
impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    async fn fetch_paths(&self, paths: &[String]) -> Result<Value, FetchError> {
        (**self).fetch_paths(paths).await
    }
}

/// A data source backed by an async closure.
pub struct FnDataSource<F>(F);

impl<F> FnDataSource<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> DataSource for FnDataSource<F>
where
    F: Fn(Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
{
    async fn fetch_paths(&self, paths: &[String]) -> Result<Value, FetchError> {
        (self.0)(paths.to_vec()).await
    }
}

/// One `io` call: a callback, a store, and the paths fetched for it so far.
pub struct FetchLoop<'a, D: ?Sized> {
    schema: &'a Schema,
    source: &'a D,
    store: &'a SharedStore,
    already_fetched: HashSet<String>,
}

impl<'a, D: DataSource + ?Sized> FetchLoop<'a, D> {
    pub fn new(schema: &'a Schema, source: &'a D, store: &'a SharedStore) -> Self {
        Self {
            schema,
            source,
            store,
            already_fetched: HashSet::new(),
        }
    }

    /// Runs `callback` until a pass reports no missing paths and returns that
    /// pass's outcome.
    pub async fn run<T, C>(&mut self, mut callback: C) -> Result<T, IoError>
    where
        C: FnMut(&ObjectView<'_>) -> Result<T, BoxError>,
    {
        let mut pass = 0;
        loop {
            pass += 1;
            let refs = {
                let (outcome, misses) = {
                    let store = lock(self.store);
                    let misses = RefCell::new(Vec::new());
                    let sink = |path: &str| misses.borrow_mut().push(path.to_owned());
                    let view = tracker::create(self.schema, store.as_value(), &sink);
                    let outcome = callback(&view);
                    drop(view);
                    (outcome, misses.into_inner())
                };

                if misses.is_empty() {
                    debug!(pass, "No missing data");
                    return outcome.map_err(IoError::Callback);
                }
                if let Err(e) = &outcome {
                    debug!(pass, error = %e, "Callback failed on incomplete data");
                }

                let refs = filter_refs(self.schema, &misses)?;
                if refs.is_empty() {
                    debug!(pass, ?misses, "Nothing fetchable among missing paths");
                    return outcome.map_err(IoError::Callback);
                }
                if let Some(path) = refs.iter().find(|path| self.already_fetched.contains(*path)) {
                    return Err(IoError::AlreadyFetched(path.clone()));
                }
                refs
            };

            debug!(pass, paths = ?refs, "Fetching missing paths");
            let fragment = self.source.fetch_paths(&refs).await?;
            lock(self.store).merge(fragment);
            self.already_fetched.extend(refs);
        }
    }
}
