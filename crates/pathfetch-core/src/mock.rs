//! # Mocks & Testing Guide
//!
//! In-memory stand-ins for the two seams of the engine, for tests that should
//! not need a real server:
//!
//! | Mock | Stands in for | Drives |
//! |------|---------------|--------|
//! | [`MockResources`] | resource handlers behind a batcher | [`fetch_ref`](crate::fetch_ref) |
//! | [`MockDataSource`] | a server reached over a transport | [`FetchLoop`](crate::FetchLoop) |
//!
//! Both work the same way: queue expectations with a builder, run the code
//! under test, inspect the recorded calls, and finally `verify()` that every
//! expectation was used.
//!
//! ## Resolver test
//!
//! ```rust
//! use pathfetch_core::mock::MockResources;
//! use pathfetch_core::{fetch_ref, Schema, Store};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let schema = Schema::from_json(&json!({ "users": [{ "name": "" }] })).unwrap();
//!     let mock = MockResources::new();
//!     mock.expect("users.{}").return_ok(json!([{ "name": "Ann" }]));
//!
//!     let store = Store::new().shared();
//!     fetch_ref(&schema, "users.7", &mock, &store).await.unwrap();
//!
//!     assert_eq!(mock.calls()[0].1.to_string(), "([7])");
//!     mock.verify();
//! }
//! ```
//!
//! ## Fetch loop test
//!
//! ```rust
//! use pathfetch_core::mock::MockDataSource;
//! use pathfetch_core::{FetchLoop, Schema, Store};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let schema = Schema::from_json(&json!({ "users": [{ "name": "" }] })).unwrap();
//!     let source = MockDataSource::new();
//!     source
//!         .expect_fetch(["users.7"])
//!         .return_ok(json!({ "users": { "7": { "name": "Ann" } } }));
//!
//!     let store = Store::new().shared();
//!     let name = FetchLoop::new(&schema, &source, &store)
//!         .run(|root| {
//!             let user = root.collection("users")?.item("7").ok_or("missing")?;
//!             Ok(user.text("name")?)
//!         })
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(name, "Ann");
//!     source.verify();
//! }
//! ```

use crate::error::FetchError;
use crate::fetch_loop::DataSource;
use crate::handler::ResourceArgs;
use crate::resolver::ResourceFetcher;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ResourceExpectation {
    args: Option<ResourceArgs>,
    response: Result<Value, FetchError>,
}

type ResourceQueues = Arc<Mutex<IndexMap<String, VecDeque<ResourceExpectation>>>>;

/// Canned answers per resource template, consumed in order.
#[derive(Default)]
pub struct MockResources {
    expectations: ResourceQueues,
    calls: Arc<Mutex<Vec<(String, ResourceArgs)>>>,
}

impl MockResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects one call of `resource`.
    pub fn expect(&self, resource: impl Into<String>) -> ResourceExpectationBuilder {
        ResourceExpectationBuilder {
            resource: resource.into(),
            args: None,
            expectations: self.expectations.clone(),
        }
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<(String, ResourceArgs)> {
        locked(&self.calls).clone()
    }

    /// Resource templates called so far, in arrival order.
    pub fn called_resources(&self) -> Vec<String> {
        locked(&self.calls)
            .iter()
            .map(|(resource, _)| resource.clone())
            .collect()
    }

    /// Panics unless every expectation was consumed.
    pub fn verify(&self) {
        let expectations = locked(&self.expectations);
        let remaining: Vec<_> = expectations
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(resource, queue)| format!("{resource} ({})", queue.len()))
            .collect();
        if !remaining.is_empty() {
            panic!("Not all expectations were met. Remaining: {}", remaining.join(", "));
        }
    }
}

#[async_trait]
impl ResourceFetcher for MockResources {
    async fn get_resource(&self, resource: &str, args: ResourceArgs) -> Result<Value, FetchError> {
        locked(&self.calls).push((resource.to_owned(), args.clone()));
        let expectation = locked(&self.expectations)
            .get_mut(resource)
            .and_then(VecDeque::pop_front);
        let Some(expectation) = expectation else {
            return Err(FetchError::MissingHandler(resource.to_owned()));
        };
        if let Some(expected) = &expectation.args {
            if *expected != args {
                panic!("Unexpected arguments for {resource}: expected {expected}, got {args}");
            }
        }
        expectation.response
    }
}

/// Builder for [`MockResources::expect`].
pub struct ResourceExpectationBuilder {
    resource: String,
    args: Option<ResourceArgs>,
    expectations: ResourceQueues,
}

impl ResourceExpectationBuilder {
    /// Also asserts the arguments of the call.
    pub fn with_args(mut self, args: ResourceArgs) -> Self {
        self.args = Some(args);
        self
    }

    pub fn return_ok(self, value: Value) {
        self.push(Ok(value));
    }

    pub fn return_err(self, error: FetchError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<Value, FetchError>) {
        locked(&self.expectations)
            .entry(self.resource)
            .or_default()
            .push_back(ResourceExpectation {
                args: self.args,
                response,
            });
    }
}

type FetchQueue = Arc<Mutex<VecDeque<(Vec<String>, Result<Value, FetchError>)>>>;

/// Canned store fragments for successive `fetch_paths` calls.
#[derive(Default)]
pub struct MockDataSource {
    expectations: FetchQueue,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the next fetch to ask for exactly `paths`.
    pub fn expect_fetch<I, S>(&self, paths: I) -> FetchExpectationBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FetchExpectationBuilder {
            paths: paths.into_iter().map(Into::into).collect(),
            expectations: self.expectations.clone(),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        locked(&self.calls).clone()
    }

    pub fn verify(&self) {
        let remaining = locked(&self.expectations).len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn fetch_paths(&self, paths: &[String]) -> Result<Value, FetchError> {
        locked(&self.calls).push(paths.to_vec());
        let next = locked(&self.expectations).pop_front();
        match next {
            Some((expected, response)) if expected == paths => response,
            Some((expected, _)) => {
                panic!("Unexpected fetch: expected {expected:?}, got {paths:?}")
            }
            None => panic!("Unexpected fetch of {paths:?}"),
        }
    }
}

/// Builder for [`MockDataSource::expect_fetch`].
pub struct FetchExpectationBuilder {
    paths: Vec<String>,
    expectations: FetchQueue,
}

impl FetchExpectationBuilder {
    pub fn return_ok(self, fragment: Value) {
        locked(&self.expectations).push_back((self.paths, Ok(fragment)));
    }

    pub fn return_err(self, error: FetchError) {
        locked(&self.expectations).push_back((self.paths, Err(error)));
    }
}
