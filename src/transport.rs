//! # Query Transport
//!
//! The wire format between a client and a remote server is a single query
//! string listing the paths to resolve:
//!
//! ```text
//! /?refs=topics.123,topics.123.entries.*,users.7
//! ```
//!
//! The answer is the JSON store fragment.

use async_trait::async_trait;
use pathfetch_core::{DataSource, FetchError};
use serde_json::Value;
use std::future::Future;

pub const REFS_PREFIX: &str = "/?refs=";

pub fn encode_refs<S: AsRef<str>>(paths: &[S]) -> String {
    let joined: Vec<&str> = paths.iter().map(AsRef::as_ref).collect();
    format!("{REFS_PREFIX}{}", joined.join(","))
}

pub fn decode_refs(query: &str) -> Result<Vec<String>, FetchError> {
    let refs = query
        .strip_prefix(REFS_PREFIX)
        .ok_or_else(|| FetchError::Transport(format!("Not a refs query: {query:?}")))?;
    Ok(refs
        .split(',')
        .filter(|path| !path.is_empty())
        .map(str::to_owned)
        .collect())
}

/// A [`DataSource`] that sends each fetch as one refs query, for example
/// over HTTP.
pub struct QueryDataSource<F> {
    send: F,
}

impl<F> QueryDataSource<F> {
    pub fn new(send: F) -> Self {
        Self { send }
    }
}

#[async_trait]
impl<F, Fut> DataSource for QueryDataSource<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
{
    async fn fetch_paths(&self, paths: &[String]) -> Result<Value, FetchError> {
        (self.send)(encode_refs(paths)).await
    }
}
