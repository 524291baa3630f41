//! # Engine Errors
//!
//! This module defines the error types used throughout the fetching engine.
//! Each layer gets its own enum so that callers can tell a broken schema apart
//! from a misbehaving handler or a failed batch:
//!
//! | Type | Raised by | Fatal? |
//! |------|-----------|--------|
//! | [`SchemaError`] | path walking, views | yes |
//! | [`RegistrationError`] | handler validation | no, reported as warnings |
//! | [`ShapeMismatchError`] | result validation | only when resolution cannot continue |
//! | [`BatchError`] | the batcher | shared by every caller of the failed batch |
//! | [`FetchError`] | resolver and data sources | yes |
//! | [`IoError`] | the fetch loop | yes |

use crate::schema::NodeKind;
use std::sync::Arc;

/// Boxed error returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while walking the schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Cannot descend into primitive at key {0:?}")]
    DescendIntoPrimitive(String),
    #[error("Unknown field {field:?} at {path:?}")]
    UnknownField { path: String, field: String },
    #[error("Expected {expected} at {path:?}, found {found}")]
    KindMismatch {
        path: String,
        expected: NodeKind,
        found: NodeKind,
    },
    #[error("Invalid schema definition: {0}")]
    InvalidDefinition(String),
    #[error("Reference target {0:?} is not a collection")]
    UnknownCollection(String),
}

/// A problem found while checking registered handlers against the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Missing handler for {resource}. {expected}")]
    Missing { resource: String, expected: String },
    #[error("Invalid handler for {resource}: it accepts {found} arguments. {expected}")]
    Arity {
        resource: String,
        expected: String,
        found: usize,
    },
    #[error("Unexpected handler for: {resource}")]
    Unexpected { resource: String },
}

/// A handler result that does not match the declared resource shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Wrong result from resource handler {resource}: {problem}")]
pub struct ShapeMismatchError {
    pub resource: String,
    pub problem: String,
}

impl ShapeMismatchError {
    pub fn new(resource: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            problem: problem.into(),
        }
    }
}

/// Error value produced by a resource handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors delivered by the [`Batcher`](crate::Batcher).
///
/// The payloads are reference counted: when a batch fails, every caller in
/// that batch receives a clone of the *same* error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchError {
    #[error("Batch failed: {0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),
    #[error("Postprocess failed: {0}")]
    Postprocess(Arc<dyn std::error::Error + Send + Sync>),
    #[error("Batch dropped before responding")]
    Dropped,
}

impl BatchError {
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed(Arc::from(error.into()))
    }

    pub fn postprocess(error: impl Into<BoxError>) -> Self {
        Self::Postprocess(Arc::from(error.into()))
    }
}

/// Errors raised while resolving paths against resources.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("{path:?} is a collection. Did you mean \"{path}.*\"?")]
    AmbiguousCollection { path: String },
    #[error("{path:?} is a primitive. Request the containing object {parent:?} instead")]
    PrimitivePath { path: String, parent: String },
    #[error("Cannot fetch {path:?}: it ends on a {kind}")]
    UnexpectedTerminal { path: String, kind: NodeKind },
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatchError),
    #[error("No handler registered for resource {0}")]
    MissingHandler(String),
    #[error("Resource {resource} expects {expected} arguments, got {found}")]
    ArgumentMismatch {
        resource: String,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors ending a [`FetchLoop`](crate::FetchLoop) run.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("Callback failed: {0}")]
    Callback(BoxError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("internal error: {0} was fetched, but it looks like it isn't present in the store")]
    AlreadyFetched(String),
    #[error("Data source failed: {0}")]
    DataSource(#[from] FetchError),
}
