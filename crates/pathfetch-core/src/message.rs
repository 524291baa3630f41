//! # Batch Messages
//!
//! Types used between [`Batcher::get`](crate::Batcher::get) callers and the
//! flush task that answers them.

use crate::error::BatchError;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel of a queued request.
pub type Response<T> = oneshot::Sender<Result<T, BatchError>>;

/// A request waiting for the next flush, together with the channel its
/// caller is listening on.
#[derive(Debug)]
pub struct PendingRequest<Req, Out> {
    pub request: Req,
    pub respond_to: Response<Out>,
}
