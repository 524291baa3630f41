//! # Request Batcher
//!
//! The `Batcher` coalesces every request issued during one scheduling turn
//! into a single call of a batch function.
//!
//! 1. The first [`Batcher::get`] of an idle period queues its request and
//!    takes the flush duty.
//! 2. Further `get` calls join the queue until the flush.
//! 3. When the first caller's future is polled, it yields once (or sleeps for
//!    the configured delay), drains the queue, and spawns the batch: all
//!    requests, in order, go to the batch function and each caller is
//!    answered through its oneshot channel.
//!
//! `get` enqueues *when it is called*, not when its future is first polled, so
//! requests issued inside a single `join_all` always meet in the same batch.
//! The drain happens on the enqueuing task after it has yielded, so this holds
//! on multi-thread runtimes too. A first caller dropped before flushing hands
//! its duty to a spawned task.
//!
//! ## Failure isolation
//!
//! - A failing batch function fails every caller of that batch with the same
//!   [`BatchError`].
//! - A failing postprocess step fails only the caller it was run for.
//!
//! ```rust
//! use futures::FutureExt;
//! use pathfetch_core::Batcher;
//!
//! #[tokio::main]
//! async fn main() {
//!     let batcher = Batcher::with_postprocess(
//!         |numbers: Vec<u32>| async move { Ok(numbers.iter().sum::<u32>()) }.boxed(),
//!         |n: &u32, sum: &u32| Ok(format!("{n} of {sum}")),
//!     );
//!     let (a, b) = tokio::join!(batcher.get(1), batcher.get(2));
//!     assert_eq!(a.unwrap(), "1 of 3");
//!     assert_eq!(b.unwrap(), "2 of 3");
//! }
//! ```

use crate::error::BatchError;
use crate::message::PendingRequest;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Future returned by a batch function.
pub type BatchFuture<Resp> = BoxFuture<'static, Result<Resp, BatchError>>;

type BatchFn<Req, Resp> = Arc<dyn Fn(Vec<Req>) -> BatchFuture<Resp> + Send + Sync>;
type PostprocessFn<Req, Resp, Out> =
    Arc<dyn Fn(&Req, &Resp) -> Result<Out, BatchError> + Send + Sync>;

struct BatchQueue<Req, Out> {
    pending: Vec<PendingRequest<Req, Out>>,
    armed: bool,
}

pub struct Batcher<Req, Resp, Out = Resp> {
    queue: Arc<Mutex<BatchQueue<Req, Out>>>,
    batch_fn: BatchFn<Req, Resp>,
    postprocess: PostprocessFn<Req, Resp, Out>,
    delay: Duration,
}

impl<Req, Resp, Out> Clone for Batcher<Req, Resp, Out> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            batch_fn: self.batch_fn.clone(),
            postprocess: self.postprocess.clone(),
            delay: self.delay,
        }
    }
}

impl<Req, Resp> Batcher<Req, Resp, Resp>
where
    Req: Clone + Send + 'static,
    Resp: Clone + Send + Sync + 'static,
{
    /// Every caller of a batch receives the whole aggregate response.
    pub fn new<F>(batch_fn: F) -> Self
    where
        F: Fn(Vec<Req>) -> BatchFuture<Resp> + Send + Sync + 'static,
    {
        Self::with_postprocess(batch_fn, |_, response: &Resp| Ok(response.clone()))
    }
}

impl<Req, Resp, Out> Batcher<Req, Resp, Out>
where
    Req: Clone + Send + 'static,
    Resp: Send + Sync + 'static,
    Out: Send + 'static,
{
    /// Each caller receives `postprocess(its_request, aggregate_response)`.
    pub fn with_postprocess<F, P>(batch_fn: F, postprocess: P) -> Self
    where
        F: Fn(Vec<Req>) -> BatchFuture<Resp> + Send + Sync + 'static,
        P: Fn(&Req, &Resp) -> Result<Out, BatchError> + Send + Sync + 'static,
    {
        Self {
            queue: Arc::new(Mutex::new(BatchQueue {
                pending: Vec::new(),
                armed: false,
            })),
            batch_fn: Arc::new(batch_fn),
            postprocess: Arc::new(postprocess),
            delay: Duration::ZERO,
        }
    }

    /// Waits `delay` instead of a single scheduler yield before flushing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queues `request` for the next flush.
    ///
    /// Must be called from within a tokio runtime. The returned future only
    /// waits for the answer, except for the first request of a batch, whose
    /// future also triggers the flush.
    pub fn get(&self, request: Req) -> impl Future<Output = Result<Out, BatchError>> + Send + 'static {
        let (respond_to, response) = oneshot::channel();
        let leads = {
            let mut queue = self.lock_queue();
            queue.pending.push(PendingRequest {
                request,
                respond_to,
            });
            !std::mem::replace(&mut queue.armed, true)
        };
        let duty = leads.then(|| FlushDuty {
            batcher: Some(self.clone()),
        });
        async move {
            if let Some(duty) = duty {
                duty.perform().await;
            }
            response.await.unwrap_or(Err(BatchError::Dropped))
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, BatchQueue<Req, Out>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait(&self) {
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn drain(&self) -> Vec<PendingRequest<Req, Out>> {
        let mut queue = self.lock_queue();
        queue.armed = false;
        std::mem::take(&mut queue.pending)
    }

    /// Drains the queue and runs the batch on its own task, so a caller that
    /// goes away cannot cancel the answers of the others.
    fn flush(&self) {
        let batch = self.drain();
        if batch.is_empty() {
            return;
        }
        tokio::spawn(self.clone().execute(batch));
    }

    async fn execute(self, batch: Vec<PendingRequest<Req, Out>>) {
        let size = batch.len();
        let requests: Vec<Req> = batch.iter().map(|p| p.request.clone()).collect();
        debug!(size, "Flushing batch");

        match (self.batch_fn)(requests).await {
            Ok(response) => {
                for pending in batch {
                    let result = (self.postprocess)(&pending.request, &response);
                    if let Err(e) = &result {
                        debug!(error = %e, "Postprocess failed");
                    }
                    let _ = pending.respond_to.send(result);
                }
            }
            Err(e) => {
                warn!(size, error = %e, "Batch failed");
                for pending in batch {
                    let _ = pending.respond_to.send(Err(e.clone()));
                }
            }
        }
    }
}

/// The flush owed by the first caller of a batch.
struct FlushDuty<Req, Resp, Out>
where
    Req: Clone + Send + 'static,
    Resp: Send + Sync + 'static,
    Out: Send + 'static,
{
    batcher: Option<Batcher<Req, Resp, Out>>,
}

impl<Req, Resp, Out> FlushDuty<Req, Resp, Out>
where
    Req: Clone + Send + 'static,
    Resp: Send + Sync + 'static,
    Out: Send + 'static,
{
    async fn perform(mut self) {
        if let Some(batcher) = &self.batcher {
            batcher.wait().await;
            batcher.flush();
        }
        self.batcher = None;
    }
}

impl<Req, Resp, Out> Drop for FlushDuty<Req, Resp, Out>
where
    Req: Clone + Send + 'static,
    Resp: Send + Sync + 'static,
    Out: Send + 'static,
{
    fn drop(&mut self) {
        let Some(batcher) = self.batcher.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    batcher.wait().await;
                    batcher.flush();
                });
            }
            // Without a runtime the queued callers can only be told it is gone
            Err(_) => drop(batcher.drain()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_batcher(calls: Arc<Mutex<Vec<Vec<u32>>>>) -> Batcher<u32, Vec<u32>> {
        Batcher::new(move |requests: Vec<u32>| {
            calls.lock().unwrap().push(requests.clone());
            async move { Ok(requests) }.boxed()
        })
    }

    #[tokio::test]
    async fn coalesces_one_turn_into_one_call() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batcher = recording_batcher(calls.clone());

        let results = join_all((1..=5).map(|n| batcher.get(n))).await;

        assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2, 3, 4, 5]]);
        for result in results {
            assert_eq!(result.unwrap(), vec![1, 2, 3, 4, 5]);
        }
    }

    #[tokio::test]
    async fn requests_after_a_flush_start_a_new_batch() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batcher = recording_batcher(calls.clone());

        batcher.get(1).await.unwrap();
        let (a, b) = tokio::join!(batcher.get(2), batcher.get(3));
        a.unwrap();
        b.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![vec![1], vec![2, 3]]);
    }

    #[tokio::test]
    async fn batch_failure_rejects_every_caller_with_the_same_error() {
        let batcher: Batcher<u32, u32> =
            Batcher::new(|_| async { Err(BatchError::failed("database is down")) }.boxed());

        let first = batcher.get(1);
        let second = batcher.get(2);
        let (first, second) = tokio::join!(first, second);

        match (first, second) {
            (Err(BatchError::Failed(a)), Err(BatchError::Failed(b))) => {
                assert!(Arc::ptr_eq(&a, &b));
                assert_eq!(a.to_string(), "database is down");
            }
            other => panic!("expected shared failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn postprocess_failures_stay_with_their_caller() {
        let batcher = Batcher::with_postprocess(
            |requests: Vec<i32>| async move { Ok(requests) }.boxed(),
            |request: &i32, all: &Vec<i32>| {
                if *request < 0 {
                    Err(BatchError::postprocess(format!("negative request {request}")))
                } else {
                    Ok(all.len() as i32 * request)
                }
            },
        );

        let (a, b, c) = tokio::join!(batcher.get(1), batcher.get(-1), batcher.get(2));

        assert_eq!(a.unwrap(), 3);
        assert!(matches!(b, Err(BatchError::Postprocess(_))));
        assert_eq!(c.unwrap(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_turn_is_one_batch_on_a_multi_thread_runtime() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let batcher = Batcher::new(move |requests: Vec<u32>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(requests.len()) }.boxed()
        });

        for run in 1..=20 {
            let results = join_all((0..500).map(|n| batcher.get(n))).await;

            assert_eq!(calls.load(Ordering::SeqCst), run);
            assert!(results.into_iter().all(|r| r.unwrap() == 500));
        }
    }

    #[tokio::test]
    async fn dropped_first_caller_still_flushes_the_batch() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batcher = recording_batcher(calls.clone());

        drop(batcher.get(1));
        let second = batcher.get(2).await.unwrap();

        assert_eq!(second, vec![1, 2]);
        assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn delay_widens_the_batch_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let batcher = Batcher::new(move |requests: Vec<u32>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(requests.len()) }.boxed()
        })
        .with_delay(Duration::from_millis(20));

        let first = batcher.get(1);
        tokio::task::yield_now().await;
        let second = batcher.get(2);
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap(), 2);
        assert_eq!(second.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
