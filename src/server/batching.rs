//! One [`Batcher`] per resource.
//!
//! The batch function plans the physical calls with [`batch_args`], runs them
//! concurrently, and keeps every call's result. The postprocess step then
//! hands each caller the slice of the batch that answers its own arguments.

use crate::config::ServerConfig;
use futures::future::join_all;
use futures::FutureExt;
use pathfetch_core::{
    batch_args, validate_result, BatchError, BatchPlan, Batcher, HandlerError, Resource,
    ResourceArgs, ResourceHandler, ShapeMismatchError,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

pub(crate) type ResourceBatcher = Batcher<ResourceArgs, Arc<BatchResponse>, Value>;

/// Results of one flush of a resource batcher.
#[derive(Debug)]
pub(crate) struct BatchResponse {
    plan: BatchPlan,
    results: Vec<Result<Value, HandlerError>>,
}

impl BatchResponse {
    /// The part of this batch that answers `args`.
    fn answer(&self, resource: &str, args: &ResourceArgs) -> Result<Value, BatchError> {
        let result = self
            .plan
            .call_index(args)
            .and_then(|index| self.results.get(index))
            .ok_or_else(|| {
                BatchError::postprocess(ShapeMismatchError::new(
                    resource,
                    format!("no call was made for arguments {args}"),
                ))
            })?;
        match result {
            Ok(value) => self
                .plan
                .extract(resource, value, args)
                .map_err(BatchError::postprocess),
            Err(e) => Err(BatchError::postprocess(e.clone())),
        }
    }
}

pub(crate) fn resource_batcher(
    resource: Resource,
    handler: Arc<dyn ResourceHandler>,
    config: &ServerConfig,
) -> ResourceBatcher {
    let resource = Arc::new(resource);
    let validate = config.validate_results;
    let batch_resource = resource.clone();
    Batcher::with_postprocess(
        move |requests: Vec<ResourceArgs>| {
            let resource = batch_resource.clone();
            let handler = handler.clone();
            async move { run_batch(&resource, handler.as_ref(), requests, validate).await }.boxed()
        },
        move |args: &ResourceArgs, response: &Arc<BatchResponse>| {
            response.answer(&resource.template, args)
        },
    )
    .with_delay(config.batch_delay())
}

async fn run_batch(
    resource: &Resource,
    handler: &dyn ResourceHandler,
    requests: Vec<ResourceArgs>,
    validate: bool,
) -> Result<Arc<BatchResponse>, BatchError> {
    let plan = batch_args(&requests, resource);
    let calls = plan.calls();
    let results = join_all(calls.iter().map(|args| {
        info!(resource = %resource.template, %args, "Fetching from resource");
        handler.fetch(args.clone())
    }))
    .await;

    if validate {
        for (args, result) in calls.iter().zip(&results) {
            let Ok(value) = result else { continue };
            for problem in validate_result(resource, args, value) {
                error!(%args, %problem, "Invalid handler result");
            }
        }
    }

    // A merged call answers every caller, so its failure is everyone's.
    if plan.is_merged() {
        if let Some(Err(e)) = results.first() {
            return Err(BatchError::failed(e.clone()));
        }
    }
    Ok(Arc::new(BatchResponse { plan, results }))
}
