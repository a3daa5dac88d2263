//! Worker loop: dequeue, select a provider, execute, retry or resolve.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::selector::Selector;
use crate::Error;

use super::request::{Request, RequestQueue};
use super::retry::{RetryCoordinator, RetryDecision};

/// Dequeue poll period; also the cadence of shutdown checks.
pub(crate) const DEQUEUE_POLL: Duration = Duration::from_millis(50);

/// Idle backoff after a pass that found no eligible provider, so starved
/// workers do not spin against an all-open registry.
const NO_PROVIDER_BACKOFF: Duration = Duration::from_millis(100);

/// Everything a worker needs, shared across the pool.
pub(crate) struct WorkerContext {
    pub queue: Arc<RequestQueue>,
    pub selector: Arc<Selector>,
    pub retry: Arc<RetryCoordinator>,
    pub shutdown: CancellationToken,
}

/// One worker task. Exits when the shutdown token fires; the current
/// request, if any, is always resolved or requeued first.
pub(crate) async fn run_worker(worker_id: usize, ctx: Arc<WorkerContext>) {
    debug!(worker = worker_id, "worker started");
    loop {
        if ctx.shutdown.is_cancelled() {
            break;
        }
        match ctx.queue.pop() {
            Some(request) => handle_request(worker_id, &ctx, request).await,
            None => {
                tokio::select! {
                    _ = ctx.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(DEQUEUE_POLL) => {}
                }
            }
        }
    }
    debug!(worker = worker_id, "worker stopped");
}

async fn handle_request(worker_id: usize, ctx: &WorkerContext, mut request: Request) {
    let provider = match ctx.selector.select(request.provider.as_deref()).await {
        Ok(provider) => provider,
        Err(Error::NoProvidersAvailable) => {
            if request.deadline_elapsed() {
                debug!(
                    request_id = %request.id,
                    "no eligible provider within the request budget"
                );
                request.resolve(Err(Error::NoProvidersAvailable));
            } else {
                // Nothing eligible right now; requeue and idle instead of
                // spinning on the same empty candidate set.
                ctx.queue.push(request);
                tokio::time::sleep(NO_PROVIDER_BACKOFF).await;
            }
            return;
        }
        Err(err) => {
            request.resolve(Err(err));
            return;
        }
    };

    request.provider = Some(provider.name().to_string());
    // Each attempt is bounded by the provider's configured call timeout,
    // capped by the request's own budget.
    let attempt_timeout = request.timeout.min(provider.call_timeout());
    let outcome = provider
        .execute_request(&request.payload, attempt_timeout)
        .await;

    match outcome {
        Ok(response) => {
            debug!(
                worker = worker_id,
                request_id = %request.id,
                provider = provider.name(),
                retries = request.retry_count,
                "request resolved"
            );
            request.resolve(Ok(response));
        }
        Err(err) => match ctx.retry.decide(&request, &err, provider.backoff_factor()) {
            RetryDecision::Requeue { delay } => {
                warn!(
                    worker = worker_id,
                    request_id = %request.id,
                    provider = provider.name(),
                    error = %err,
                    retry = request.retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, requeueing"
                );
                request.retry_count += 1;
                request.provider = None;
                let queue = Arc::clone(&ctx.queue);
                if delay.is_zero() {
                    queue.push(request);
                } else {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        queue.push(request);
                    });
                }
            }
            RetryDecision::Fail => {
                warn!(
                    worker = worker_id,
                    request_id = %request.id,
                    provider = provider.name(),
                    error = %err,
                    retries = request.retry_count,
                    "request failed terminally"
                );
                request.resolve(Err(err));
            }
        },
    }
}
