//! Request lifecycle types and the shared FIFO queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::{Error, Result};

/// One dispatched unit of work, owned exclusively by the dispatcher from
/// enqueue to resolution.
pub(crate) struct Request {
    pub id: Uuid,
    pub payload: Value,
    pub created_at: Instant,
    pub timeout: Duration,
    /// Accepted and carried, but not yet used for queue ordering.
    #[allow(dead_code)]
    pub priority: i32,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Provider hint/assignment; cleared between retry attempts so the next
    /// attempt may pick a healthier provider.
    pub provider: Option<String>,
    responder: oneshot::Sender<Result<Value>>,
}

impl Request {
    pub fn new(
        payload: Value,
        timeout: Duration,
        priority: i32,
        provider: Option<String>,
        max_retries: u32,
    ) -> (Self, oneshot::Receiver<Result<Value>>) {
        let (responder, rx) = oneshot::channel();
        (
            Self {
                id: Uuid::new_v4(),
                payload,
                created_at: Instant::now(),
                timeout,
                priority,
                retry_count: 0,
                max_retries,
                provider,
                responder,
            },
            rx,
        )
    }

    /// Resolve the request exactly once; consuming self makes double
    /// resolution unrepresentable. The caller may have stopped waiting, in
    /// which case the result is dropped.
    pub fn resolve(self, result: Result<Value>) {
        let _ = self.responder.send(result);
    }

    /// Whether the request's own time budget has already elapsed.
    pub fn deadline_elapsed(&self) -> bool {
        self.created_at.elapsed() >= self.timeout
    }
}

struct QueueInner {
    items: VecDeque<Request>,
    closed: bool,
}

/// Bounded FIFO queue shared by all workers; the only cross-worker mutable
/// structure in the engine.
pub(crate) struct RequestQueue {
    inner: Mutex<QueueInner>,
    depth: AtomicUsize,
    capacity: usize,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                closed: false,
            }),
            depth: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Enqueue a request. A closed or full queue resolves the request
    /// immediately instead of accepting it.
    pub fn push(&self, request: Request) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => {
                request.resolve(Err(Error::Shutdown));
                return;
            }
        };
        if inner.closed {
            drop(inner);
            request.resolve(Err(Error::Shutdown));
        } else if inner.items.len() >= self.capacity {
            drop(inner);
            request.resolve(Err(Error::QueueFull));
        } else {
            inner.items.push_back(request);
            self.depth.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn pop(&self) -> Option<Request> {
        let mut inner = self.inner.lock().ok()?;
        let request = inner.items.pop_front();
        if request.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        request
    }

    /// Current number of queued requests.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Close the queue and drain everything still waiting. Returns the
    /// drained requests so the caller can resolve them.
    pub fn close(&self) -> Vec<Request> {
        let Ok(mut inner) = self.inner.lock() else {
            return Vec::new();
        };
        inner.closed = true;
        let drained: Vec<Request> = inner.items.drain(..).collect();
        self.depth.store(0, Ordering::Relaxed);
        drained
    }
}
