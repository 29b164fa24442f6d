use std::future::Future;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-queue capacity: a fixed positive bound, or unbounded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueueCapacity {
    Bounded(usize),
    Unbounded,
}

impl QueueCapacity {
    /// Maps the spec's `-1 = unbounded` convention onto [`QueueCapacity`].
    pub fn from_config(max_size: i64) -> Self {
        if max_size < 0 {
            QueueCapacity::Unbounded
        } else {
            QueueCapacity::Bounded(max_size.max(1) as usize)
        }
    }
}

enum Sender<T> {
    Bounded(mpsc::Sender<T>),
    Unbounded(mpsc::UnboundedSender<T>),
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        match self {
            Sender::Bounded(tx) => Sender::Bounded(tx.clone()),
            Sender::Unbounded(tx) => Sender::Unbounded(tx.clone()),
        }
    }
}

/// Single-consumer, multi-producer bounded FIFO driving one worker.
///
/// `BoundedQueue` is the ordering primitive behind every `post`/`send` call
/// the library exposes: items enqueued successfully on the same queue are
/// handed to the worker strictly in enqueue order, one at a time, and the
/// worker is awaited to completion before the next item starts. This is what
/// lets a single peer serialize writes onto a stream (TLS writes in
/// particular are not safe to interleave) while still allowing arbitrary
/// tasks to call `post`/`send` concurrently.
///
/// On `complete()`, the queue stops accepting new items and drops its
/// retained sender; the worker drains whatever was already buffered and then
/// exits once `recv()` observes the channel closing. This is the "drain
/// remaining" choice the spec calls out as the reference behavior — it
/// preserves the ordering guarantee for every caller who successfully
/// enqueued before `complete()` was called.
pub struct BoundedQueue<T> {
    sender: Mutex<Option<Sender<T>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> BoundedQueue<T> {
    /// Spawns the worker task and returns a handle producers enqueue onto.
    ///
    /// `f` is invoked once per item, awaited to completion before the next
    /// item is taken off the queue. A failure inside `f` must not halt the
    /// queue — `f` is responsible for reporting its own errors through
    /// whatever side channel the caller wired up (an event sink, typically).
    pub fn spawn<F, Fut>(capacity: QueueCapacity, f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        match capacity {
            QueueCapacity::Bounded(cap) => {
                let (tx, mut rx) = mpsc::channel::<T>(cap);
                let worker = tokio::spawn(async move {
                    while let Some(item) = rx.recv().await {
                        f(item).await;
                    }
                    debug!("bounded send queue drained, worker exiting");
                });
                Self {
                    sender: Mutex::new(Some(Sender::Bounded(tx))),
                    worker: Mutex::new(Some(worker)),
                }
            }
            QueueCapacity::Unbounded => {
                let (tx, mut rx) = mpsc::unbounded_channel::<T>();
                let worker = tokio::spawn(async move {
                    while let Some(item) = rx.recv().await {
                        f(item).await;
                    }
                    debug!("unbounded send queue drained, worker exiting");
                });
                Self {
                    sender: Mutex::new(Some(Sender::Unbounded(tx))),
                    worker: Mutex::new(Some(worker)),
                }
            }
        }
    }

    /// Non-blocking enqueue. Succeeds iff the queue is open and (for bounded
    /// queues) has room; never awaits.
    pub fn try_post(&self, item: T) -> bool {
        let guard = self.sender.lock().expect("send queue sender lock poisoned");
        match guard.as_ref() {
            Some(Sender::Bounded(tx)) => tx.try_send(item).is_ok(),
            Some(Sender::Unbounded(tx)) => tx.send(item).is_ok(),
            None => false,
        }
    }

    /// Enqueues `item`, waiting for room if the queue is bounded and full.
    ///
    /// Returns `Ok(true)` once enqueued, `Ok(false)` if the queue was
    /// already closed, and `Err(())` if `cancel` fires first. Per the
    /// engine-vs-external cancellation contract, callers that link this to
    /// engine shutdown should fold `Err(())` back into a benign `false`
    /// themselves when the engine token (rather than an external one) is
    /// what fired.
    pub async fn send(&self, item: T, cancel: &CancellationToken) -> Result<bool, Cancelled> {
        let sender = {
            let guard = self.sender.lock().expect("send queue sender lock poisoned");
            guard.clone()
        };
        let Some(sender) = sender else {
            return Ok(false);
        };
        match sender {
            Sender::Bounded(tx) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Cancelled),
                res = tx.send(item) => Ok(res.is_ok()),
            },
            Sender::Unbounded(tx) => Ok(tx.send(item).is_ok()),
        }
    }

    /// Closes the queue to new admissions. Already-enqueued items are
    /// drained by the worker before it exits; `f` is not interrupted
    /// mid-item.
    pub fn complete(&self) {
        let sender = self
            .sender
            .lock()
            .expect("send queue sender lock poisoned")
            .take();
        if sender.is_none() {
            warn!("send queue completed twice; ignoring duplicate call");
        }
    }

    /// Awaits the worker task's exit. Useful during peer teardown to ensure
    /// all buffered writes have actually reached the stream before the
    /// stream itself is dropped.
    pub async fn join(&self) {
        let handle = self.worker.lock().expect("send queue worker lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// Producer-observed cancellation from [`BoundedQueue::send`].
#[derive(Debug)]
pub struct Cancelled;
