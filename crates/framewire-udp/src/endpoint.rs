use std::net::SocketAddr;
use std::sync::Arc;

use framewire_core::queue::{Cancelled, QueueCapacity};
use framewire_core::{BoundedQueue, BufferView, OutgoingUdpItem, SendOutcome};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Shared send worker and producer API for both UDP roles (spec §4.7): the
/// receive loop is driven separately by `client.rs`/`server.rs` since the
/// event type and "who resolved the socket" bookkeeping differ between
/// them, but the send side is identical regardless of role.
pub(crate) struct UdpEndpoint {
    socket_tag: Arc<str>,
    send_queue: BoundedQueue<OutgoingUdpItem>,
    cancel: CancellationToken,
}

impl UdpEndpoint {
    pub(crate) fn new(
        socket: Arc<UdpSocket>,
        local_tag: impl Into<Arc<str>>,
        max_send_queue_size: Option<usize>,
        cancel: CancellationToken,
        on_send_error: Arc<dyn Fn(usize, Option<std::io::Error>) + Send + Sync>,
    ) -> Self {
        let capacity = match max_send_queue_size {
            Some(n) => QueueCapacity::Bounded(n),
            None => QueueCapacity::Unbounded,
        };

        let send_queue = BoundedQueue::spawn(capacity, move |item: OutgoingUdpItem| {
            let socket = Arc::clone(&socket);
            let on_send_error = Arc::clone(&on_send_error);
            async move {
                if item.cancel.is_cancelled() {
                    item.resolve(SendOutcome::Cancelled);
                    return;
                }
                let declared_len = item.payload.len();
                let destination = item.destination;
                match socket.send_to(item.payload.as_slice(), destination).await {
                    Ok(sent) if sent == declared_len => item.resolve(SendOutcome::Sent),
                    Ok(sent) => {
                        on_send_error(sent, None);
                        item.resolve(SendOutcome::Partial(sent));
                    }
                    Err(err) => {
                        warn!(destination = %destination, error = %err, "udp send failed");
                        on_send_error(0, Some(err));
                        // Bug fix (spec §9, "dangling completion promise"): the
                        // original resolved nothing here, leaving a `send`
                        // caller hung until the outer cancel fired. Resolving
                        // to `Failed` lets that caller return promptly.
                        item.resolve(SendOutcome::Failed);
                    }
                }
            }
        });

        Self {
            socket_tag: local_tag.into(),
            send_queue,
            cancel,
        }
    }

    pub(crate) fn socket_tag(&self) -> &Arc<str> {
        &self.socket_tag
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Non-blocking enqueue; no completion tracking.
    pub(crate) fn post(&self, destination: SocketAddr, payload: BufferView) -> bool {
        self.send_queue
            .try_post(OutgoingUdpItem::new(destination, payload, self.cancel.clone(), None))
    }

    /// Enqueues, waiting for room, then awaits the worker's completion
    /// promise so the caller observes the true end-to-end send status.
    pub(crate) async fn send(
        &self,
        destination: SocketAddr,
        payload: BufferView,
        cancel: &CancellationToken,
    ) -> Result<SendOutcome, Cancelled> {
        let (tx, rx) = oneshot::channel();
        let enqueued = self
            .send_queue
            .send(
                OutgoingUdpItem::new(destination, payload, cancel.clone(), Some(tx)),
                cancel,
            )
            .await?;
        if !enqueued {
            return Ok(SendOutcome::Failed);
        }
        Ok(rx.await.unwrap_or(SendOutcome::Cancelled))
    }

    /// Enqueues, waiting for room, but hands back the completion receiver
    /// instead of awaiting it so the caller can poll on their own schedule.
    pub(crate) async fn add_to_send_queue(
        &self,
        destination: SocketAddr,
        payload: BufferView,
        cancel: &CancellationToken,
    ) -> Result<oneshot::Receiver<SendOutcome>, Cancelled> {
        let (tx, rx) = oneshot::channel();
        self.send_queue
            .send(
                OutgoingUdpItem::new(destination, payload, cancel.clone(), Some(tx)),
                cancel,
            )
            .await?;
        Ok(rx)
    }

    pub(crate) async fn teardown(&self) {
        self.send_queue.complete();
        self.send_queue.join().await;
    }
}
