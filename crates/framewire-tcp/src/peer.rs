use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use framewire_core::queue::{Cancelled, QueueCapacity};
use framewire_core::{BoundedQueue, BufferView, CloseReason, Defragmenter, OutgoingTcpItem};
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::DefragmenterFactory;
use crate::events::PeerEvent;
use crate::stream::BoxedStream;

/// An opaque, caller-supplied resource tied to a peer's lifetime — closed
/// exactly once, at teardown, alongside the stream and the send queue.
pub trait CustomResource: Send + Sync {
    fn close(&self);
}

const PEER_EVENT_CAPACITY: usize = 64;

/// One live TCP connection: the send-queue handle, the current
/// defragmenter, the close-reason latch, and per-peer event fan-out.
///
/// `RemotePeer` itself never touches the stream. The write half is captured
/// directly by the send-queue worker spawned in [`RemotePeer::spawn`]; the
/// read half is returned to the caller (the receive loop) rather than
/// stored here. This is the break in the cyclic-ownership the worker would
/// otherwise form with the peer (see `DESIGN.md`): the worker only ever
/// needs the write half and an error sink, never the peer.
pub struct RemotePeer {
    addr: SocketAddr,
    addr_tag: Arc<str>,
    send_queue: Arc<BoundedQueue<OutgoingTcpItem>>,
    defrag: ArcSwap<dyn Defragmenter>,
    close_reason: Arc<OnceLock<CloseReason>>,
    write_error: Arc<std::sync::Mutex<Option<std::io::Error>>>,
    cancel: CancellationToken,
    peer_events: broadcast::Sender<PeerEvent>,
    custom_resource: std::sync::Mutex<Option<Box<dyn CustomResource>>>,
}

/// Latches the first close reason and cancels, shared between `disconnect`
/// and the send-queue worker's write-failure path so neither has to reach
/// through a `RemotePeer` it doesn't own yet.
fn latch_close_reason(
    close_reason: &OnceLock<CloseReason>,
    cancel: &CancellationToken,
    reason: CloseReason,
) -> CloseReason {
    let _ = close_reason.set(reason);
    cancel.cancel();
    *close_reason.get().expect("just set or already set")
}

impl RemotePeer {
    /// Builds the peer, spawns its send-queue worker over `stream`'s write
    /// half, and hands back the read half for the receive loop to drive.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        addr: SocketAddr,
        stream: BoxedStream,
        defragmenter_factory: &DefragmenterFactory,
        max_send_queue_size: Option<usize>,
        engine_cancel: &CancellationToken,
        on_write_error: Arc<dyn Fn(SocketAddr, std::io::Error) + Send + Sync>,
    ) -> (Arc<Self>, ReadHalf<BoxedStream>) {
        let (read_half, write_half) = tokio::io::split(stream);
        let write_half = Arc::new(AsyncMutex::new(write_half));

        let capacity = match max_send_queue_size {
            Some(n) => QueueCapacity::Bounded(n),
            None => QueueCapacity::Unbounded,
        };

        // Built before `Self` exists so the worker can latch a disconnect
        // and stash the failing error without holding a reference back to
        // the peer (see the struct doc comment on cyclic ownership).
        let cancel = engine_cancel.child_token();
        let close_reason: Arc<OnceLock<CloseReason>> = Arc::new(OnceLock::new());
        let write_error: Arc<std::sync::Mutex<Option<std::io::Error>>> = Arc::new(std::sync::Mutex::new(None));

        let worker_cancel = cancel.clone();
        let worker_close_reason = Arc::clone(&close_reason);
        let worker_write_error = Arc::clone(&write_error);
        let send_queue = Arc::new(BoundedQueue::spawn(capacity, move |item: OutgoingTcpItem| {
            let write_half = Arc::clone(&write_half);
            let on_write_error = Arc::clone(&on_write_error);
            let cancel = worker_cancel.clone();
            let close_reason = Arc::clone(&worker_close_reason);
            let write_error = Arc::clone(&worker_write_error);
            async move {
                if item.cancel.is_cancelled() {
                    return;
                }
                let mut guard = write_half.lock().await;
                if let Err(err) = guard.write_all(item.payload.as_slice()).await {
                    let stored = std::io::Error::new(err.kind(), err.to_string());
                    let mut slot = write_error.lock().expect("write error lock poisoned");
                    if slot.is_none() {
                        *slot = Some(stored);
                    }
                    drop(slot);
                    latch_close_reason(&close_reason, &cancel, CloseReason::Unknown);
                    on_write_error(addr, err);
                }
            }
        }));

        let (peer_events, _) = broadcast::channel(PEER_EVENT_CAPACITY);
        let addr_tag: Arc<str> = Arc::from(addr.to_string());

        let peer = Arc::new(Self {
            addr,
            addr_tag,
            send_queue,
            defrag: ArcSwap::from(defragmenter_factory()),
            close_reason,
            write_error,
            cancel,
            peer_events,
            custom_resource: std::sync::Mutex::new(None),
        });

        (peer, read_half)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.peer_events.subscribe()
    }

    pub(crate) fn emit(&self, event: PeerEvent) {
        let _ = self.peer_events.send(event);
    }

    /// Current defragmenter, reloaded once per receive-loop iteration.
    pub(crate) fn current_defragmenter(&self) -> Arc<dyn Defragmenter> {
        self.defrag.load_full()
    }

    /// Non-blocking enqueue; `false` if the queue is closed or at capacity.
    pub fn post(&self, payload: BufferView) -> bool {
        self.send_queue.try_post(OutgoingTcpItem::new(
            Arc::clone(&self.addr_tag),
            payload,
            self.cancel.clone(),
        ))
    }

    /// Enqueues, waiting for room. `Ok(false)` means the queue was already
    /// closed; `Err(Cancelled)` means `cancel` fired first.
    pub async fn send(
        &self,
        payload: BufferView,
        cancel: &CancellationToken,
    ) -> Result<bool, Cancelled> {
        self.send_queue
            .send(
                OutgoingTcpItem::new(Arc::clone(&self.addr_tag), payload, cancel.clone()),
                cancel,
            )
            .await
    }

    /// Atomically replaces the current defragmenter. Effective no later
    /// than the receive loop's next `read_frame` call; an in-flight read is
    /// never interrupted, and the previous defragmenter's leftovers are
    /// discarded on switch.
    pub fn switch_protocol(&self, factory: DefragmenterFactory) {
        self.defrag.store(factory());
    }

    /// Sets the close-reason latch if still unset, then triggers local
    /// cancellation. Returns the reason now latched (the first one written,
    /// regardless of whether this call won the race).
    pub fn disconnect(&self, reason: CloseReason) -> CloseReason {
        latch_close_reason(&self.close_reason, &self.cancel, reason)
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Takes the error from the most recent failed write, if any. Consumed
    /// once by the owning engine task after teardown so a write failure
    /// (which disconnects the peer from inside the send-queue worker, not
    /// the receive loop) can still be reported as a `remote-peer-error`.
    pub(crate) fn take_write_error(&self) -> Option<std::io::Error> {
        self.write_error.lock().expect("write error lock poisoned").take()
    }

    pub fn set_custom_resource(&self, resource: Box<dyn CustomResource>) {
        let mut guard = self
            .custom_resource
            .lock()
            .expect("custom resource lock poisoned");
        *guard = Some(resource);
    }

    /// Closes the custom resource (if any) and completes the send queue.
    /// Called once by the owning engine task during teardown.
    pub(crate) async fn teardown(&self) {
        if let Some(resource) = self
            .custom_resource
            .lock()
            .expect("custom resource lock poisoned")
            .take()
        {
            resource.close();
        }
        self.send_queue.complete();
        self.send_queue.join().await;
    }
}

impl std::fmt::Debug for RemotePeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePeer")
            .field("addr", &self.addr)
            .field("close_reason", &self.close_reason.get())
            .finish()
    }
}

pub(crate) fn warn_write_failed(addr: SocketAddr, err: &std::io::Error) {
    warn!(peer = %addr, error = %err, "send queue worker failed to write frame");
}

#[cfg(test)]
mod tests {
    use super::*;
    use framewire_core::LengthPrefixedDefragmenter;
    use tokio::io::AsyncReadExt;

    fn noop_defragmenter_factory() -> DefragmenterFactory {
        Arc::new(|| Arc::new(LengthPrefixedDefragmenter::u32_le(4096)))
    }

    fn no_write_error_sink() -> Arc<dyn Fn(SocketAddr, std::io::Error) + Send + Sync> {
        Arc::new(|_, _| {})
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn post_writes_bytes_to_the_stream_in_enqueue_order() {
        let (near_side, mut far_side) = tokio::io::duplex(256);
        let engine_cancel = CancellationToken::new();
        let (peer, _read_half) = RemotePeer::spawn(
            "127.0.0.1:1".parse().unwrap(),
            Box::new(near_side),
            &noop_defragmenter_factory(),
            None,
            &engine_cancel,
            no_write_error_sink(),
        );

        assert!(peer.post(BufferView::new(b"one".to_vec())));
        assert!(peer.post(BufferView::new(b"two".to_vec())));

        let mut buf = [0u8; 6];
        far_side.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"onetwo");

        peer.teardown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_waits_for_room_and_reports_enqueue_success() {
        let (near_side, mut far_side) = tokio::io::duplex(256);
        let engine_cancel = CancellationToken::new();
        let (peer, _read_half) = RemotePeer::spawn(
            "127.0.0.1:1".parse().unwrap(),
            Box::new(near_side),
            &noop_defragmenter_factory(),
            None,
            &engine_cancel,
            no_write_error_sink(),
        );

        let external_cancel = CancellationToken::new();
        let enqueued = peer.send(BufferView::new(b"ping".to_vec()), &external_cancel).await;
        assert!(enqueued.unwrap());

        let mut buf = [0u8; 4];
        far_side.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        peer.teardown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disconnect_is_idempotent_and_keeps_the_first_reason() {
        let (near_side, _far_side) = tokio::io::duplex(64);
        let engine_cancel = CancellationToken::new();
        let (peer, _read_half) = RemotePeer::spawn(
            "127.0.0.1:1".parse().unwrap(),
            Box::new(near_side),
            &noop_defragmenter_factory(),
            None,
            &engine_cancel,
            no_write_error_sink(),
        );

        let first = peer.disconnect(CloseReason::Timeout);
        let second = peer.disconnect(CloseReason::LocalShutdown);
        assert_eq!(first, CloseReason::Timeout);
        assert_eq!(second, CloseReason::Timeout);
        assert!(peer.cancel_token().is_cancelled());

        peer.teardown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn a_failed_write_disconnects_the_peer_and_latches_the_error() {
        let (near_side, far_side) = tokio::io::duplex(8);
        drop(far_side);
        let engine_cancel = CancellationToken::new();
        let (peer, _read_half) = RemotePeer::spawn(
            "127.0.0.1:1".parse().unwrap(),
            Box::new(near_side),
            &noop_defragmenter_factory(),
            None,
            &engine_cancel,
            no_write_error_sink(),
        );

        peer.post(BufferView::new(b"anything".to_vec()));

        // Give the send-queue worker a chance to observe the write failure.
        for _ in 0..50 {
            if peer.cancel_token().is_cancelled() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(peer.cancel_token().is_cancelled(), "a write failure must disconnect the peer");
        assert_eq!(peer.close_reason(), Some(CloseReason::Unknown));
        assert!(peer.take_write_error().is_some(), "the failing error must be retrievable once");
        assert!(peer.take_write_error().is_none(), "take_write_error only yields the error once");

        peer.teardown().await;
    }
}
