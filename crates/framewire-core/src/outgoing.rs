use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::buffer::BufferView;

/// One item queued for a TCP peer's send worker.
///
/// Lifecycle: created by a `post`/`send` call, consumed exactly once by the
/// worker, then dropped. The worker only needs the peer's write half and
/// error sink, not the peer itself — `target` carries just enough identity
/// for logging/diagnostics, breaking the ownership cycle a full peer
/// back-reference would create (see `DESIGN.md`, "cyclic ownership").
pub struct OutgoingTcpItem {
    pub target: Arc<str>,
    pub payload: BufferView,
    pub cancel: CancellationToken,
}

impl OutgoingTcpItem {
    pub fn new(target: Arc<str>, payload: BufferView, cancel: CancellationToken) -> Self {
        Self {
            target,
            payload,
            cancel,
        }
    }
}

/// Outcome of a single UDP send, delivered through the item's completion
/// promise so a `send`-style caller can observe true end-to-end status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendOutcome {
    Sent,
    Partial(usize),
    Cancelled,
    Failed,
}

/// One item queued for a UDP endpoint's send worker.
pub struct OutgoingUdpItem {
    pub destination: SocketAddr,
    pub payload: BufferView,
    pub cancel: CancellationToken,
    pub completion: Option<oneshot::Sender<SendOutcome>>,
}

impl OutgoingUdpItem {
    pub fn new(
        destination: SocketAddr,
        payload: BufferView,
        cancel: CancellationToken,
        completion: Option<oneshot::Sender<SendOutcome>>,
    ) -> Self {
        Self {
            destination,
            payload,
            cancel,
            completion,
        }
    }

    /// Resolves the completion promise, if the producer is awaiting one.
    /// Swallows the case where the producer already dropped its receiver.
    pub fn resolve(self, outcome: SendOutcome) {
        if let Some(tx) = self.completion {
            let _ = tx.send(outcome);
        }
    }
}
