use std::net::SocketAddr;
use std::sync::Arc;

use framewire_core::{BufferView, CloseReason, FramewireError};

use crate::peer::RemotePeer;

/// Per-peer lifecycle events, delivered both to the owning peer's
/// broadcast channel and, fanned out concurrently, to the owning engine's
/// channel (see `spec.md` §9, "event fan-out to two handlers in parallel" —
/// there is no ordering guarantee between the two sinks).
#[derive(Clone, Debug)]
pub enum PeerEvent {
    FrameArrived(BufferView),
    ConnectionClosed(CloseReason),
}

/// Engine-level events for a [`crate::client::TcpClient`].
///
/// Lifecycle events carry the `RemotePeer` itself, not just its address —
/// `post`/`send`/`switch_protocol`/`disconnect` are methods on that handle,
/// so a `FrameArrived` handler replies by calling straight back into the
/// `Arc<RemotePeer>` it was handed, without a side-table keyed by address.
#[derive(Clone, Debug)]
pub enum TcpClientEvent {
    ClientStarted,
    ClientStopped,
    ClientError(Arc<FramewireError>),
    ConnectionEstablished { peer: Arc<RemotePeer> },
    FrameArrived { peer: Arc<RemotePeer>, frame: BufferView },
    ConnectionClosed { peer: Arc<RemotePeer>, reason: CloseReason },
    RemotePeerError { peer_addr: SocketAddr, error: Arc<FramewireError> },
    UnhandledError { peer_addr: SocketAddr, error: Arc<FramewireError> },
}

/// Engine-level events for a [`crate::server::TcpServer`]. Mirrors
/// [`TcpClientEvent`] but without a single implied peer address for the
/// engine-scoped variants, since a server multiplexes many peers.
#[derive(Clone, Debug)]
pub enum TcpServerEvent {
    ServerStarted { local_addr: SocketAddr },
    ServerStopped,
    ServerError(Arc<FramewireError>),
    ConnectionEstablished { peer: Arc<RemotePeer> },
    FrameArrived { peer: Arc<RemotePeer>, frame: BufferView },
    ConnectionClosed { peer: Arc<RemotePeer>, reason: CloseReason },
    RemotePeerError { peer_addr: SocketAddr, error: Arc<FramewireError> },
    UnhandledError { peer_addr: SocketAddr, error: Arc<FramewireError> },
}
