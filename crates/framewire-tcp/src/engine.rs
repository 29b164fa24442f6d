use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use framewire_core::{BufferView, CloseReason, DefragmenterOutput, FramewireError, ProtocolError, ReadFrameStatus};
use tokio_util::sync::CancellationToken;

use crate::config::DefragmenterFactory;
use crate::events::PeerEvent;
use crate::peer::{RemotePeer, warn_write_failed};
use crate::stream::BoxedStream;

pub(crate) struct PeerSessionOutcome {
    pub peer: Arc<RemotePeer>,
    pub close_reason: CloseReason,
    pub unhandled_error: Option<FramewireError>,
    pub transport_error: Option<FramewireError>,
}

/// Shared post-connect handler and receive loop (`spec.md` §4.5–§4.6).
///
/// Builds the [`RemotePeer`] over `stream` (already TLS-wrapped by the
/// caller when TLS is enabled), then drives frames out of it until the
/// defragmenter reports `StreamClosed`, the engine cancels, or the
/// per-cycle timeout elapses — at which point the close reason is latched,
/// `connection-closed` fires, and the peer's send queue is drained and
/// joined before returning.
pub(crate) async fn run_peer_session(
    addr: SocketAddr,
    stream: BoxedStream,
    defragmenter_factory: &DefragmenterFactory,
    max_send_queue_size: Option<usize>,
    connection_timeout: Option<Duration>,
    engine_cancel: &CancellationToken,
    mut on_established: impl FnMut(&Arc<RemotePeer>),
    mut on_frame: impl FnMut(&Arc<RemotePeer>, BufferView),
) -> PeerSessionOutcome {
    let on_write_error: Arc<dyn Fn(SocketAddr, std::io::Error) + Send + Sync> =
        Arc::new(|peer_addr, err| warn_write_failed(peer_addr, &err));

    let (peer, mut read_half) = RemotePeer::spawn(
        addr,
        stream,
        defragmenter_factory,
        max_send_queue_size,
        engine_cancel,
        on_write_error,
    );
    on_established(&peer);

    let mut leftovers = BufferView::empty();
    let mut unhandled_error = None;
    let mut transport_error = None;

    let close_reason = loop {
        if peer.cancel_token().is_cancelled() {
            break peer.disconnect(CloseReason::LocalShutdown);
        }

        let defragmenter = peer.current_defragmenter();
        let read_fut =
            defragmenter.read_frame(&mut read_half, leftovers.clone(), peer.cancel_token());
        tokio::pin!(read_fut);

        let step = match connection_timeout {
            Some(timeout) => tokio::select! {
                biased;
                res = &mut read_fut => Step::Frame(res),
                _ = tokio::time::sleep(timeout) => Step::TimedOut,
            },
            None => Step::Frame(read_fut.await),
        };

        match step {
            Step::TimedOut => break peer.disconnect(CloseReason::Timeout),
            Step::Frame(Ok(DefragmenterOutput {
                status: ReadFrameStatus::FrameProduced,
                frame_data,
                leftovers: next_leftovers,
            })) => {
                let frame = frame_data.expect("FrameProduced always carries frame_data");
                leftovers = next_leftovers.unwrap_or_else(BufferView::empty);
                peer.emit(PeerEvent::FrameArrived(frame.clone()));
                on_frame(&peer, frame);
            }
            Step::Frame(Ok(DefragmenterOutput {
                status: ReadFrameStatus::FrameDropped,
                ..
            })) => {
                leftovers = BufferView::empty();
            }
            Step::Frame(Ok(DefragmenterOutput {
                status: ReadFrameStatus::StreamClosed,
                ..
            })) => break peer.disconnect(CloseReason::RemoteShutdown),
            Step::Frame(Err(FramewireError::Cancelled)) => {
                break peer.disconnect(CloseReason::LocalShutdown);
            }
            Step::Frame(Err(err @ FramewireError::Protocol(ProtocolError::Unhandled(_)))) => {
                unhandled_error = Some(err);
                break peer.disconnect(CloseReason::Unknown);
            }
            Step::Frame(Err(err @ FramewireError::Transport(_))) => {
                transport_error = Some(err);
                break peer.disconnect(CloseReason::Unknown);
            }
            Step::Frame(Err(_other)) => break peer.disconnect(CloseReason::Unknown),
        }
    };

    peer.emit(PeerEvent::ConnectionClosed(close_reason));
    peer.teardown().await;

    // A write failure disconnects the peer from inside the send-queue
    // worker rather than from this loop, so it never takes the
    // `Step::Frame(Err(...))` arms above — pick it up here, after `teardown`
    // guarantees the worker has finished and stashed it.
    let transport_error = transport_error.or_else(|| peer.take_write_error().map(FramewireError::Transport));

    PeerSessionOutcome {
        peer,
        close_reason,
        unhandled_error,
        transport_error,
    }
}

enum Step {
    Frame(Result<DefragmenterOutput, FramewireError>),
    TimedOut,
}
