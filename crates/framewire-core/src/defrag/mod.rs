//! The frame defragmenter contract and its two reusable strategies.
//!
//! A defragmenter turns an arbitrary byte stream into a sequence of discrete
//! frames. It is deliberately stateless *between* calls: everything a call
//! needs to resume mid-frame is threaded explicitly through the `leftovers`
//! parameter and the `leftovers` field of [`DefragmenterOutput`], so a
//! `Defragmenter` can be shared behind an `Arc` and swapped out via
//! `switch_protocol` without synchronizing internal state.

mod length_prefixed;
mod mixed;

pub use length_prefixed::LengthPrefixedDefragmenter;
pub use mixed::{HeaderOutcome, MixedDefragmenter};

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::buffer::BufferView;
use crate::error::{FramewireError, ProtocolError};

/// Outcome of one `read_frame` call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadFrameStatus {
    /// A full frame was assembled; see [`DefragmenterOutput::frame_data`].
    FrameProduced,
    /// The buffered bytes were not a recoverable frame; the caller should
    /// discard leftovers and call again with a clean slate.
    FrameDropped,
    /// The stream reported EOF before a frame could be completed.
    StreamClosed,
}

/// Result of one `read_frame` call: a status, the frame body (when
/// produced), and any residual bytes to carry into the next call.
#[derive(Debug)]
pub struct DefragmenterOutput {
    pub status: ReadFrameStatus,
    pub frame_data: Option<BufferView>,
    pub leftovers: Option<BufferView>,
}

impl DefragmenterOutput {
    pub fn produced(frame_data: BufferView, leftovers: BufferView) -> Self {
        Self {
            status: ReadFrameStatus::FrameProduced,
            frame_data: Some(frame_data),
            leftovers: Some(leftovers),
        }
    }

    pub fn dropped() -> Self {
        Self {
            status: ReadFrameStatus::FrameDropped,
            frame_data: None,
            leftovers: None,
        }
    }

    pub fn stream_closed() -> Self {
        Self {
            status: ReadFrameStatus::StreamClosed,
            frame_data: None,
            leftovers: None,
        }
    }
}

/// Stateful reader that, given a peer's stream and a leftover buffer,
/// returns the next frame or a terminal status.
///
/// Implementations read zero or more chunks from `reader` until they can
/// return one of the three [`ReadFrameStatus`] outcomes. Cancellation must be
/// honoured at every read; on cancellation the call fails with
/// `ProtocolError` mapped through `FramewireError::Cancelled` by the caller
/// (the defragmenter itself only needs to propagate whatever the
/// underlying `AsyncRead` surfaces when `cancel` fires — see the strategies'
/// shared `read_at_least` helper).
///
/// `&self` rather than `&mut self`: all state needed to resume a partial
/// frame lives in `leftovers`, not in the defragmenter instance, so the same
/// instance can be shared behind an `Arc` for the `switch_protocol` handoff.
#[async_trait::async_trait]
pub trait Defragmenter: Send + Sync {
    async fn read_frame(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        leftovers: BufferView,
        cancel: &CancellationToken,
    ) -> Result<DefragmenterOutput, FramewireError>;
}

/// Reads from `reader` into `buf` (appending) until `buf.len() >= target` or
/// EOF/cancellation. Shared by both strategies below.
pub(crate) async fn read_at_least(
    reader: &mut (dyn AsyncRead + Send + Unpin),
    buf: &mut Vec<u8>,
    target: usize,
    cancel: &CancellationToken,
) -> Result<bool, FramewireError> {
    use tokio::io::AsyncReadExt;

    while buf.len() < target {
        let mut chunk = [0u8; 4096];
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FramewireError::Cancelled),
            res = reader.read(&mut chunk) => res,
        };
        match read {
            Ok(0) => return Ok(false),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(err) => return Err(FramewireError::Transport(err)),
        }
    }
    Ok(true)
}

/// Unhandled-error wrapping helper: a reader error the caller could not
/// classify as transport/EOF/cancellation propagates as
/// `ProtocolError::Unhandled`, matching §4.2/§7's "unhandled" error kind.
#[allow(dead_code)]
pub(crate) fn unhandled(message: impl Into<String>) -> FramewireError {
    FramewireError::Protocol(ProtocolError::Unhandled(message.into()))
}
