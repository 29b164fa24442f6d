use std::io;

/// The classified cause of a peer's or endpoint's termination.
///
/// The close-reason latch (held by `RemotePeer` and the UDP endpoints) is
/// written at most once and defaults to `Unknown` until teardown sets it —
/// callers should never observe `Unknown` as anything other than "teardown
/// raced ahead of classification", which the receive loop is responsible for
/// preventing (see `DESIGN.md`, "close-reason always set" decision).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CloseReason {
    /// The remote end closed the stream (clean EOF).
    RemoteShutdown,
    /// `disconnect` was called locally, or the engine was cancelled.
    LocalShutdown,
    /// The per-cycle `ConnectionTimeout` elapsed with no frame produced.
    Timeout,
    /// Default/fallback value; a correct implementation sets a more specific
    /// reason before emitting `connection-closed`.
    Unknown,
}

impl Default for CloseReason {
    fn default() -> Self {
        CloseReason::Unknown
    }
}

/// Unified error taxonomy surfaced by the framewire crates.
///
/// Every fallible public entry point returns `Result<T, FramewireError>`
/// rather than a bare `std::io::Error`, so callers get one vocabulary
/// regardless of whether the failure originated in a socket read, a TLS
/// handshake, or a user-supplied defragmenter.
#[derive(Debug, thiserror::Error)]
pub enum FramewireError {
    /// Socket read/write/accept/connect/bind failure.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// TLS handshake or certificate validation failure.
    #[error("tls handshake failed: {0}")]
    Auth(String),

    /// A defragmenter raised an error it could not itself recover from.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The operation observed cancellation before it could complete.
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors specific to frame reassembly.
///
/// `FrameDropped` is deliberately *not* a variant here: per contract it is a
/// recoverable outcome the defragmenter reports through
/// [`crate::defrag::ReadFrameStatus`], not a thrown error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The stream closed (EOF) before a frame could be completed.
    #[error("stream closed before frame completed")]
    StreamClosed,

    /// The defragmenter raised an error outside the header/length/EOF
    /// vocabulary it is expected to reason about (e.g. a panic caught at the
    /// boundary, or a user callback returning an inconsistent result). The
    /// engine treats this as `CloseReason::Unknown` and emits
    /// `unhandled-error`, per spec §4.6 and §7.
    #[error("unhandled defragmenter error: {0}")]
    Unhandled(String),
}

impl FramewireError {
    /// True when this error represents cooperative cancellation rather than
    /// a genuine transport/protocol failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FramewireError::Cancelled)
    }
}
