//! Transport-agnostic contracts shared by the framewire TCP and UDP engines.
//!
//! This crate defines the pieces that do not care whether bytes arrive over
//! a stream or a datagram socket: a non-owning [`BufferView`] over shared
//! bytes, the outgoing-item envelopes queued for a single writer worker, the
//! [`queue::BoundedQueue`] that gives that worker its ordering and
//! backpressure guarantees, the [`defrag::Defragmenter`] contract and its two
//! reusable strategies, and the error/close-reason vocabulary the transport
//! crates report through.

pub mod buffer;
pub mod defrag;
pub mod error;
pub mod outgoing;
pub mod queue;

pub use buffer::BufferView;
pub use defrag::{Defragmenter, DefragmenterOutput, HeaderOutcome, LengthPrefixedDefragmenter, MixedDefragmenter, ReadFrameStatus};
pub use error::{CloseReason, FramewireError, ProtocolError};
pub use outgoing::{OutgoingTcpItem, OutgoingUdpItem, SendOutcome};
pub use queue::BoundedQueue;
