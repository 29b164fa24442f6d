use tokio::io::{AsyncRead, AsyncWrite};

/// A connection's byte stream, plain or TLS, behind one object-safe trait
/// so [`crate::peer::RemotePeer`] never needs to know which it has.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + ?Sized> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;
