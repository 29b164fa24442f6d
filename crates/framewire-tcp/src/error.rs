use std::io;

use framewire_core::FramewireError;
use thiserror::Error;

/// TCP-engine-specific error taxonomy. Every variant has a lossless
/// conversion into [`FramewireError`] at the point an event is emitted, so
/// callers outside this crate only ever see the shared taxonomy.
#[derive(Debug, Error)]
pub enum TcpError {
    #[error("failed to resolve {host}:{port}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("address list for {host}:{port} was empty after filtering")]
    NoUsableAddress { host: String, port: u16 },
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to accept an inbound connection")]
    Accept(#[source] io::Error),
    #[error("TLS handshake failed")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<TcpError> for FramewireError {
    fn from(err: TcpError) -> Self {
        match err {
            TcpError::Resolve { source, .. } | TcpError::Accept(source) => {
                FramewireError::Transport(source)
            }
            TcpError::Bind { source, .. } | TcpError::Connect { source, .. } => {
                FramewireError::Transport(source)
            }
            TcpError::NoUsableAddress { host, port } => FramewireError::Transport(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no usable address for {host}:{port}"),
            )),
            TcpError::Tls(source) => FramewireError::Auth(source.to_string()),
        }
    }
}
