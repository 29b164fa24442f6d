use std::io;

use framewire_core::FramewireError;
use thiserror::Error;

/// Transport-layer failures specific to a UDP endpoint's setup path.
#[derive(Debug, Error)]
pub enum UdpError {
    #[error("failed to resolve {host}:{port}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("{host}:{port} resolved to no usable address")]
    NoUsableAddress { host: String, port: u16 },

    #[error("failed to bind UDP socket on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect UDP socket to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to join multicast group {group}")]
    JoinMulticast {
        group: String,
        #[source]
        source: io::Error,
    },

    #[error("datagram recv failed")]
    Recv(#[source] io::Error),
}

impl From<UdpError> for FramewireError {
    fn from(err: UdpError) -> Self {
        match err {
            UdpError::Resolve { .. } | UdpError::NoUsableAddress { .. } => {
                FramewireError::Transport(io::Error::new(io::ErrorKind::AddrNotAvailable, err.to_string()))
            }
            UdpError::Bind { source, .. } | UdpError::Connect { source, .. } | UdpError::Recv(source) => {
                FramewireError::Transport(source)
            }
            UdpError::JoinMulticast { source, .. } => FramewireError::Transport(source),
        }
    }
}
