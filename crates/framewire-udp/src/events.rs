use std::net::SocketAddr;
use std::sync::Arc;

use framewire_core::{BufferView, FramewireError};

/// Events published by [`crate::UdpClient`].
#[derive(Debug)]
pub enum UdpClientEvent {
    /// The socket finished binding/connecting and is ready to send.
    Ready { target: SocketAddr },
    Started,
    Stopped,
    PacketArrived { from: SocketAddr, data: BufferView },
    SendError { partial: usize, error: Option<Arc<FramewireError>> },
    Exception(Arc<FramewireError>),
}

/// Events published by [`crate::UdpServer`].
#[derive(Debug)]
pub enum UdpServerEvent {
    Started { local_addr: SocketAddr },
    Stopped,
    PacketArrived { from: SocketAddr, data: BufferView },
    SendError { partial: usize, error: Option<Arc<FramewireError>> },
    Exception(Arc<FramewireError>),
}
