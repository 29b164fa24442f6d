//! Connectionless datagram pipeline: bind/connect, a receive loop, and the
//! same bounded-send-queue discipline the TCP side uses, applied one
//! datagram at a time instead of to a byte stream.
//!
//! There is no library-defined framing here — a datagram is the unit of
//! both send and receive, and the caller supplies whatever structure its
//! protocol needs on top.

mod client;
mod config;
mod endpoint;
mod error;
mod events;
mod server;

pub use client::UdpClient;
pub use config::{
    ConfigureSocket, JoinMulticastGroupCallback, LeaveMulticastGroupCallback, MulticastGroup,
    SelectAddress, UdpClientConfig, UdpServerConfig,
};
pub use error::UdpError;
pub use events::{UdpClientEvent, UdpServerEvent};
pub use server::UdpServer;
