//! TCP connection pipeline: accept/connect, optional TLS handshake, framed
//! receive loop, ordered send queue, teardown with a classified close
//! reason.
//!
//! The client and server engines share one post-connect handler and
//! receive loop (see [`engine::run_peer_session`]) — the only difference
//! between them is how they obtain the raw `TcpStream` in the first place.

mod client;
mod config;
mod engine;
mod error;
mod events;
mod peer;
mod server;
mod stream;

pub use client::TcpClient;
pub use config::{AddressFilter, ConfigureSocket, DefragmenterFactory, TcpClientConfig, TcpServerConfig};
pub use error::TcpError;
pub use events::{PeerEvent, TcpClientEvent, TcpServerEvent};
pub use peer::{CustomResource, RemotePeer};
pub use server::TcpServer;
pub use stream::{AsyncStream, BoxedStream};
