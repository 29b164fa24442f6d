//! TLS handshake helpers for the framewire TCP engine.
//!
//! [`client::connect`] and [`server::accept`] drive a `rustls` handshake to
//! completion over a plain `tokio::net::TcpStream` and hand back a
//! `tokio-rustls` stream that implements `AsyncRead + AsyncWrite` exactly
//! like the stream it wrapped — the TCP engine boxes whichever one it gets
//! behind the same trait object and never distinguishes plain from
//! encrypted again past construction.

mod client;
mod config;
mod error;
mod server;

pub use client::connect;
pub use config::{TlsClientConfig, TlsServerConfig};
pub use error::TlsError;
pub use server::accept;
