use tokio::net::TcpStream;
use tokio_rustls::{TlsAcceptor, server::TlsStream};

use crate::config::TlsServerConfig;
use crate::error::TlsError;

/// Performs `AuthenticateAsServer`: wraps `stream` in a TLS session and
/// drives the handshake to completion against `config`.
pub async fn accept(
    stream: TcpStream,
    config: &TlsServerConfig,
) -> Result<TlsStream<TcpStream>, TlsError> {
    let acceptor = TlsAcceptor::from(config.server_config.clone());
    acceptor.accept(stream).await.map_err(TlsError::Handshake)
}
