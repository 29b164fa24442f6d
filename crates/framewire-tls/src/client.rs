use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::{TlsConnector, client::TlsStream};

use crate::config::TlsClientConfig;
use crate::error::TlsError;

/// Performs `AuthenticateAsClient`: wraps `stream` in a TLS session and
/// drives the handshake to completion against `config`.
pub async fn connect(
    stream: TcpStream,
    config: &TlsClientConfig,
    server_name: &str,
) -> Result<TlsStream<TcpStream>, TlsError> {
    let name = ServerName::try_from(server_name.to_string())
        .map_err(|_| TlsError::InvalidServerName(server_name.to_string()))?;
    let connector = TlsConnector::from(config.client_config.clone());
    connector
        .connect(name, stream)
        .await
        .map_err(TlsError::Handshake)
}
