use thiserror::Error;

/// TLS handshake failures, reported to the TCP engine as
/// `FramewireError::Auth` (see `spec.md` §7 — "AuthError ... terminates the
/// affected peer before connection-established is emitted").
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),
}
