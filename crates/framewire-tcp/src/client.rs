use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpStream, lookup_host};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::TcpClientConfig;
use crate::engine::run_peer_session;
use crate::error::TcpError;
use crate::events::TcpClientEvent;
use crate::stream::BoxedStream;

/// TCP client engine (`spec.md` §4.4): resolve, connect, optionally
/// handshake TLS, then hand off to the shared post-connect/receive-loop
/// pipeline in [`crate::engine`].
pub struct TcpClient {
    config: TcpClientConfig,
}

impl TcpClient {
    pub fn new(config: TcpClientConfig) -> Self {
        Self { config }
    }

    /// Spawns the client's run loop and returns its event stream. The
    /// client always emits `ClientStarted` first and `ClientStopped` last,
    /// regardless of how it exits.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> mpsc::UnboundedReceiver<TcpClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move { self.run(cancel, tx).await });
        rx
    }

    async fn run(&self, cancel: CancellationToken, tx: mpsc::UnboundedSender<TcpClientEvent>) {
        let _ = tx.send(TcpClientEvent::ClientStarted);

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = tx.send(TcpClientEvent::ClientStopped);
                return;
            }
            res = lookup_host((self.config.target_hostname.as_str(), self.config.target_port)) => res,
        };

        let addrs: Vec<SocketAddr> = match resolved {
            Ok(iter) => iter.collect(),
            Err(err) => {
                self.fail_and_stop(&tx, TcpError::Resolve {
                    host: self.config.target_hostname.clone(),
                    port: self.config.target_port,
                    source: err,
                });
                return;
            }
        };

        // `spec.md` §9: the likely-bug source checks `addrs != null ||
        // addrs.Length > 0`, where `&&` was clearly intended — both a null
        // and an empty resolution result mean "nothing usable", so an empty
        // list here (post-filter) always falls to the same terminal path.
        let filtered = (self.config.filter_resolved_addresses)(&addrs);
        if filtered.is_empty() {
            self.fail_and_stop(&tx, TcpError::NoUsableAddress {
                host: self.config.target_hostname.clone(),
                port: self.config.target_port,
            });
            return;
        }

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = tx.send(TcpClientEvent::ClientStopped);
                return;
            }
            res = connect_first(&filtered) => res,
        };

        let stream = match connected {
            Ok(stream) => stream,
            Err(err) => {
                self.fail_and_stop(&tx, TcpError::Connect {
                    addr: filtered.first().map(SocketAddr::to_string).unwrap_or_default(),
                    source: err,
                });
                return;
            }
        };

        if let Some(configure) = &self.config.configure_socket {
            configure(&stream);
        }
        let peer_addr = stream.peer_addr().unwrap_or(filtered[0]);

        let boxed: BoxedStream = {
            #[cfg(feature = "tls")]
            {
                match &self.config.tls {
                    Some(tls) => {
                        match framewire_tls::connect(stream, tls, &self.config.target_hostname).await {
                            Ok(tls_stream) => Box::new(tls_stream) as BoxedStream,
                            Err(err) => {
                                self.fail_and_stop(&tx, TcpError::Tls(Box::new(err)));
                                return;
                            }
                        }
                    }
                    None => Box::new(stream) as BoxedStream,
                }
            }
            #[cfg(not(feature = "tls"))]
            {
                Box::new(stream) as BoxedStream
            }
        };

        let tx_established = tx.clone();
        let tx_frame = tx.clone();
        let outcome = run_peer_session(
            peer_addr,
            boxed,
            &self.config.defragmenter_factory,
            self.config.max_send_queue_size,
            self.config.connection_timeout,
            &cancel,
            move |peer| {
                let _ = tx_established.send(TcpClientEvent::ConnectionEstablished { peer: Arc::clone(peer) });
            },
            move |peer, frame| {
                let _ = tx_frame.send(TcpClientEvent::FrameArrived { peer: Arc::clone(peer), frame });
            },
        )
        .await;

        if let Some(err) = outcome.transport_error {
            let _ = tx.send(TcpClientEvent::RemotePeerError {
                peer_addr,
                error: Arc::new(err),
            });
        }
        let _ = tx.send(TcpClientEvent::ConnectionClosed {
            peer: Arc::clone(&outcome.peer),
            reason: outcome.close_reason,
        });
        if let Some(err) = outcome.unhandled_error {
            let _ = tx.send(TcpClientEvent::UnhandledError {
                peer_addr,
                error: Arc::new(err),
            });
        }

        let _ = tx.send(TcpClientEvent::ClientStopped);
    }

    fn fail_and_stop(&self, tx: &mpsc::UnboundedSender<TcpClientEvent>, err: TcpError) {
        let _ = tx.send(TcpClientEvent::ClientError(Arc::new(err.into())));
        let _ = tx.send(TcpClientEvent::ClientStopped);
    }
}

async fn connect_first(addrs: &[SocketAddr]) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no addresses to connect to")
    }))
}
