use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::TcpServerConfig;
use crate::engine::run_peer_session;
use crate::error::TcpError;
use crate::events::TcpServerEvent;
use crate::stream::BoxedStream;

/// TCP server engine (`spec.md` §4.4): binds a listener, accepts
/// connections, and spawns one independent task per peer running the same
/// post-connect/receive-loop pipeline the client uses.
pub struct TcpServer {
    config: TcpServerConfig,
}

impl TcpServer {
    pub fn new(config: TcpServerConfig) -> Self {
        Self { config }
    }

    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> mpsc::UnboundedReceiver<TcpServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move { self.run(cancel, tx).await });
        rx
    }

    async fn run(&self, cancel: CancellationToken, tx: mpsc::UnboundedSender<TcpServerEvent>) {
        let listener = match TcpListener::bind(self.config.bind_addr).await {
            Ok(listener) => listener,
            Err(err) => {
                let _ = tx.send(TcpServerEvent::ServerError(Arc::new(
                    TcpError::Bind {
                        addr: self.config.bind_addr.to_string(),
                        source: err,
                    }
                    .into(),
                )));
                let _ = tx.send(TcpServerEvent::ServerStopped);
                return;
            }
        };

        if let Some(configure) = &self.config.configure_listener {
            configure(&listener);
        }

        let local_addr = listener.local_addr().unwrap_or(self.config.bind_addr);
        let _ = tx.send(TcpServerEvent::ServerStarted { local_addr });

        loop {
            let accepted = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = listener.accept() => res,
            };

            match accepted {
                Ok((stream, peer_addr)) => {
                    if let Some(configure) = &self.config.configure_socket {
                        configure(&stream);
                    }
                    let tx = tx.clone();
                    let cancel = cancel.clone();
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        handle_connection(config, stream, peer_addr, cancel, tx).await;
                    });
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    let _ = tx.send(TcpServerEvent::ServerError(Arc::new(
                        TcpError::Accept(err).into(),
                    )));
                }
            }
        }

        let _ = tx.send(TcpServerEvent::ServerStopped);
    }
}

async fn handle_connection(
    config: TcpServerConfig,
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<TcpServerEvent>,
) {
    let boxed: BoxedStream = {
        #[cfg(feature = "tls")]
        {
            match &config.tls {
                Some(tls) => match framewire_tls::accept(stream, tls).await {
                    Ok(tls_stream) => Box::new(tls_stream) as BoxedStream,
                    Err(err) => {
                        let _ = tx.send(TcpServerEvent::ServerError(Arc::new(
                            TcpError::Tls(Box::new(err)).into(),
                        )));
                        return;
                    }
                },
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
        &config.defragmenter_factory,
        config.max_send_queue_per_peer_size,
        config.connection_timeout,
        &cancel,
        move |peer| {
            let _ = tx_established.send(TcpServerEvent::ConnectionEstablished { peer: Arc::clone(peer) });
        },
        move |peer, frame| {
            let _ = tx_frame.send(TcpServerEvent::FrameArrived { peer: Arc::clone(peer), frame });
        },
    )
    .await;

    if let Some(err) = outcome.transport_error {
        let _ = tx.send(TcpServerEvent::RemotePeerError {
            peer_addr,
            error: Arc::new(err),
        });
    }
    let _ = tx.send(TcpServerEvent::ConnectionClosed {
        peer: Arc::clone(&outcome.peer),
        reason: outcome.close_reason,
    });
    if let Some(err) = outcome.unhandled_error {
        let _ = tx.send(TcpServerEvent::UnhandledError {
            peer_addr,
            error: Arc::new(err),
        });
    }
}
