use std::net::SocketAddr;
use std::sync::Arc;

use framewire_core::queue::Cancelled;
use framewire_core::{BufferView, FramewireError, SendOutcome};
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::UdpClientConfig;
use crate::endpoint::UdpEndpoint;
use crate::error::UdpError;
use crate::events::UdpClientEvent;

const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Connected UDP endpoint (spec §4.7, client role): resolves the target,
/// picks one address, and `connect`s the socket to it so every send is a
/// plain `send_to` against a fixed destination without redoing address
/// selection per call.
pub struct UdpClient {
    config: UdpClientConfig,
    endpoint: tokio::sync::OnceCell<UdpEndpoint>,
    target: tokio::sync::OnceCell<SocketAddr>,
}

impl UdpClient {
    pub fn new(config: UdpClientConfig) -> Self {
        Self {
            config,
            endpoint: tokio::sync::OnceCell::new(),
            target: tokio::sync::OnceCell::new(),
        }
    }

    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> mpsc::UnboundedReceiver<UdpClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move { self.run(cancel, tx).await });
        rx
    }

    async fn run(&self, cancel: CancellationToken, tx: mpsc::UnboundedSender<UdpClientEvent>) {
        let _ = tx.send(UdpClientEvent::Started);

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = tx.send(UdpClientEvent::Stopped);
                return;
            }
            res = lookup_host((self.config.target_hostname.as_str(), self.config.target_port)) => res,
        };
        let resolved = match resolved {
            Ok(addrs) => addrs.collect::<Vec<_>>(),
            Err(source) => {
                self.fail_and_stop(
                    &tx,
                    UdpError::Resolve {
                        host: self.config.target_hostname.clone(),
                        port: self.config.target_port,
                        source,
                    },
                );
                return;
            }
        };
        if resolved.is_empty() {
            self.fail_and_stop(
                &tx,
                UdpError::NoUsableAddress {
                    host: self.config.target_hostname.clone(),
                    port: self.config.target_port,
                },
            );
            return;
        }
        let target = (self.config.select_address)(&resolved);

        let bind_addr: SocketAddr = if target.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let socket = match UdpSocket::bind(bind_addr).await {
            Ok(socket) => socket,
            Err(source) => {
                self.fail_and_stop(
                    &tx,
                    UdpError::Bind {
                        addr: bind_addr.to_string(),
                        source,
                    },
                );
                return;
            }
        };
        if let Some(configure) = &self.config.configure_socket {
            configure(&socket);
        }
        if let Err(source) = socket.connect(target).await {
            self.fail_and_stop(
                &tx,
                UdpError::Connect {
                    addr: target.to_string(),
                    source,
                },
            );
            return;
        }
        let socket = Arc::new(socket);
        let _ = self.target.set(target);

        let tx_err = tx.clone();
        let udp_endpoint = UdpEndpoint::new(
            Arc::clone(&socket),
            target.to_string(),
            self.config.max_send_queue_size,
            cancel.clone(),
            Arc::new(move |partial, error| {
                let _ = tx_err.send(UdpClientEvent::SendError {
                    partial,
                    error: error.map(|e| Arc::new(FramewireError::Transport(e))),
                });
            }),
        );
        let _ = self.endpoint.set(udp_endpoint);
        let _ = tx.send(UdpClientEvent::Ready { target });

        loop {
            let mut buf = vec![0u8; RECV_BUFFER_SIZE];
            let recv = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = socket.recv_from(&mut buf) => res,
            };
            match recv {
                Ok((n, from)) => {
                    buf.truncate(n);
                    let _ = tx.send(UdpClientEvent::PacketArrived {
                        from,
                        data: BufferView::new(buf),
                    });
                }
                Err(err) => {
                    let _ = tx.send(UdpClientEvent::Exception(Arc::new(UdpError::Recv(err).into())));
                }
            }
        }

        if let Some(endpoint) = self.endpoint.get() {
            endpoint.teardown().await;
        }
        let _ = tx.send(UdpClientEvent::Stopped);
    }

    fn fail_and_stop(&self, tx: &mpsc::UnboundedSender<UdpClientEvent>, err: UdpError) {
        let _ = tx.send(UdpClientEvent::Exception(Arc::new(err.into())));
        let _ = tx.send(UdpClientEvent::Stopped);
    }

    /// The resolved, connected target address, once `start` has completed
    /// binding. `None` before `client-ready` has fired.
    pub fn target(&self) -> Option<SocketAddr> {
        self.target.get().copied()
    }

    pub fn post(&self, payload: BufferView) -> bool {
        let Some(endpoint) = self.endpoint.get() else {
            return false;
        };
        let Some(target) = self.target.get().copied() else {
            return false;
        };
        endpoint.post(target, payload)
    }

    pub async fn send(
        &self,
        payload: BufferView,
        cancel: &CancellationToken,
    ) -> Result<SendOutcome, Cancelled> {
        let Some(endpoint) = self.endpoint.get() else {
            return Ok(SendOutcome::Failed);
        };
        let Some(target) = self.target.get().copied() else {
            return Ok(SendOutcome::Failed);
        };
        endpoint.send(target, payload, cancel).await
    }

    /// Enqueues and hands back the completion receiver for the caller to
    /// poll on its own schedule. Before the client has resolved and bound
    /// (the same pre-ready race `post`/`send` handle gracefully), the
    /// receiver resolves to `Failed` immediately rather than panicking.
    pub async fn add_to_send_queue(
        &self,
        payload: BufferView,
        cancel: &CancellationToken,
    ) -> Result<oneshot::Receiver<SendOutcome>, Cancelled> {
        let Some(endpoint) = self.endpoint.get() else {
            return Ok(already_failed_receiver());
        };
        let Some(target) = self.target.get().copied() else {
            return Ok(already_failed_receiver());
        };
        endpoint.add_to_send_queue(target, payload, cancel).await
    }
}

fn already_failed_receiver() -> oneshot::Receiver<SendOutcome> {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(SendOutcome::Failed);
    rx
}
