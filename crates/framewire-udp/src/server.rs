use std::net::SocketAddr;
use std::sync::Arc;

use framewire_core::queue::Cancelled;
use framewire_core::{BufferView, FramewireError, SendOutcome};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::UdpServerConfig;
use crate::endpoint::UdpEndpoint;
use crate::error::UdpError;
use crate::events::UdpServerEvent;

const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Bound UDP endpoint (spec §4.7, server role): binds a local address,
/// optionally joins a multicast group, and fans incoming datagrams out
/// through a single receive loop shared with the send worker in
/// [`crate::endpoint::UdpEndpoint`].
///
/// Unlike the client, a server endpoint is not connected to one peer — every
/// `post`/`send`/`add_to_send_queue` call names its destination explicitly.
pub struct UdpServer {
    config: UdpServerConfig,
    endpoint: tokio::sync::OnceCell<UdpEndpoint>,
}

impl UdpServer {
    pub fn new(config: UdpServerConfig) -> Self {
        Self {
            config,
            endpoint: tokio::sync::OnceCell::new(),
        }
    }

    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> mpsc::UnboundedReceiver<UdpServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move { self.run(cancel, tx).await });
        rx
    }

    async fn run(&self, cancel: CancellationToken, tx: mpsc::UnboundedSender<UdpServerEvent>) {
        let socket = match UdpSocket::bind(self.config.bind_addr).await {
            Ok(socket) => socket,
            Err(source) => {
                let _ = tx.send(UdpServerEvent::Exception(Arc::new(
                    UdpError::Bind {
                        addr: self.config.bind_addr.to_string(),
                        source,
                    }
                    .into(),
                )));
                let _ = tx.send(UdpServerEvent::Stopped);
                return;
            }
        };
        if let Some(configure) = &self.config.configure_socket {
            configure(&socket);
        }

        if let Some(group) = self.config.join_multicast_group {
            if let Err(source) = join_multicast(&socket, group.group, group.interface) {
                let _ = tx.send(UdpServerEvent::Exception(Arc::new(
                    UdpError::JoinMulticast {
                        group: group.group.to_string(),
                        source,
                    }
                    .into(),
                )));
                let _ = tx.send(UdpServerEvent::Stopped);
                return;
            }
            if let Some(on_join) = &self.config.on_join_multicast_group {
                on_join(group);
            }
        }

        let local_addr = socket.local_addr().unwrap_or(self.config.bind_addr);
        let socket = Arc::new(socket);
        let _ = tx.send(UdpServerEvent::Started { local_addr });

        let tx_err = tx.clone();
        let udp_endpoint = UdpEndpoint::new(
            Arc::clone(&socket),
            local_addr.to_string(),
            self.config.max_send_queue_size,
            cancel.clone(),
            Arc::new(move |partial, error| {
                let _ = tx_err.send(UdpServerEvent::SendError {
                    partial,
                    error: error.map(|e| Arc::new(FramewireError::Transport(e))),
                });
            }),
        );
        // `OnceCell::set` only fails if the server is somehow started twice
        // on the same `Arc<UdpServer>`; either way the first endpoint wins.
        let _ = self.endpoint.set(udp_endpoint);
        let udp_endpoint = self.endpoint.get().expect("just set above");

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
                    let _ = tx.send(UdpServerEvent::PacketArrived {
                        from,
                        data: BufferView::new(buf),
                    });
                }
                Err(err) => {
                    let _ = tx.send(UdpServerEvent::Exception(Arc::new(UdpError::Recv(err).into())));
                }
            }
        }

        udp_endpoint.teardown().await;
        if let (Some(group), Some(on_leave)) = (self.config.join_multicast_group, &self.config.on_leave_multicast_group) {
            on_leave(group);
        }
        let _ = tx.send(UdpServerEvent::Stopped);
    }

    /// Non-blocking enqueue of a datagram to `destination`. `false` before
    /// the server has bound, or once the queue is closed or at capacity.
    pub fn post(&self, destination: SocketAddr, payload: BufferView) -> bool {
        let Some(endpoint) = self.endpoint.get() else {
            return false;
        };
        endpoint.post(destination, payload)
    }

    /// Enqueues and awaits the worker's end-to-end completion promise.
    pub async fn send(
        &self,
        destination: SocketAddr,
        payload: BufferView,
        cancel: &CancellationToken,
    ) -> Result<SendOutcome, Cancelled> {
        let Some(endpoint) = self.endpoint.get() else {
            return Ok(SendOutcome::Failed);
        };
        endpoint.send(destination, payload, cancel).await
    }

    /// Enqueues and hands back the completion receiver for the caller to
    /// poll on its own schedule, instead of awaiting it inline. Before the
    /// server has bound (the same pre-ready race `post`/`send` handle
    /// gracefully), the receiver resolves to `Failed` immediately rather
    /// than panicking.
    pub async fn add_to_send_queue(
        &self,
        destination: SocketAddr,
        payload: BufferView,
        cancel: &CancellationToken,
    ) -> Result<oneshot::Receiver<SendOutcome>, Cancelled> {
        let Some(endpoint) = self.endpoint.get() else {
            return Ok(already_failed_receiver());
        };
        endpoint.add_to_send_queue(destination, payload, cancel).await
    }
}

fn already_failed_receiver() -> oneshot::Receiver<SendOutcome> {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(SendOutcome::Failed);
    rx
}

fn join_multicast(socket: &UdpSocket, group: std::net::Ipv4Addr, interface: std::net::Ipv4Addr) -> std::io::Result<()> {
    socket.join_multicast_v4(group, interface)
}
