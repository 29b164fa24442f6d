use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use framewire_core::Defragmenter;
use tokio::net::TcpStream;

/// Produces a fresh [`Defragmenter`] instance per peer. Shared across every
/// connection an engine handles; the factory itself must be `Send + Sync`
/// but the defragmenter it produces need not be shared between peers.
pub type DefragmenterFactory = Arc<dyn Fn() -> Arc<dyn Defragmenter> + Send + Sync>;

/// Socket-configuration hook, applied right after a socket handle is
/// created (client connect) or accepted (server). Mirrors the teacher's
/// `ConfigureSocketCallback` hook.
pub type ConfigureSocket = Arc<dyn Fn(&TcpStream) + Send + Sync>;

/// Resolved-address filter, applied to a DNS answer before connecting.
/// Default is identity — every address is tried in order.
pub type AddressFilter = Arc<dyn Fn(&[SocketAddr]) -> Vec<SocketAddr> + Send + Sync>;

fn identity_filter() -> AddressFilter {
    Arc::new(|addrs: &[SocketAddr]| addrs.to_vec())
}

/// Configuration for [`crate::client::TcpClient`].
#[derive(Clone)]
pub struct TcpClientConfig {
    pub target_hostname: String,
    pub target_port: u16,
    pub connection_timeout: Option<Duration>,
    pub max_send_queue_size: Option<usize>,
    pub configure_socket: Option<ConfigureSocket>,
    pub filter_resolved_addresses: AddressFilter,
    pub defragmenter_factory: DefragmenterFactory,
    #[cfg(feature = "tls")]
    pub tls: Option<Arc<framewire_tls::TlsClientConfig>>,
}

impl TcpClientConfig {
    pub fn new(
        target_hostname: impl Into<String>,
        target_port: u16,
        defragmenter_factory: DefragmenterFactory,
    ) -> Self {
        Self {
            target_hostname: target_hostname.into(),
            target_port,
            connection_timeout: None,
            max_send_queue_size: None,
            configure_socket: None,
            filter_resolved_addresses: identity_filter(),
            defragmenter_factory,
            #[cfg(feature = "tls")]
            tls: None,
        }
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    pub fn with_max_send_queue_size(mut self, size: usize) -> Self {
        self.max_send_queue_size = Some(size);
        self
    }

    pub fn with_configure_socket(mut self, f: ConfigureSocket) -> Self {
        self.configure_socket = Some(f);
        self
    }

    pub fn with_filter_resolved_addresses(mut self, f: AddressFilter) -> Self {
        self.filter_resolved_addresses = f;
        self
    }

    #[cfg(feature = "tls")]
    pub fn with_tls(mut self, tls: framewire_tls::TlsClientConfig) -> Self {
        self.tls = Some(Arc::new(tls));
        self
    }
}

/// Configuration for [`crate::server::TcpServer`].
#[derive(Clone)]
pub struct TcpServerConfig {
    pub bind_addr: SocketAddr,
    pub connection_timeout: Option<Duration>,
    pub max_send_queue_per_peer_size: Option<usize>,
    pub configure_listener: Option<Arc<dyn Fn(&tokio::net::TcpListener) + Send + Sync>>,
    pub configure_socket: Option<ConfigureSocket>,
    pub defragmenter_factory: DefragmenterFactory,
    #[cfg(feature = "tls")]
    pub tls: Option<Arc<framewire_tls::TlsServerConfig>>,
}

impl TcpServerConfig {
    pub fn new(bind_addr: SocketAddr, defragmenter_factory: DefragmenterFactory) -> Self {
        Self {
            bind_addr,
            connection_timeout: None,
            max_send_queue_per_peer_size: None,
            configure_listener: None,
            configure_socket: None,
            defragmenter_factory,
            #[cfg(feature = "tls")]
            tls: None,
        }
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    pub fn with_max_send_queue_per_peer_size(mut self, size: usize) -> Self {
        self.max_send_queue_per_peer_size = Some(size);
        self
    }

    pub fn with_configure_listener(
        mut self,
        f: Arc<dyn Fn(&tokio::net::TcpListener) + Send + Sync>,
    ) -> Self {
        self.configure_listener = Some(f);
        self
    }

    pub fn with_configure_socket(mut self, f: ConfigureSocket) -> Self {
        self.configure_socket = Some(f);
        self
    }

    #[cfg(feature = "tls")]
    pub fn with_tls(mut self, tls: framewire_tls::TlsServerConfig) -> Self {
        self.tls = Some(Arc::new(tls));
        self
    }
}
