use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;

/// Picks one address out of several DNS results. Default: first.
pub type SelectAddress = Arc<dyn Fn(&[SocketAddr]) -> SocketAddr + Send + Sync>;

/// Socket tuning hook, run once right after the socket is created.
pub type ConfigureSocket = Arc<dyn Fn(&UdpSocket) + Send + Sync>;

/// Multicast group to join on bind, and the join/leave notification hooks.
#[derive(Clone, Copy, Debug)]
pub struct MulticastGroup {
    pub group: Ipv4Addr,
    pub interface: Ipv4Addr,
}

pub type JoinMulticastGroupCallback = Arc<dyn Fn(MulticastGroup) + Send + Sync>;
pub type LeaveMulticastGroupCallback = Arc<dyn Fn(MulticastGroup) + Send + Sync>;

fn default_select(addrs: &[SocketAddr]) -> SocketAddr {
    addrs[0]
}

#[derive(Clone)]
pub struct UdpClientConfig {
    pub target_hostname: String,
    pub target_port: u16,
    pub max_send_queue_size: Option<usize>,
    pub configure_socket: Option<ConfigureSocket>,
    pub select_address: SelectAddress,
}

impl UdpClientConfig {
    pub fn new(target_hostname: impl Into<String>, target_port: u16) -> Self {
        Self {
            target_hostname: target_hostname.into(),
            target_port,
            max_send_queue_size: None,
            configure_socket: None,
            select_address: Arc::new(default_select),
        }
    }

    pub fn with_max_send_queue_size(mut self, size: usize) -> Self {
        self.max_send_queue_size = Some(size);
        self
    }

    pub fn with_configure_socket(mut self, f: ConfigureSocket) -> Self {
        self.configure_socket = Some(f);
        self
    }

    pub fn with_select_address(mut self, f: SelectAddress) -> Self {
        self.select_address = f;
        self
    }
}

#[derive(Clone)]
pub struct UdpServerConfig {
    pub bind_addr: SocketAddr,
    pub max_send_queue_size: Option<usize>,
    pub configure_socket: Option<ConfigureSocket>,
    pub join_multicast_group: Option<MulticastGroup>,
    pub on_join_multicast_group: Option<JoinMulticastGroupCallback>,
    pub on_leave_multicast_group: Option<LeaveMulticastGroupCallback>,
}

impl UdpServerConfig {
    pub fn new(ip_address: IpAddr, port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::new(ip_address, port),
            max_send_queue_size: None,
            configure_socket: None,
            join_multicast_group: None,
            on_join_multicast_group: None,
            on_leave_multicast_group: None,
        }
    }

    pub fn with_max_send_queue_size(mut self, size: usize) -> Self {
        self.max_send_queue_size = Some(size);
        self
    }

    pub fn with_configure_socket(mut self, f: ConfigureSocket) -> Self {
        self.configure_socket = Some(f);
        self
    }

    pub fn with_join_multicast_group(mut self, group: MulticastGroup) -> Self {
        self.join_multicast_group = Some(group);
        self
    }

    pub fn with_join_multicast_group_callback(mut self, f: JoinMulticastGroupCallback) -> Self {
        self.on_join_multicast_group = Some(f);
        self
    }

    pub fn with_leave_multicast_group_callback(mut self, f: LeaveMulticastGroupCallback) -> Self {
        self.on_leave_multicast_group = Some(f);
        self
    }
}
