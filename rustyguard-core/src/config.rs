use std::net::SocketAddr;
use std::time::Duration;

use rustyguard_crypto::{Key, PublicKey, StaticSecret};

use crate::allowed_ip::AllowedIp;

/// Constructor input for [`crate::InterfaceContext`]. spec.md excludes
/// CLI/config-file loading, but `InterfaceContext` still needs a typed
/// entry point for whatever external configuration layer builds one.
pub struct InterfaceConfig {
    pub private_key: StaticSecret,
    /// Not consumed by the core (UDP socket I/O is an external
    /// collaborator, §1) but carried so a caller building the actual
    /// socket has a single place to read it from.
    pub listen_port: Option<u16>,
}

impl InterfaceConfig {
    pub fn new(private_key: StaticSecret) -> Self {
        Self {
            private_key,
            listen_port: None,
        }
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = Some(port);
        self
    }
}

/// Constructor input for [`crate::InterfaceContext::add_peer`].
pub struct PeerConfig {
    pub public_key: PublicKey,
    pub preshared_key: Option<Key>,
    pub endpoint: Option<SocketAddr>,
    pub allowed_ips: Vec<AllowedIp>,
    pub keepalive_interval: Option<Duration>,
}

impl PeerConfig {
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            preshared_key: None,
            endpoint: None,
            allowed_ips: Vec::new(),
            keepalive_interval: None,
        }
    }

    pub fn with_preshared_key(mut self, psk: Key) -> Self {
        self.preshared_key = Some(psk);
        self
    }

    pub fn with_endpoint(mut self, endpoint: SocketAddr) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_allowed_ip(mut self, ip: AllowedIp) -> Self {
        self.allowed_ips.push(ip);
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }
}
