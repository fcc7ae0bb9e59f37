use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rustyguard_crypto::StaticPeerConfig;
use rustyguard_types::Cookie;

use crate::allowed_ip::AllowedIp;
use crate::handshake::HandshakeState;
use crate::keypair::KeypairRing;

/// Stable small-integer handle for a configured peer, used by callers
/// instead of holding a reference into [`crate::InterfaceContext`]'s
/// peer map (§9: "external code refers to peers by `peer_id`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub(crate) u32);

/// Durable per-peer record (§3).
pub struct Peer {
    pub id: PeerId,
    pub crypto: StaticPeerConfig,
    pub configured_endpoint: Option<SocketAddr>,
    pub current_endpoint: Option<SocketAddr>,
    pub allowed_ips: Vec<AllowedIp>,
    pub keepalive_interval: Option<Duration>,

    /// TAI64N big-endian bytes; big-endian byte compare is exactly
    /// numeric compare for this encoding, so plain `>` over the array
    /// via `Ord` on `[u8; 12]` implements the "only ever increases"
    /// invariant without decoding it.
    pub greatest_timestamp: [u8; 12],

    pub cookie: Option<Cookie>,
    pub cookie_expires_at: Option<Instant>,

    pub handshake: Option<HandshakeState>,
    pub handshake_mac1: Option<[u8; 16]>,

    pub keypairs: KeypairRing,

    pub last_initiation_rx: Option<Instant>,
    pub last_initiation_tx: Option<Instant>,
    pub last_tx: Option<Instant>,
    pub last_rx: Option<Instant>,
    pub rekey_expires_at: Option<Instant>,
    pub keepalive_expires_at: Option<Instant>,
    pub send_handshake: bool,
}

impl Peer {
    pub(crate) fn new(
        id: PeerId,
        crypto: StaticPeerConfig,
        configured_endpoint: Option<SocketAddr>,
        allowed_ips: Vec<AllowedIp>,
        keepalive_interval: Option<Duration>,
    ) -> Self {
        Self {
            id,
            crypto,
            current_endpoint: configured_endpoint,
            configured_endpoint,
            allowed_ips,
            keepalive_interval,
            greatest_timestamp: [0; 12],
            cookie: None,
            cookie_expires_at: None,
            handshake: None,
            handshake_mac1: None,
            keypairs: KeypairRing::default(),
            last_initiation_rx: None,
            last_initiation_tx: None,
            last_tx: None,
            last_rx: None,
            rekey_expires_at: None,
            keepalive_expires_at: None,
            send_handshake: false,
        }
    }

    /// Wipes all keying material, as required of peer removal (§3
    /// "Removal zeros all keying material and destroys all keypairs").
    /// The `StaticPeerConfig`'s fields are zeroized on drop by the
    /// crypto crate; dropping the whole `Peer` is enough here, this
    /// method exists for callers that want to clear state without
    /// deleting the peer configuration.
    pub fn reset_session_state(&mut self) {
        self.handshake = None;
        self.handshake_mac1 = None;
        self.keypairs.destroy_all();
        self.cookie = None;
        self.cookie_expires_at = None;
        self.send_handshake = false;
    }

    /// §4.7 step 11: a valid, strictly newer TAI64N timestamp.
    pub fn accepts_timestamp(&self, ts: &[u8; 12]) -> bool {
        ts.as_slice() > self.greatest_timestamp.as_slice()
    }

    pub fn commit_timestamp(&mut self, ts: [u8; 12]) {
        if ts.as_slice() > self.greatest_timestamp.as_slice() {
            self.greatest_timestamp = ts;
        }
    }

    pub fn rate_limited(&self, now: Instant) -> bool {
        matches!(self.last_initiation_rx, Some(t) if now.duration_since(t) < crate::constants::INITIATION_RATE_LIMIT)
    }
}
