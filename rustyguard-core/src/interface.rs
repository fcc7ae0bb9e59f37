use std::collections::HashMap;
use std::time::Instant;

use rand_core::{CryptoRng, RngCore};
use rustyguard_crypto::{CookieState, StaticInitiatorConfig, StaticPeerConfig};
use rustyguard_utils::RandomState;

use crate::config::{InterfaceConfig, PeerConfig};
use crate::constants::COOKIE_SECRET_MAX_AGE;
use crate::error::Error;
use crate::peer::{Peer, PeerId};
use crate::stats::Statistics;

/// One instance per virtual tunnel (§3). Owns the local identity, the
/// configured peer set, the cookie-secret DoS-mitigation state, and
/// statistics. Every mutation described in §4–§5 happens through `&mut
/// InterfaceContext`, matching the single-mutex-per-interface model of
/// §5 — the mutex itself is the caller's responsibility (an
/// `Arc<Mutex<InterfaceContext>>` or equivalent at the integration
/// layer), this type only needs exclusive access for the duration of
/// one call.
pub struct InterfaceContext {
    pub(crate) local: StaticInitiatorConfig,
    pub(crate) cookie_state: CookieState,
    pub(crate) cookie_secret_expires_at: Instant,
    /// Gates the Scheduler (`net_if_is_up` in the original): when
    /// false, `tick` does no rekey/keepalive/expiry work for any peer.
    pub enabled: bool,
    pub(crate) peers: HashMap<PeerId, Peer, RandomState>,
    pub(crate) peers_by_key: HashMap<[u8; 32], PeerId, RandomState>,
    next_peer_id: u32,
    pub stats: Statistics,
}

impl InterfaceContext {
    pub fn new(config: InterfaceConfig, now: Instant, rng: &mut (impl CryptoRng + RngCore)) -> Self {
        let local = StaticInitiatorConfig::new(config.private_key);
        let mut cookie_state = CookieState::default();
        cookie_state.generate(rng);

        let hasher = rustyguard_utils::random_hasher(rng);
        let hasher2 = rustyguard_utils::random_hasher(rng);

        Self {
            local,
            cookie_state,
            cookie_secret_expires_at: now + COOKIE_SECRET_MAX_AGE,
            enabled: true,
            peers: HashMap::with_hasher(hasher),
            peers_by_key: HashMap::with_hasher(hasher2),
            next_peer_id: 0,
            stats: Statistics::default(),
        }
    }

    pub fn local_public_key(&self) -> rustyguard_crypto::PublicKey {
        self.local.public_key
    }

    pub fn add_peer(&mut self, config: PeerConfig) -> Result<PeerId, Error> {
        let crypto = StaticPeerConfig::new(&self.local.private_key, config.public_key, config.preshared_key)
            .map_err(Error::from)?;

        let id = PeerId(self.next_peer_id);
        self.next_peer_id += 1;

        let peer = Peer::new(
            id,
            crypto,
            config.endpoint,
            config.allowed_ips,
            config.keepalive_interval,
        );
        self.peers_by_key.insert(*config.public_key.as_bytes(), id);
        self.peers.insert(id, peer);
        Ok(id)
    }

    /// Zeros all keying material for the peer and removes it (§3).
    pub fn remove_peer(&mut self, id: PeerId) {
        if let Some(mut peer) = self.peers.remove(&id) {
            peer.reset_session_state();
            self.peers_by_key.retain(|_, v| *v != id);
        }
    }

    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn peer_mut(&mut self, id: PeerId) -> Option<&mut Peer> {
        self.peers.get_mut(&id)
    }

    pub fn peer_by_key(&self, key: &[u8; 32]) -> Option<PeerId> {
        self.peers_by_key.get(key).copied()
    }

    /// Refreshes the cookie secret if `COOKIE_SECRET_MAX_AGE` has
    /// passed (§4.8 step 3, lazily on use per §5).
    pub(crate) fn refresh_cookie_secret(&mut self, now: Instant, rng: &mut (impl CryptoRng + RngCore)) {
        if now >= self.cookie_secret_expires_at {
            self.cookie_state.generate(rng);
            self.cookie_secret_expires_at = now + COOKIE_SECRET_MAX_AGE;
        }
    }
}
