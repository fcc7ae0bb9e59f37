use std::time::Instant;

use rand_core::{CryptoRng, RngCore};
use tai64::Tai64N;

use crate::constants::REKEY_TIMEOUT;
use crate::event::Event;
use crate::interface::InterfaceContext;
use crate::peer::PeerId;

impl InterfaceContext {
    /// §4.12: the periodic (`WG_TIMER_PERIOD`) per-peer walk. Expires
    /// stale keypair slots and handshake attempts, and triggers a new
    /// Initiation or a keep-alive as each peer's state calls for one.
    /// `tai_now` is the caller-supplied wall-clock reading used only if
    /// a new Initiation is built (§4.6's timestamp field).
    pub fn tick(
        &mut self,
        now: Instant,
        tai_now: Tai64N,
        rng: &mut (impl CryptoRng + RngCore),
        events: &mut Vec<Event>,
    ) {
        if !self.enabled {
            return;
        }
        self.refresh_cookie_secret(now, rng);

        let peer_ids: Vec<PeerId> = self.peers.keys().copied().collect();
        for id in peer_ids {
            self.tick_peer(id, now, tai_now, rng, events);
        }
    }

    fn tick_peer(
        &mut self,
        id: PeerId,
        now: Instant,
        tai_now: Tai64N,
        rng: &mut (impl CryptoRng + RngCore),
        events: &mut Vec<Event>,
    ) {
        let (needs_initiation, needs_keepalive) = {
            let peer = match self.peers.get_mut(&id) {
                Some(p) => p,
                None => return,
            };

            peer.keypairs.expire_current(now);
            if matches!(&peer.keypairs.current, Some(k) if k.is_rejected(now)) {
                peer.keypairs.current = None;
            }
            if matches!(&peer.keypairs.previous, Some(k) if k.is_rejected(now)) {
                peer.keypairs.previous = None;
            }
            if matches!(&peer.keypairs.next, Some(k) if k.is_rejected(now)) {
                peer.keypairs.next = None;
            }

            let handshake_stale = matches!(&peer.handshake, Some(h) if now.duration_since(h.started_at) >= REKEY_TIMEOUT);
            if handshake_stale {
                peer.handshake = None;
            }

            let has_route = peer.configured_endpoint.is_some() || peer.current_endpoint.is_some();
            let no_session = peer.keypairs.current.is_none() && peer.handshake.is_none();
            let rekey_due = peer.send_handshake
                || matches!(&peer.keypairs.current, Some(k) if k.expires_soon(now))
                || no_session;
            let not_rate_limited = !matches!(peer.last_initiation_tx, Some(t) if now.duration_since(t) < REKEY_TIMEOUT);
            let needs_initiation = has_route && rekey_due && not_rate_limited && peer.handshake.is_none();

            let keepalive_interval = peer
                .keepalive_interval
                .unwrap_or(crate::constants::KEEPALIVE_TIMEOUT);
            let sendable = matches!(&peer.keypairs.current, Some(k) if k.is_sending_valid());
            let needs_keepalive = sendable
                && matches!(peer.last_tx, Some(t) if now.duration_since(t) >= keepalive_interval);

            (needs_initiation, needs_keepalive)
        };

        if needs_initiation {
            match self.create_initiation(id, now, tai_now, rng) {
                Ok((dst, payload)) => events.push(Event::SendDatagram { dst, payload }),
                Err(e) => log::trace!("peer {id:?}: tick could not start initiation: {e}"),
            }
        } else if needs_keepalive {
            log::trace!("peer {id:?}: tick sending keepalive");
            let _ = self.send_keepalive_now(id, now, events);
        }
    }
}
