use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::time::Instant;

use rand_core::{CryptoRng, RngCore};
use rustyguard_crypto::{
    decrypt_cookie, decrypt_handshake_init_ephemeral, decrypt_handshake_init_static,
    decrypt_handshake_resp, encrypt_cookie, encrypt_handshake_init, encrypt_handshake_resp,
    DecryptionKey, EncryptionKey, HandshakeState as CryptoState, HasMac, StaticSecret,
};
use rustyguard_types::{CookieReply, HandshakeInit, HandshakeResp, MSG_COOKIE};
use tai64::Tai64N;
use zerocopy::{little_endian, AsBytes};

use crate::constants::REKEY_TIMEOUT;
use crate::error::Error;
use crate::handshake::HandshakeState;
use crate::interface::InterfaceContext;
use crate::keypair::Keypair;
use crate::peer::PeerId;
use crate::registry;

impl InterfaceContext {
    /// §4.6: builds an Initiation for `peer_id`, caches `handshake_mac1`
    /// and `rekey_expires_at`, and installs the transient
    /// `HandshakeState`. Returns the datagram to send and where to.
    pub fn create_initiation(
        &mut self,
        peer_id: PeerId,
        now: Instant,
        tai_now: Tai64N,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<(SocketAddr, Vec<u8>), Error> {
        let endpoint = {
            let peer = self.peers.get(&peer_id).ok_or(Error::UnknownPeer)?;
            peer.current_endpoint
                .or(peer.configured_endpoint)
                .ok_or(Error::NoRoute)?
        };

        let local_index = registry::generate_unique_index(&self.peers, rng);
        let esk_i = StaticSecret::random_from_rng(rng);

        let peer = self.peers.get_mut(&peer_id).ok_or(Error::UnknownPeer)?;
        let mut crypto = CryptoState::default();
        let msg = encrypt_handshake_init(
            &mut crypto,
            &self.local,
            &peer.crypto,
            &esk_i,
            tai_now,
            local_index,
            peer.cookie.as_ref(),
        );

        peer.handshake_mac1 = Some(msg.mac1);
        let mut handshake = HandshakeState::new(local_index, esk_i, true, now);
        handshake.crypto = crypto;
        peer.handshake = Some(handshake);
        peer.last_initiation_tx = Some(now);
        peer.rekey_expires_at = Some(now + REKEY_TIMEOUT);
        peer.send_handshake = false;

        self.stats.initiations_tx += 1;
        log::debug!("peer {peer_id:?}: sending initiation (local_index={local_index})");
        Ok((endpoint, msg.as_bytes().to_vec()))
    }

    /// §4.7: processes a received Initiation, verifying MAC1/MAC2,
    /// decrypting the sender's identity and timestamp, checking replay
    /// and rate limits, and building either a Response or (under load,
    /// with an invalid MAC2) a Cookie Reply. Both outcomes are a single
    /// datagram addressed back to `src`.
    pub fn handle_initiation(
        &mut self,
        src: SocketAddr,
        msg: &mut HandshakeInit,
        overload: bool,
        now: Instant,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<(SocketAddr, Vec<u8>), Error> {
        self.refresh_cookie_secret(now, rng);

        match msg.verify(&self.local, overload, &self.cookie_state, src)? {
            ControlFlow::Break(cookie) => {
                self.stats.invalid_mac2 += 1;
                log::debug!("under load, invalid mac2 from {src}: sending cookie reply");
                let payload = self.build_cookie_reply(msg, cookie, rng);
                return Ok((src, payload));
            }
            ControlFlow::Continue(_) => {}
        }

        let mut crypto = CryptoState::default();
        let sender_static = decrypt_handshake_init_ephemeral(msg, &mut crypto, &self.local)?;
        let peer_id = self
            .peer_by_key(sender_static.as_bytes())
            .ok_or(Error::UnknownPeer)?;
        let remote_index = msg.sender.get();

        let local_index = registry::generate_unique_index(&self.peers, rng);
        let esk_r = StaticSecret::random_from_rng(rng);

        let peer = self.peers.get_mut(&peer_id).ok_or(Error::UnknownPeer)?;
        let decrypted = decrypt_handshake_init_static(msg, &mut crypto, &peer.crypto)?;
        let ts = *decrypted.timestamp();

        if peer.rate_limited(now) {
            log::warn!("peer {peer_id:?}: rate-limited initiation from {src}");
            return Err(Error::RateLimited);
        }
        if !peer.accepts_timestamp(&ts) {
            log::warn!("peer {peer_id:?}: stale/replayed initiation timestamp from {src}");
            return Err(Error::Replay);
        }

        peer.commit_timestamp(ts);
        peer.last_initiation_rx = Some(now);
        peer.current_endpoint = Some(src);
        self.stats.initiations_rx += 1;

        let resp = encrypt_handshake_resp(
            &mut crypto,
            decrypted,
            &esk_r,
            &peer.crypto,
            local_index,
            peer.cookie.as_ref(),
        )?;

        let (t_send_initiator, t_send_responder) = crypto.split();
        let sending = EncryptionKey::new(t_send_responder);
        let receiving = DecryptionKey::new(t_send_initiator);
        let kp = Keypair::new(now, sending, receiving, local_index, remote_index, false);

        peer.keypairs.promote_new(kp);
        peer.handshake = None;
        self.stats.responses_tx += 1;
        self.stats.rekeys_completed += 1;
        log::debug!("peer {peer_id:?}: initiation accepted from {src}, sending response");

        Ok((src, resp.as_bytes().to_vec()))
    }

    /// §4.7 step 2 / §4.8: a fresh Cookie Reply keyed under our own
    /// identity's `label_cookie_key`, with `ad = mac1_from_incoming`.
    fn build_cookie_reply(
        &mut self,
        msg: &HandshakeInit,
        cookie: rustyguard_types::Cookie,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Vec<u8> {
        let mut nonce = [0u8; 24];
        rng.fill_bytes(&mut nonce);
        let enc_cookie = encrypt_cookie(cookie, &self.local.cookie_key, &nonce, &msg.mac1);
        self.stats.cookie_replies_tx += 1;
        let reply = CookieReply {
            message_type: little_endian::U32::new(MSG_COOKIE),
            receiver: msg.sender,
            nonce,
            cookie: enc_cookie,
        };
        reply.as_bytes().to_vec()
    }

    /// §4.7 continuation on the initiator side: verifies MAC1, replays
    /// the remaining Noise steps, and promotes the completed handshake
    /// to a `Keypair`.
    pub fn handle_response(
        &mut self,
        src: SocketAddr,
        resp: &mut HandshakeResp,
        now: Instant,
    ) -> Result<(), Error> {
        let local_index = resp.receiver.get();
        let peer_id =
            registry::lookup_by_handshake(&self.peers, local_index).ok_or(Error::UnknownPeer)?;

        resp.verify_mac1(&self.local.mac1_key)?;

        let peer = self.peers.get_mut(&peer_id).unwrap();
        let handshake = peer.handshake.as_mut().ok_or(Error::InvalidMessage)?;

        decrypt_handshake_resp(
            resp,
            &mut handshake.crypto,
            &self.local,
            &peer.crypto,
            &handshake.ephemeral_private,
        )?;

        let remote_index = resp.sender.get();
        let (t_send_initiator, t_send_responder) = handshake.crypto.split();
        let sending = EncryptionKey::new(t_send_initiator);
        let receiving = DecryptionKey::new(t_send_responder);
        let local_index = handshake.local_index;
        let kp = Keypair::new(now, sending, receiving, local_index, remote_index, true);

        peer.keypairs.promote_new(kp);
        peer.handshake = None;
        peer.current_endpoint = Some(src);
        peer.last_rx = Some(now);
        self.stats.responses_rx += 1;
        self.stats.rekeys_completed += 1;
        log::debug!("peer {peer_id:?}: handshake completed via response from {src}");
        Ok(())
    }

    /// §4.8: installs a cookie received in reply to our own Initiation,
    /// matched against the cached `handshake_mac1`.
    pub fn handle_cookie_reply(
        &mut self,
        src: SocketAddr,
        reply: &CookieReply,
        now: Instant,
    ) -> Result<(), Error> {
        let local_index = reply.receiver.get();
        let peer_id =
            registry::lookup_by_handshake(&self.peers, local_index).ok_or(Error::UnknownPeer)?;

        let peer = self.peers.get_mut(&peer_id).unwrap();
        let handshake_mac1 = peer.handshake_mac1.ok_or(Error::InvalidMessage)?;

        let mut cookie_reply = reply.cookie;
        let cookie = decrypt_cookie(
            &mut cookie_reply,
            &peer.crypto.cookie_key,
            &reply.nonce,
            &handshake_mac1,
        )?;
        peer.cookie = Some(*cookie);
        peer.cookie_expires_at = Some(now + crate::constants::COOKIE_SECRET_MAX_AGE);
        peer.current_endpoint = Some(src);
        self.stats.cookie_replies_rx += 1;
        log::trace!("peer {peer_id:?}: installed cookie from {src}");
        Ok(())
    }
}
