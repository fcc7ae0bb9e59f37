#![no_std]

use core::{net::SocketAddr, ops::ControlFlow};

use prim::{hash, Encrypted, LABEL_COOKIE, LABEL_MAC1};
pub use prim::{mac, DecryptionKey, EncryptionKey, HandshakeState, Key, Mac};
pub use x25519_dalek::{PublicKey, StaticSecret};

use rand_core::{CryptoRng, RngCore};
use rustyguard_types::{
    Cookie, EncryptedCookie, EncryptedEmpty, EncryptedPublicKey, EncryptedTimestamp, HandshakeInit,
    HandshakeResp, Tag, MSG_FIRST, MSG_SECOND,
};

use tai64::Tai64N;
use zerocopy::{little_endian, transmute_mut, AsBytes, FromBytes, FromZeroes};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(any(test, rustyguard_unsafe_logging))]
extern crate std;

macro_rules! unsafe_log {
    ($($t:tt)*) => {
        match core::format_args!($($t)*) {
            #[cfg(any(test, rustyguard_unsafe_logging))]
            args => std::eprintln!("{args}"),
            #[cfg(not(any(test, rustyguard_unsafe_logging)))]
            _ => {}
        };
    }
}

mod prim;

#[derive(Debug)]
pub enum CryptoError {
    DecryptionError,
    Rejected,
    /// A Diffie-Hellman output came back as all-zero, meaning one side
    /// supplied an invalid (small-order) point. Must cause outright
    /// rejection rather than use of the degenerate key.
    InvalidKey,
}

pub fn decrypt_cookie<'c>(
    cookie: &'c mut EncryptedCookie,
    key: &Key,
    nonce: &[u8; 24],
    aad: &[u8],
) -> Result<&'c mut Cookie, CryptoError> {
    use chacha20poly1305::{AeadInPlace, KeyInit, XChaCha20Poly1305};

    XChaCha20Poly1305::new(key)
        .decrypt_in_place_detached(
            nonce.into(),
            aad,
            &mut cookie.msg.0,
            cookie.tag.as_array().into(),
        )
        .map_err(|_| CryptoError::DecryptionError)?;

    Ok(&mut cookie.msg)
}

pub fn encrypt_cookie(
    mut cookie: Cookie,
    key: &Key,
    nonce: &[u8; 24],
    aad: &[u8],
) -> EncryptedCookie {
    use chacha20poly1305::{AeadInPlace, KeyInit, XChaCha20Poly1305};

    let tag = XChaCha20Poly1305::new(key)
        .encrypt_in_place_detached(nonce.into(), aad, &mut cookie.0)
        .expect("cookie message should not be larger than max message size");

    EncryptedCookie {
        msg: cookie,
        tag: Tag::from_bytes(tag.into()),
    }
}

pub fn mac1_key(spk: &PublicKey) -> Key {
    hash([&LABEL_MAC1, spk.as_bytes()]).into()
}
pub fn cookie_key(spk: &PublicKey) -> Key {
    hash([&LABEL_COOKIE, spk.as_bytes()]).into()
}

#[derive(Zeroize, ZeroizeOnDrop, Default)]
pub struct CookieState {
    key: Key,
}

impl CookieState {
    pub fn generate(&mut self, rng: &mut (impl CryptoRng + RngCore)) {
        rng.fill_bytes(&mut self.key);
    }

    pub fn new_cookie(&self, addr: SocketAddr) -> Cookie {
        // there's no specified encoding here - it just needs to contain the IP address and port :shrug:
        let mut a = [0; 20];
        match addr.ip() {
            core::net::IpAddr::V4(ipv4) => a[..4].copy_from_slice(&ipv4.octets()[..]),
            core::net::IpAddr::V6(ipv6) => a[..16].copy_from_slice(&ipv6.octets()[..]),
        }
        a[16..].copy_from_slice(&addr.port().to_le_bytes()[..]);
        Cookie(mac(&self.key, &a))
    }
}

/// Both handshake messages are protected via MACs which can quickly be used
/// to rule out invalid messages.
///
/// The first MAC verifies that the message is even valid - to not waste time.
/// The second MAC is only checked if the server is overloaded. If the server is
/// overloaded and second MAC is invalid, a CookieReply is sent to the client,
/// which contains an encrypted key that can be used to re-sign the handshake later.
pub trait HasMac: FromBytes + AsBytes + Sized {
    fn verify<'m>(
        &'m mut self,
        config: &StaticInitiatorConfig,
        overload: bool,
        cookie: &CookieState,
        addr: SocketAddr,
    ) -> Result<ControlFlow<Cookie, &'m mut Self>, CryptoError> {
        // verify the mac1. this should be very fast.
        // takes 450ns on my M2 Max.
        // Thus, can handle ~2 million handshakes per second.
        // This is currently single threaded.
        // TODO(conrad): need to make the rejection multi-threaded.
        self.verify_mac1(&config.mac1_key)?;

        if overload {
            // Will be roughly twice as slow as verify_mac1. 750ns on my M2 Max.
            // If the server is overloaded, this is good for rejecting DDoS attacks
            // as it requires a round trip from the sender.
            let cookie = cookie.new_cookie(addr);
            if self.verify_mac2(&cookie).is_err() {
                return Ok(ControlFlow::Break(cookie));
            }
        }

        Ok(ControlFlow::Continue(self))
    }

    fn verify_mac1(&self, mac1_key: &Key) -> Result<(), CryptoError> {
        let actual_mac1 = self.compute_mac1(mac1_key);
        if &actual_mac1 != self.get_mac1() {
            unsafe_log!("invalid mac1");
            Err(CryptoError::Rejected)
        } else {
            unsafe_log!("valid mac1");
            Ok(())
        }
    }

    fn verify_mac2(&self, cookie: &Cookie) -> Result<(), CryptoError> {
        let actual_mac2 = self.compute_mac2(cookie);
        if &actual_mac2 != self.get_mac2() {
            unsafe_log!("invalid mac2");
            Err(CryptoError::Rejected)
        } else {
            unsafe_log!("valid mac2");
            Ok(())
        }
    }

    fn compute_mac1(&self, mac1_key: &Key) -> Mac;
    fn compute_mac2(&self, cookie: &Cookie) -> Mac;
    fn get_mac1(&self) -> &Mac;
    fn get_mac2(&self) -> &Mac;
}

macro_rules! mac_protected {
    ($i:ident, $t:ident) => {
        impl HasMac for $i {
            fn compute_mac1(&self, mac1_key: &chacha20poly1305::Key) -> Mac {
                let offset = core::mem::offset_of!($i, mac1);
                let bytes = self.as_bytes();
                prim::mac(mac1_key, &bytes[..offset])
            }

            fn compute_mac2(&self, cookie: &Cookie) -> Mac {
                let offset = core::mem::offset_of!($i, mac2);
                let bytes = self.as_bytes();
                prim::mac(cookie.as_array(), &bytes[..offset])
            }

            fn get_mac1(&self) -> &Mac {
                &self.mac1
            }

            fn get_mac2(&self) -> &Mac {
                &self.mac2
            }
        }
    };
}

mac_protected!(HandshakeInit, MSG_FIRST);
mac_protected!(HandshakeResp, MSG_SECOND);

// ---- Noise IKpsk2 ---- //
// Wireguard makes use of a slightly modified Noise IKpsk2 handshake.
// Read the noise specification: https://noiseprotocol.org/noise.html
//
// The IKpsk2 pattern is as follows:
// <- s
// -> e, es, s, ss
// <- e, ee, se, psk
//
// The initiator is expected to know the responder's static public key prior to the handshake.
// The initiator sends an ephemeral public key and their encrypted static public key.
// The responder sends an ephemeral public key.

pub struct StaticPeerConfig {
    /// Peer's public key.
    pub key: PublicKey,
    /// Peer's preshared key.
    pub preshared_key: Key,
    /// Cached mac1_key: calculated using `mac1_key(&self.key)`
    pub mac1_key: Key,
    /// Cached cookie_key: calculated using `cookie_key(&self.key)`
    pub cookie_key: Key,
    /// `DH(our_private_key, peer.key)`, computed once here rather than
    /// on every handshake, since it never changes for a fixed keypair
    /// on each side. Reused for both the `ss` step on the initiator
    /// side and the `ss` step on the responder side (DH is symmetric).
    pub(crate) static_dh: Key,
}

pub struct StaticInitiatorConfig {
    /// Our private key
    pub private_key: StaticSecret,
    /// Cached public key, derived from the above private key
    pub public_key: PublicKey,
    /// Cached mac1_key: calculated using `mac1_key(&self.public_key)`
    pub mac1_key: Key,
    /// Cached cookie_key: calculated using `cookie_key(&self.public_key)`
    pub cookie_key: Key,
}

impl StaticPeerConfig {
    /// Validates and caches `DH(our_key, peer_key)` up front so per-handshake
    /// work never has to recompute it or re-check it for the all-zero
    /// (invalid point) case.
    pub fn new(
        our_key: &StaticSecret,
        key: PublicKey,
        preshared_key: Option<Key>,
    ) -> Result<Self, CryptoError> {
        let static_dh = prim::static_dh(our_key, &key)?;
        Ok(Self {
            mac1_key: mac1_key(&key),
            cookie_key: cookie_key(&key),
            key,
            preshared_key: preshared_key.unwrap_or_default(),
            static_dh,
        })
    }
}

impl StaticInitiatorConfig {
    pub fn new(key: StaticSecret) -> Self {
        let public_key = PublicKey::from(&key);
        Self {
            mac1_key: mac1_key(&public_key),
            cookie_key: cookie_key(&public_key),
            public_key,
            private_key: key,
        }
    }
}

#[derive(Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(transparent)]
pub struct DecryptedHandshakeInit(HandshakeInit);

impl DecryptedHandshakeInit {
    #[inline(always)]
    pub fn static_key(&self) -> PublicKey {
        PublicKey::from(self.0.static_key.msg)
    }
    #[inline(always)]
    pub fn timestamp(&self) -> &[u8; 12] {
        &self.0.timestamp.msg
    }
}

pub fn encrypt_handshake_init(
    hs: &mut HandshakeState,
    initiator: &StaticInitiatorConfig,
    peer: &StaticPeerConfig,
    esk_i: &StaticSecret,
    now: Tai64N,
    sender: u32,
    cookie: Option<&Cookie>,
) -> HandshakeInit {
    // IKpsk2:
    // <- s
    // -> e, es, s, ss

    // <- s:
    let epk_i = PublicKey::from(esk_i);
    hs.mix_hash(peer.key.as_bytes());

    // -> e: ephemeral keypair generated by caller
    // wireguard goes off-spec here with mix-chain.
    hs.mix_chain(epk_i.as_bytes());
    hs.mix_hash(epk_i.as_bytes());

    // -> es:
    let k = hs
        .mix_key_dh(esk_i, &peer.key)
        .expect("peer static key was already validated in StaticPeerConfig::new");

    // -> s:
    let static_key = EncryptedPublicKey::encrypt_and_hash(initiator.public_key.to_bytes(), hs, &k);

    // -> ss: reuse the precomputed DH rather than recomputing it.
    let k = hs.mix_key_precomputed(&peer.static_dh);

    // payload:
    let timestamp = EncryptedTimestamp::encrypt_and_hash(now.to_bytes(), hs, &k);

    // build the message and protect with the MACs
    let mut msg = HandshakeInit {
        message_type: little_endian::U32::new(MSG_FIRST),
        sender: little_endian::U32::new(sender),
        ephemeral_key: epk_i.to_bytes(),
        static_key,
        timestamp,
        mac1: [0; 16],
        mac2: [0; 16],
    };
    msg.mac1 = msg.compute_mac1(&peer.mac1_key);
    if let Some(cookie) = cookie {
        msg.mac2 = msg.compute_mac2(cookie);
    }

    msg
}

/// First phase of [`decrypt_handshake_init`]: decrypts only the sender's
/// static public key, so the caller can look up which peer sent this
/// message before the rest of the handshake can proceed (the `ss` step
/// needs that peer's precomputed [`StaticPeerConfig::static_dh`]).
pub fn decrypt_handshake_init_ephemeral<'m>(
    init: &'m mut HandshakeInit,
    hs: &mut HandshakeState,
    receiver: &StaticInitiatorConfig,
) -> Result<PublicKey, CryptoError> {
    // IKpsk2:
    // <- s
    // -> e, es

    // <- s:
    hs.mix_hash(receiver.public_key.as_bytes());

    // -> e:
    // wireguard goes off-spec here with mix-chain.
    hs.mix_chain(&init.ephemeral_key);
    hs.mix_hash(&init.ephemeral_key);

    // -> es:
    let epk_i = PublicKey::from(init.ephemeral_key);
    let k = hs.mix_key_dh(&receiver.private_key, &epk_i)?;

    unsafe_log!("decrypting static key");
    // -> s:
    let spk_i = init.static_key.decrypt_and_hash(hs, &k)?;
    let spk_i = PublicKey::from(*spk_i);
    unsafe_log!("decrypted public key {spk_i:?}");

    Ok(spk_i)
}

/// Second phase of [`decrypt_handshake_init`]: once the caller has
/// looked up the sender's [`StaticPeerConfig`] by the public key
/// returned from [`decrypt_handshake_init_ephemeral`], finishes the `ss`
/// step and the timestamp payload using the precomputed DH.
pub fn decrypt_handshake_init_static<'m>(
    init: &'m mut HandshakeInit,
    hs: &mut HandshakeState,
    peer: &StaticPeerConfig,
) -> Result<&'m mut DecryptedHandshakeInit, CryptoError> {
    // -> ss: reuse the precomputed DH (symmetric with the initiator's).
    let k = hs.mix_key_precomputed(&peer.static_dh);

    unsafe_log!("decrypting payload");
    // payload:
    let _timestamp = *init.timestamp.decrypt_and_hash(hs, &k)?;

    Ok(transmute_mut!(init))
}

pub fn encrypt_handshake_resp(
    hs: &mut HandshakeState,
    data: &DecryptedHandshakeInit,
    esk_r: &StaticSecret,
    peer: &StaticPeerConfig,
    sender: u32,
    cookie: Option<&Cookie>,
) -> Result<HandshakeResp, CryptoError> {
    // IKpsk2:
    // <- e, ee, se, psk

    // <- e: ephemeral keypair generated by caller
    // wireguard goes off-spec here with mix-chain.
    let epk_r = PublicKey::from(esk_r);
    hs.mix_chain(epk_r.as_bytes());
    hs.mix_hash(epk_r.as_bytes());

    // <- ee
    let epk_i = PublicKey::from(data.0.ephemeral_key);
    hs.mix_dh(esk_r, &epk_i)?;

    // <- se
    let spk_i = PublicKey::from(data.0.static_key.msg);
    hs.mix_dh(esk_r, &spk_i)?;

    // <- psk
    let k = hs.mix_key_and_hash(&peer.preshared_key);

    // payload:
    let empty = EncryptedEmpty::encrypt_and_hash([], hs, &k);

    // build the message and protect with the MACs
    let mut msg = HandshakeResp {
        message_type: little_endian::U32::new(MSG_SECOND),
        sender: little_endian::U32::new(sender),
        receiver: data.0.sender,
        ephemeral_key: epk_r.to_bytes(),
        empty,
        mac1: [0; 16],
        mac2: [0; 16],
    };
    msg.mac1 = msg.compute_mac1(&peer.mac1_key);
    if let Some(cookie) = cookie {
        msg.mac2 = msg.compute_mac2(cookie);
    }

    Ok(msg)
}

pub fn decrypt_handshake_resp(
    resp: &mut HandshakeResp,
    hs: &mut HandshakeState,
    initiator: &StaticInitiatorConfig,
    peer: &StaticPeerConfig,
    esk_i: &StaticSecret,
) -> Result<(), CryptoError> {
    // IKpsk2:
    // <- e, ee, se, psk

    // <- e:
    // wireguard goes off-spec here with mix-chain.
    let epk_r = PublicKey::from(resp.ephemeral_key);
    hs.mix_chain(epk_r.as_bytes());
    hs.mix_hash(epk_r.as_bytes());

    // <- ee:
    hs.mix_dh(esk_i, &epk_r)?;

    // <- se:
    hs.mix_dh(&initiator.private_key, &epk_r)?;

    // <- psk:
    let k = hs.mix_key_and_hash(&peer.preshared_key);

    unsafe_log!("decrypting payload");
    // payload:
    resp.empty.decrypt_and_hash(hs, &k)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn keypair(rng: &mut StdRng) -> (StaticSecret, PublicKey) {
        let sk = StaticSecret::random_from_rng(rng);
        let pk = PublicKey::from(&sk);
        (sk, pk)
    }

    #[test]
    fn full_handshake_round_trip() {
        let mut rng = StdRng::seed_from_u64(42);

        let (i_sk, i_pk) = keypair(&mut rng);
        let (r_sk, r_pk) = keypair(&mut rng);

        let initiator = StaticInitiatorConfig::new(i_sk);
        let responder = StaticInitiatorConfig::new(r_sk);

        let peer_of_initiator = StaticPeerConfig::new(&initiator.private_key, r_pk, None).unwrap();
        let peer_of_responder =
            StaticPeerConfig::new(&responder.private_key, i_pk, None).unwrap();

        let esk_i = StaticSecret::random_from_rng(&mut rng);
        let esk_r = StaticSecret::random_from_rng(&mut rng);

        let mut hs_i = HandshakeState::default();
        let mut init = encrypt_handshake_init(
            &mut hs_i,
            &initiator,
            &peer_of_initiator,
            &esk_i,
            Tai64N(tai64::Tai64(0), 0),
            1,
            None,
        );

        let mut hs_r = HandshakeState::default();
        let sender_pk =
            decrypt_handshake_init_ephemeral(&mut init, &mut hs_r, &responder).unwrap();
        assert_eq!(sender_pk.as_bytes(), i_pk.as_bytes());

        let decrypted = decrypt_handshake_init_static(&mut init, &mut hs_r, &peer_of_responder)
            .unwrap();

        let mut resp = encrypt_handshake_resp(
            &mut hs_r,
            decrypted,
            &esk_r,
            &peer_of_responder,
            2,
            None,
        )
        .unwrap();

        decrypt_handshake_resp(&mut resp, &mut hs_i, &initiator, &peer_of_initiator, &esk_i)
            .unwrap();

        let (i_send, i_recv) = hs_i.split();
        let (r_recv, r_send) = hs_r.split();
        assert_eq!(i_send, r_send);
        assert_eq!(i_recv, r_recv);
    }

    #[test]
    fn rejects_all_zero_dh_output() {
        let mut rng = StdRng::seed_from_u64(7);
        let (our_sk, _) = keypair(&mut rng);
        // the all-zero "public key" is a well-known low-order point that
        // forces every X25519 DH with it to output all-zeroes.
        let degenerate = PublicKey::from([0u8; 32]);
        assert!(matches!(
            StaticPeerConfig::new(&our_sk, degenerate, None),
            Err(CryptoError::InvalidKey)
        ));
    }

    #[test]
    fn transport_keys_round_trip() {
        let (k1, k2) = {
            let mut hs = HandshakeState::default();
            hs.mix_hash(b"seed");
            hs.split()
        };

        let enc = EncryptionKey::new(k1);
        let dec = DecryptionKey::new(k1);
        let mut buf = *b"hello wireguard!";
        let tag = enc.seal_in_place(0, &mut buf);
        assert_ne!(&buf, b"hello wireguard!");
        dec.open_in_place(0, &mut buf, &tag).unwrap();
        assert_eq!(&buf, b"hello wireguard!");

        let _ = k2;
    }
}
