//! Named wrappers over the primitive crypto operations (BLAKE2s,
//! HMAC-BLAKE2s/HKDF, X25519, ChaCha20-Poly1305): the "Crypto Adapter"
//! every other component calls instead of touching a hash/cipher state
//! directly.

use blake2::digest::generic_array::GenericArray;
use blake2::digest::{Digest, Output};
use blake2::Blake2s256;
use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use hmac::SimpleHmac;
use rustyguard_types::{EncryptedEmpty, EncryptedPublicKey, EncryptedTimestamp, Tag};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CryptoError;

/// Construction: the UTF-8 string literal "Noise_IKpsk2_25519_ChaChaPoly_BLAKE2s".
/// Identifier: the UTF-8 string literal "WireGuard v1 zx2c4 Jason@zx2c4.com".
/// Ci := Hash(Construction); Hi := Hash(Ci || Identifier).
const CONSTRUCTION_HASH: [u8; 32] = [
    96, 226, 109, 174, 243, 39, 239, 192, 46, 195, 53, 226, 160, 37, 210, 208, 22, 235, 66, 6, 248,
    114, 119, 245, 45, 56, 209, 152, 139, 120, 205, 54,
];
const IDENTIFIER_HASH: [u8; 32] = [
    34, 17, 179, 97, 8, 26, 197, 102, 105, 18, 67, 219, 69, 138, 213, 50, 45, 156, 108, 102, 34,
    147, 232, 183, 14, 225, 156, 101, 186, 7, 158, 243,
];

pub(crate) const LABEL_MAC1: [u8; 8] = *b"mac1----";
pub(crate) const LABEL_COOKIE: [u8; 8] = *b"cookie--";

pub type Key = chacha20poly1305::Key;
pub type Mac = [u8; 16];

pub(crate) fn nonce(counter: u64) -> Nonce {
    let mut n = Nonce::default();
    n[4..].copy_from_slice(&u64::to_le_bytes(counter));
    n
}

pub(crate) fn hash<const M: usize>(msg: [&[u8]; M]) -> Output<Blake2s256> {
    let mut digest = Blake2s256::default();
    for msg in msg {
        digest.update(msg);
    }
    digest.finalize()
}

/// `Mac(key, data)`: keyed BLAKE2s-128.
pub fn mac(key: &[u8], msg: &[u8]) -> Mac {
    use blake2::digest::Mac as _;
    let mut mac = blake2::Blake2sMac128::new_from_slice(key).expect("mac key is never empty");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

fn hmac<const M: usize>(key: &Key, msg: [&[u8]; M]) -> Output<Blake2s256> {
    use hmac::Mac as _;
    let mut hmac = <SimpleHmac<Blake2s256> as hmac::Mac>::new_from_slice(key).unwrap();
    for msg in msg {
        hmac.update(msg);
    }
    hmac.finalize().into_bytes()
}

/// HKDF-style derivation shared by `KDF1`/`KDF2`/`KDF3` (§4.4): each
/// `tau_i` is `Hmac(tau0, tau1 || .. || tau_{i-1} || i)`.
pub(crate) fn hkdf<const N: usize, const M: usize>(
    key: &Key,
    msg: [&[u8]; M],
) -> [Output<Blake2s256>; N] {
    assert!(N <= 255);

    let mut output = [Output::<Blake2s256>::default(); N];
    if N == 0 {
        return output;
    }

    let t0 = hmac(key, msg);
    let mut ti = hmac(&t0, [&[1]]);
    output[0] = ti;
    for i in 1..N as u8 {
        ti = hmac(&t0, [&ti, &[i + 1]]);
        output[i as usize] = ti;
    }

    output
}

fn dh_or_reject(sk: &StaticSecret, pk: &PublicKey) -> Result<[u8; 32], CryptoError> {
    let shared = sk.diffie_hellman(pk);
    let zero = [0u8; 32];
    if shared.as_bytes().ct_eq(&zero).into() {
        unsafe_log!("rejecting all-zero DH output");
        return Err(CryptoError::InvalidKey);
    }
    Ok(*shared.as_bytes())
}

/// `DH(sk, pk)`, validated once up front for [`crate::StaticPeerConfig`]
/// so the handshake-time `ss` step can reuse the result via
/// [`HandshakeState::mix_key_precomputed`] without re-checking it.
pub(crate) fn static_dh(sk: &StaticSecret, pk: &PublicKey) -> Result<Key, CryptoError> {
    Ok(Key::from(dh_or_reject(sk, pk)?))
}

/// Transient Noise_IKpsk2 chaining state: the rolling hash and chaining
/// key for a single handshake attempt. Lives only as long as that
/// attempt; the core engine wipes it by promoting it into a `Keypair`
/// (see `HandshakeState::split`) or dropping it outright.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct HandshakeState {
    hash: Key,
    chain: Key,
}

impl Default for HandshakeState {
    fn default() -> Self {
        Self {
            chain: GenericArray::from(CONSTRUCTION_HASH),
            hash: GenericArray::from(IDENTIFIER_HASH),
        }
    }
}

impl HandshakeState {
    /// `Ci := Kdf1(Ci, b)`. WireGuard folds this into the `e`/`ee`/`se`
    /// steps of Noise even though vanilla IKpsk2 would only mix_hash
    /// there; see the teacher crate's comments at each call site.
    pub fn mix_chain(&mut self, b: &[u8]) {
        let [c] = hkdf(&self.chain, [b]);
        self.chain = c;
    }

    /// `Kdf1(Ci, DH(sk, pk))`, used for Noise steps that only need the
    /// chaining key updated (`ee`, `se`).
    pub fn mix_dh(&mut self, sk: &StaticSecret, pk: &PublicKey) -> Result<(), CryptoError> {
        let dh = dh_or_reject(sk, pk)?;
        let [c] = hkdf(&self.chain, [&dh]);
        self.chain = c;
        Ok(())
    }

    /// `Kdf2(Ci, DH(sk, pk)) -> (Ci, k)`, computing the DH fresh. Used
    /// for the ephemeral-ephemeral and ephemeral-static steps, which
    /// cannot be precomputed.
    pub fn mix_key_dh(&mut self, sk: &StaticSecret, pk: &PublicKey) -> Result<Key, CryptoError> {
        let dh = dh_or_reject(sk, pk)?;
        let [c, k] = hkdf(&self.chain, [&dh]);
        self.chain = c;
        Ok(k)
    }

    /// `Kdf2(Ci, dh) -> (Ci, k)` for a DH output computed once up front
    /// (`Peer::static_public_dh`, §3) rather than per handshake. The
    /// zero-output check already happened when the precomputed value
    /// was derived (`StaticPeerConfig::new`), so it is not repeated here.
    pub fn mix_key_precomputed(&mut self, dh: &Key) -> Key {
        let [c, k] = hkdf(&self.chain, [dh.as_slice()]);
        self.chain = c;
        k
    }

    /// `Kdf3(Ci, b) -> (Ci, tau, k)`, mixing `tau` into the hash. Used
    /// for the preshared-key step.
    pub fn mix_key_and_hash(&mut self, b: &[u8]) -> Key {
        let [c, t, k] = hkdf(&self.chain, [b]);
        self.chain = c;
        self.mix_hash(&t);
        k
    }

    /// `Hi := Hash(Hi || b)`.
    pub fn mix_hash(&mut self, b: &[u8]) {
        self.hash = hash([&self.hash, b]);
    }

    pub(crate) fn hash(&self) -> Key {
        self.hash
    }

    /// `Kdf2(Ci, empty) -> (T1, T2)`: splits the chaining key into the
    /// two transport-data session keys and wipes `self`.
    pub fn split(&mut self) -> (Key, Key) {
        let [k1, k2] = hkdf(&self.chain, []);
        self.zeroize();
        (k1, k2)
    }
}

/// Noise's `EncryptAndHash`/`DecryptAndHash`: AEAD-seal (or open) a
/// handshake payload field under the running transcript hash as
/// associated data, then fold the ciphertext into that hash.
/// Implemented here (rather than in `rustyguard-types`, which owns the
/// wire structs) via the same split the teacher crate already uses for
/// `HasMac`/`mac_protected!`, to keep `rustyguard-types` free of any
/// crypto dependency.
pub(crate) trait Encrypted: Sized {
    type Msg: AsRef<[u8]> + AsMut<[u8]>;

    fn parts(&mut self) -> (&mut Self::Msg, &Tag);
    fn from_parts(msg: Self::Msg, tag: Tag) -> Self;

    fn encrypt_and_hash(msg: Self::Msg, hs: &mut HandshakeState, key: &Key) -> Self {
        let mut msg = msg;
        let cipher = ChaCha20Poly1305::new(key);
        let tag = cipher
            .encrypt_in_place_detached(&nonce(0), &hs.hash(), msg.as_mut())
            .expect("handshake payload never exceeds the AEAD message limit");
        let tag = from_aead_tag(tag);
        hs.mix_hash(msg.as_ref());
        Self::from_parts(msg, tag)
    }

    fn decrypt_and_hash<'m>(
        &'m mut self,
        hs: &mut HandshakeState,
        key: &Key,
    ) -> Result<&'m mut Self::Msg, CryptoError> {
        let cipher = ChaCha20Poly1305::new(key);
        let aad = hs.hash();
        let (msg, tag) = self.parts();
        let tag = *tag;
        hs.mix_hash(msg.as_ref());
        let (msg, _) = self.parts();
        cipher
            .decrypt_in_place_detached(&nonce(0), &aad, msg.as_mut(), to_aead_tag(&tag))
            .map_err(|_| CryptoError::DecryptionError)?;
        let (msg, _) = self.parts();
        Ok(msg)
    }
}

macro_rules! encrypted_payload {
    ($t:ident, $msg:ty) => {
        impl Encrypted for $t {
            type Msg = $msg;

            fn parts(&mut self) -> (&mut Self::Msg, &Tag) {
                (&mut self.msg, &self.tag)
            }

            fn from_parts(msg: Self::Msg, tag: Tag) -> Self {
                Self { msg, tag }
            }
        }
    };
}

encrypted_payload!(EncryptedEmpty, [u8; 0]);
encrypted_payload!(EncryptedTimestamp, [u8; 12]);
encrypted_payload!(EncryptedPublicKey, [u8; 32]);

pub(crate) fn to_aead_tag(tag: &Tag) -> &chacha20poly1305::Tag {
    chacha20poly1305::Tag::from_slice(tag.as_array())
}

pub(crate) fn from_aead_tag(tag: chacha20poly1305::Tag) -> Tag {
    Tag::from_bytes(tag.into())
}

/// One half of a transport-data session key, bound to a fixed
/// direction. The 12-byte ChaCha20-Poly1305 nonce is always
/// `0x00000000 || LE64(counter)` (§6); associated data is always empty
/// for transport data.
pub struct EncryptionKey(ChaCha20Poly1305);

impl EncryptionKey {
    pub fn new(key: Key) -> Self {
        Self(ChaCha20Poly1305::new(&key))
    }

    pub fn seal_in_place(&self, counter: u64, buf: &mut [u8]) -> Tag {
        let tag = self
            .0
            .encrypt_in_place_detached(&nonce(counter), &[], buf)
            .expect("transport packet never exceeds the AEAD message limit");
        from_aead_tag(tag)
    }
}

pub struct DecryptionKey(ChaCha20Poly1305);

impl DecryptionKey {
    pub fn new(key: Key) -> Self {
        Self(ChaCha20Poly1305::new(&key))
    }

    pub fn open_in_place<'b>(
        &self,
        counter: u64,
        buf: &'b mut [u8],
        tag: &Tag,
    ) -> Result<&'b mut [u8], CryptoError> {
        self.0
            .decrypt_in_place_detached(&nonce(counter), &[], buf, to_aead_tag(tag))
            .map_err(|_| CryptoError::DecryptionError)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use blake2::Digest;

    #[test]
    fn construction_identifier() {
        let c = blake2::Blake2s256::default()
            .chain_update(b"Noise_IKpsk2_25519_ChaChaPoly_BLAKE2s")
            .finalize();
        let h = blake2::Blake2s256::default()
            .chain_update(c)
            .chain_update(b"WireGuard v1 zx2c4 Jason@zx2c4.com")
            .finalize();

        assert_eq!(&*c, &super::CONSTRUCTION_HASH);
        assert_eq!(&*h, &super::IDENTIFIER_HASH);
    }
}
